//! Stage 7: Edge Deduplicator.
//!
//! Bridging and connector integration can leave two edges spanning the same
//! endpoint pair (a trail's own segment plus a synthetic bridge covering the
//! same gap). This stage groups edges by unordered endpoint pair and keeps
//! exactly one per group, per `config.dedup_policy`.

use std::collections::HashMap;

use log::debug;

use crate::config::{Config, DedupPolicy};
use crate::model::{EdgeId, StageCounts, VertexId};
use crate::store::WorkingSet;

pub const NAME: &str = "dedup";

fn ordered_pair(a: VertexId, b: VertexId) -> (VertexId, VertexId) {
	if a <= b {
		(a, b)
	} else {
		(b, a)
	}
}

/// Chooses the edge to keep from a duplicate group: ranked by length per
/// `policy`, ties broken by lowest edge ID.
fn choose_survivor(ws: &WorkingSet, group: &[EdgeId], policy: DedupPolicy) -> EdgeId {
	let best = group.iter().copied().min_by(|a, b| {
		let ea = ws.edge(*a).unwrap();
		let eb = ws.edge(*b).unwrap();
		let length_cmp = match policy {
			DedupPolicy::KeepShortest => ea.length_km.partial_cmp(&eb.length_km).unwrap(),
			DedupPolicy::KeepLongest => eb.length_km.partial_cmp(&ea.length_km).unwrap(),
		};
		length_cmp.then(a.cmp(b))
	});
	best.unwrap()
}

pub fn run(ws: &mut WorkingSet, config: &Config, counts: &mut StageCounts) {
	let mut groups: HashMap<(VertexId, VertexId), Vec<EdgeId>> = HashMap::new();
	for edge in ws.edges() {
		if edge.is_self_loop() {
			continue; // self-loops have no "other" endpoint pairing to dedup against
		}
		groups
			.entry(ordered_pair(edge.source, edge.target))
			.or_default()
			.push(edge.id);
	}

	for (_, group) in groups {
		if group.len() < 2 {
			continue;
		}
		let survivor = choose_survivor(ws, &group, config.dedup_policy);
		for edge_id in group {
			if edge_id != survivor {
				ws.remove_edge(edge_id);
				counts.removed += 1;
			}
		}
	}
	ws.recompute_degrees();
	debug!("dedup removed {} duplicate edges", counts.removed);
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::{EdgeProvenance, Geometry3, Point3};

	fn pt(x: f64, y: f64) -> Point3 {
		Point3::new(x, y, 0.0)
	}

	#[test]
	fn keep_shortest_is_the_default_policy() {
		let mut ws = WorkingSet::new();
		let a = ws.add_vertex(pt(0.0, 0.0));
		let b = ws.add_vertex(pt(1.0, 0.0));
		let shortest = ws.add_edge(
			a,
			b,
			Geometry3::new(vec![pt(0.0, 0.0), pt(1.0, 0.0)]),
			1.0,
			0.0,
			0.0,
			None,
			None,
			EdgeProvenance::Original {
				trail_id: "t1".into(),
			},
		);
		ws.add_edge(
			a,
			b,
			Geometry3::new(vec![pt(0.0, 0.0), pt(0.5, 0.5), pt(1.0, 0.0)]),
			2.0,
			0.0,
			0.0,
			None,
			None,
			EdgeProvenance::Bridge,
		);
		ws.recompute_degrees();
		let mut counts = StageCounts::default();
		run(&mut ws, &Config::default(), &mut counts);
		assert_eq!(ws.edge_count(), 1);
		assert_eq!(ws.edges().next().unwrap().id, shortest);
	}

	#[test]
	fn ties_break_by_lowest_edge_id() {
		let mut ws = WorkingSet::new();
		let a = ws.add_vertex(pt(0.0, 0.0));
		let b = ws.add_vertex(pt(1.0, 0.0));
		let first = ws.add_edge(
			a,
			b,
			Geometry3::new(vec![pt(0.0, 0.0), pt(1.0, 0.0)]),
			1.0,
			0.0,
			0.0,
			None,
			None,
			EdgeProvenance::Original {
				trail_id: "t1".into(),
			},
		);
		ws.add_edge(
			a,
			b,
			Geometry3::new(vec![pt(0.0, 0.0), pt(1.0, 0.0)]),
			1.0,
			0.0,
			0.0,
			None,
			None,
			EdgeProvenance::Bridge,
		);
		ws.recompute_degrees();
		let mut counts = StageCounts::default();
		run(&mut ws, &Config::default(), &mut counts);
		assert_eq!(ws.edge_count(), 1);
		assert_eq!(ws.edges().next().unwrap().id, first);
	}

	#[test]
	fn keep_longest_policy() {
		let mut ws = WorkingSet::new();
		let a = ws.add_vertex(pt(0.0, 0.0));
		let b = ws.add_vertex(pt(1.0, 0.0));
		ws.add_edge(
			a,
			b,
			Geometry3::new(vec![pt(0.0, 0.0), pt(1.0, 0.0)]),
			1.0,
			0.0,
			0.0,
			None,
			None,
			EdgeProvenance::Bridge,
		);
		let long = ws.add_edge(
			a,
			b,
			Geometry3::new(vec![pt(0.0, 0.0), pt(0.5, 0.5), pt(1.0, 0.0)]),
			2.0,
			0.0,
			0.0,
			None,
			None,
			EdgeProvenance::Bridge,
		);
		ws.recompute_degrees();
		let mut config = Config::default();
		config.dedup_policy = DedupPolicy::KeepLongest;
		let mut counts = StageCounts::default();
		run(&mut ws, &config, &mut counts);
		assert_eq!(ws.edges().next().unwrap().id, long);
	}
}
