//! Stage 8: Short Dead-End Pruner.
//!
//! Connector trails exist to stitch separate trail networks together, but a
//! connector that only reaches a dead end (never actually joining the other
//! network) is noise rather than a deliberate link — often a digitization
//! artifact, a parking-lot spur, a trailhead sign post. This stage removes
//! connector-derived edges shorter than `config.short_dead_end_meters` whose
//! far endpoint is a degree-1 dead end, iteratively, because removing one
//! stub can expose its neighbor as a new, now-shorter dead end. Non-connector
//! edges are left alone here regardless of length or degree — a short
//! ordinary trail stub is still a real trail.

use log::debug;

use crate::config::Config;
use crate::model::StageCounts;
use crate::store::WorkingSet;

pub const NAME: &str = "pruner";

pub fn run(ws: &mut WorkingSet, config: &Config, counts: &mut StageCounts) {
	loop {
		let victims: Vec<_> = ws
			.vertex_ids()
			.filter(|id| ws.degree(*id) == 1)
			.filter_map(|id| {
				let edge_id = *ws.incident_edges(id).first()?;
				let edge = ws.edge(edge_id)?;
				if !edge.is_connector() {
					return None;
				}
				if edge.length_km * 1000.0 < config.short_dead_end_meters {
					Some((id, edge_id))
				} else {
					None
				}
			})
			.collect();
		if victims.is_empty() {
			break;
		}
		for (vertex_id, edge_id) in victims {
			// the edge may already be gone if both its endpoints were dead ends
			// pruned in the same pass
			if ws.edge(edge_id).is_none() {
				continue;
			}
			ws.remove_edge(edge_id);
			ws.remove_vertex(vertex_id);
			counts.removed += 1;
		}
		ws.recompute_degrees();
	}
	debug!("pruner removed {} short dead ends", counts.removed);
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::{EdgeProvenance, Geometry3, Point3};

	fn pt(x: f64, y: f64) -> Point3 {
		Point3::new(x, y, 0.0)
	}

	#[test]
	fn prunes_short_connector_dead_end() {
		let mut ws = WorkingSet::new();
		let a = ws.add_vertex(pt(0.0, 0.0));
		let stub = ws.add_vertex(pt(0.0, 0.00001));
		ws.add_edge(
			a,
			stub,
			Geometry3::new(vec![pt(0.0, 0.0), pt(0.0, 0.00001)]),
			0.001, // 1 meter, well under default 20 m threshold
			0.0,
			0.0,
			None,
			None,
			EdgeProvenance::ConnectorBridged {
				connector_trail_id: "c1".into(),
			},
		);
		ws.recompute_degrees();
		let mut counts = StageCounts::default();
		run(&mut ws, &Config::default(), &mut counts);
		assert!(ws.vertex(stub).is_none());
		assert_eq!(counts.removed, 1);
	}

	#[test]
	fn never_prunes_ordinary_trail_stubs() {
		let mut ws = WorkingSet::new();
		let a = ws.add_vertex(pt(0.0, 0.0));
		let stub = ws.add_vertex(pt(0.0, 0.00001));
		ws.add_edge(
			a,
			stub,
			Geometry3::new(vec![pt(0.0, 0.0), pt(0.0, 0.00001)]),
			0.001,
			0.0,
			0.0,
			None,
			None,
			EdgeProvenance::Bridge,
		);
		ws.recompute_degrees();
		let mut counts = StageCounts::default();
		run(&mut ws, &Config::default(), &mut counts);
		assert!(ws.vertex(stub).is_some());
		assert_eq!(counts.removed, 0);
	}

	#[test]
	fn leaves_connector_dead_end_longer_than_threshold() {
		let mut ws = WorkingSet::new();
		let a = ws.add_vertex(pt(0.0, 0.0));
		let stub = ws.add_vertex(pt(0.0, 0.001)); // ~111 m, over default 20 m threshold
		ws.add_edge(
			a,
			stub,
			Geometry3::new(vec![pt(0.0, 0.0), pt(0.0, 0.001)]),
			0.111,
			0.0,
			0.0,
			None,
			None,
			EdgeProvenance::ConnectorBridged {
				connector_trail_id: "c1".into(),
			},
		);
		ws.recompute_degrees();
		let mut counts = StageCounts::default();
		run(&mut ws, &Config::default(), &mut counts);
		assert!(ws.vertex(stub).is_some());
		assert_eq!(counts.removed, 0);
	}
}
