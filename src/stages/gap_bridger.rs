//! Stage 5: Gap Bridger.
//!
//! Dead ends (degree-1 vertices) that sit within `gap_bridge_meters` of
//! another vertex, but too far apart for the Welder to treat as the same
//! junction, get a synthetic connecting edge instead — modeling the common
//! real-world case of two trail segments separated by a short unmapped gap
//! (a driveway crossing, a missing connector).

use std::collections::HashSet;

use log::debug;

use crate::config::Config;
use crate::geom;
use crate::model::{EdgeProvenance, Geometry3, StageCounts, VertexId};
use crate::spatial::VertexIndex;
use crate::store::WorkingSet;

pub const NAME: &str = "gap_bridger";

pub fn run(ws: &mut WorkingSet, config: &Config, counts: &mut StageCounts) {
	let dead_ends: Vec<VertexId> = ws
		.vertex_ids()
		.filter(|id| ws.degree(*id) == 1)
		.collect();
	if dead_ends.len() < 2 {
		return;
	}
	let entries: Vec<(VertexId, f64, f64)> = ws
		.vertex_ids()
		.map(|id| {
			let p = ws.vertex(id).unwrap().position;
			(id, p.x, p.y)
		})
		.collect();
	let index = VertexIndex::build(entries);

	let mut bridged_pairs: HashSet<(VertexId, VertexId)> = HashSet::new();

	for &v in &dead_ends {
		if ws.degree(v) != 1 {
			continue; // may have gained a bridge already this pass
		}
		let pos = ws.vertex(v).unwrap().position;
		let radius_deg = geom::meters_to_degrees(config.gap_bridge_meters, pos.y);
		let candidates = index.within_radius(pos.x, pos.y, radius_deg);

		let mut best: Option<(VertexId, f64)> = None;
		for c in candidates {
			if c == v {
				continue;
			}
			let c_degree = ws.degree(c);
			if c_degree != 1 && c_degree != 2 {
				continue;
			}
			let c_pos = ws.vertex(c).unwrap().position;
			let d = geom::haversine_distance_m(pos, c_pos);
			if d == 0.0 || d > config.gap_bridge_meters {
				continue;
			}
			if directly_connected(ws, v, c) {
				continue;
			}
			let key = ordered_pair(v, c);
			if bridged_pairs.contains(&key) {
				continue;
			}
			if best.map(|(_, bd)| d < bd).unwrap_or(true) {
				best = Some((c, d));
			}
		}

		if let Some((target, distance_m)) = best {
			let target_pos = ws.vertex(target).unwrap().position;
			let geometry = Geometry3::new(vec![pos, target_pos]);
			ws.add_edge(
				v,
				target,
				geometry,
				distance_m / 1000.0,
				0.0,
				0.0,
				None,
				None,
				EdgeProvenance::Bridge,
			);
			bridged_pairs.insert(ordered_pair(v, target));
			counts.created += 1;
		}
	}
	ws.recompute_degrees();
	debug!("gap bridger created {} bridge edges", counts.created);
}

fn ordered_pair(a: VertexId, b: VertexId) -> (VertexId, VertexId) {
	if a < b {
		(a, b)
	} else {
		(b, a)
	}
}

fn directly_connected(ws: &WorkingSet, a: VertexId, b: VertexId) -> bool {
	ws.incident_edges(a)
		.iter()
		.filter_map(|e| ws.edge(*e))
		.any(|e| e.other(a) == b)
}
