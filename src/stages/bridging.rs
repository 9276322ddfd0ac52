//! Stage 2: Trail-Level Bridging.
//!
//! Before any vertex identity is assigned, nearly-touching trail endpoints
//! across *different* trails get a short synthetic `Connector` trail record
//! appended joining them, so the Noder sees a real edge between the two
//! near-miss endpoints instead of two disconnected dead ends. Existing trail
//! geometry is never rewritten — bridging only appends new trail records.

use log::debug;

use crate::config::Config;
use crate::geom;
use crate::model::{Geometry3, StageCounts, Trail, TrailKind, VertexId};
use crate::spatial::VertexIndex;

pub const NAME: &str = "bridging";

#[derive(Clone, Copy)]
struct EndpointRef {
	trail_idx: usize,
	is_start: bool,
}

/// Runs up to `config.max_bridging_passes` bridging passes, each pass
/// appending connector trails across gaps up to `config.vertex_merge_meters`.
/// Later passes can close gaps exposed transitively by earlier ones (A
/// bridges to B, then C — close to B — bridges to B too), which is why this
/// is iterative rather than a single O(n) sweep.
pub fn run(mut trails: Vec<Trail>, config: &Config, counts: &mut StageCounts) -> Vec<Trail> {
	for pass in 0..config.max_bridging_passes {
		let appended = bridge_pass(&mut trails, config);
		debug!("bridging pass {pass}: {appended} connector trails appended");
		counts.created += appended as u64;
		if appended == 0 {
			break;
		}
	}
	trails
}

fn bridge_pass(trails: &mut Vec<Trail>, config: &Config) -> usize {
	let mut refs: Vec<EndpointRef> = Vec::with_capacity(trails.len() * 2);
	let mut entries: Vec<(VertexId, f64, f64)> = Vec::with_capacity(trails.len() * 2);
	for (idx, trail) in trails.iter().enumerate() {
		if let Some(s) = trail.geometry.start() {
			entries.push((VertexId(refs.len() as u64), s.x, s.y));
			refs.push(EndpointRef {
				trail_idx: idx,
				is_start: true,
			});
		}
		if let Some(e) = trail.geometry.end() {
			entries.push((VertexId(refs.len() as u64), e.x, e.y));
			refs.push(EndpointRef {
				trail_idx: idx,
				is_start: false,
			});
		}
	}
	if entries.is_empty() {
		return 0;
	}
	let index = VertexIndex::build(entries.clone());
	let radius_deg = geom::meters_to_degrees(config.vertex_merge_meters, 0.0);

	let mut appended = 0usize;
	let mut already_bridged = vec![false; refs.len()];
	let mut new_connectors = Vec::new();
	for (slot, &(_, x, y)) in entries.iter().enumerate() {
		if already_bridged[slot] {
			continue;
		}
		let candidates = index.within_radius(x, y, radius_deg.max(1e-12));
		// anchor = lowest-slot candidate; every other candidate bridges to it
		let mut anchor_slot = slot;
		for c in &candidates {
			if (c.0 as usize) < anchor_slot {
				anchor_slot = c.0 as usize;
			}
		}
		if anchor_slot == slot {
			continue;
		}
		let anchor_point = {
			let anchor_ref = refs[anchor_slot];
			let t = &trails[anchor_ref.trail_idx];
			if anchor_ref.is_start {
				t.geometry.start()
			} else {
				t.geometry.end()
			}
		};
		let Some(anchor_point) = anchor_point else {
			continue;
		};
		let here = refs[slot];
		let here_point = {
			let t = &trails[here.trail_idx];
			if here.is_start {
				t.geometry.start()
			} else {
				t.geometry.end()
			}
		};
		let Some(here_point) = here_point else {
			continue;
		};
		let real_distance = geom::haversine_distance_m(here_point, anchor_point);
		if real_distance > config.vertex_merge_meters || real_distance == 0.0 {
			continue;
		}
		let geometry = Geometry3::new(vec![here_point, anchor_point]);
		let length_km = geom::length_meters(&geometry) / 1000.0;
		new_connectors.push(Trail {
			trail_uuid: format!("bridge-connector-{}-{}", trails.len() + new_connectors.len(), slot),
			name: Some("bridging connector".to_string()),
			kind: TrailKind::Connector,
			length_km,
			elevation_gain_m: 0.0,
			elevation_loss_m: 0.0,
			bbox: [
				here_point.x.min(anchor_point.x),
				here_point.y.min(anchor_point.y),
				here_point.x.max(anchor_point.x),
				here_point.y.max(anchor_point.y),
			],
			geometry,
		});
		already_bridged[slot] = true;
		appended += 1;
	}
	trails.extend(new_connectors);
	appended
}
