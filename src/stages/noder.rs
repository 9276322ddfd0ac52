//! Stage 3: Noder.
//!
//! Turns the (bridged, simplified) trail set into the first real graph: every
//! trail is split at points where it crosses another trail, and every
//! resulting sub-polyline's endpoints are assigned vertex identity by
//! snapping to a uniform grid. Two endpoints that snap to the same grid cell
//! become the same vertex — this is where a dangling pair of trail ends that
//! happen to touch gets wired into one junction.

use std::collections::HashMap;

use log::debug;

use crate::config::Config;
use crate::geom;
use crate::model::{EdgeProvenance, Geometry3, Point3, StageCounts, Trail};
use crate::store::WorkingSet;

pub const NAME: &str = "noder";

#[derive(Clone, Copy)]
struct CutPoint {
	segment_idx: usize,
	dist_from_seg_start: f64,
	point: Point3,
}

fn planar_dist(a: Point3, b: Point3) -> f64 {
	((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

/// Splits `points` at every cut, keeping interior shape points intact.
/// Returns the extended point list plus the positions within it that are
/// vertex boundaries (start, end, and every inserted cut).
fn apply_cuts(points: &[Point3], mut cuts: Vec<CutPoint>) -> (Vec<Point3>, Vec<usize>) {
	cuts.sort_by(|a, b| {
		a.segment_idx
			.cmp(&b.segment_idx)
			.then(a.dist_from_seg_start.partial_cmp(&b.dist_from_seg_start).unwrap())
	});
	let mut extended = Vec::with_capacity(points.len() + cuts.len());
	let mut vertex_positions = vec![0usize];
	let mut cut_iter = cuts.into_iter().peekable();
	for i in 0..points.len().saturating_sub(1) {
		extended.push(points[i]);
		while let Some(c) = cut_iter.peek() {
			if c.segment_idx == i {
				let c = cut_iter.next().unwrap();
				extended.push(c.point);
				vertex_positions.push(extended.len() - 1);
			} else {
				break;
			}
		}
	}
	if let Some(last) = points.last() {
		extended.push(*last);
	}
	vertex_positions.push(extended.len() - 1);
	vertex_positions.dedup();
	(extended, vertex_positions)
}

/// Grid key used to give two snapped coordinates the same vertex identity.
fn grid_key(p: Point3, snap_meters: f64) -> (i64, i64) {
	let deg = geom::meters_to_degrees(snap_meters, p.y).max(1e-12);
	((p.x / deg).round() as i64, (p.y / deg).round() as i64)
}

/// Builds the working set from a trail set. Returns the set plus the number
/// of vertices/edges created (recorded in `counts`).
pub fn run(trails: &[Trail], config: &Config, counts: &mut StageCounts) -> WorkingSet {
	let mut cuts_per_trail: Vec<Vec<CutPoint>> = vec![Vec::new(); trails.len()];

	for i in 0..trails.len() {
		for j in (i + 1)..trails.len() {
			let hits = geom::intersection_points_indexed(&trails[i].geometry, &trails[j].geometry);
			for (seg_a, seg_b, pt) in hits {
				cuts_per_trail[i].push(CutPoint {
					segment_idx: seg_a,
					dist_from_seg_start: planar_dist(trails[i].geometry.points[seg_a], pt),
					point: pt,
				});
				cuts_per_trail[j].push(CutPoint {
					segment_idx: seg_b,
					dist_from_seg_start: planar_dist(trails[j].geometry.points[seg_b], pt),
					point: pt,
				});
			}
		}
	}

	let mut ws = WorkingSet::new();
	let mut vertex_by_cell: HashMap<(i64, i64), crate::model::VertexId> = HashMap::new();

	let mut vertex_for = |ws: &mut WorkingSet, p: Point3, snap_meters: f64| {
		let key = grid_key(p, snap_meters);
		*vertex_by_cell
			.entry(key)
			.or_insert_with(|| ws.add_vertex(p))
	};

	for (idx, trail) in trails.iter().enumerate() {
		let cuts = std::mem::take(&mut cuts_per_trail[idx]);
		let (extended, vertex_positions) = apply_cuts(&trail.geometry.points, cuts);
		if vertex_positions.len() < 2 {
			continue;
		}
		for w in vertex_positions.windows(2) {
			let (start_pos, end_pos) = (w[0], w[1]);
			if start_pos == end_pos {
				continue;
			}
			let sub_points = extended[start_pos..=end_pos].to_vec();
			let sub_geom = Geometry3::new(sub_points);
			let source = vertex_for(&mut ws, sub_geom.start().unwrap(), config.snap_meters);
			let target = vertex_for(&mut ws, sub_geom.end().unwrap(), config.snap_meters);
			if source == target {
				// a zero-length split artifact; skip rather than create a spurious self-loop
				continue;
			}
			let length_km = geom::length_meters(&sub_geom) / 1000.0;
			let fraction = if trail.length_km > 0.0 {
				(length_km / trail.length_km).min(1.0).max(0.0)
			} else {
				0.0
			};
			ws.add_edge(
				source,
				target,
				sub_geom,
				length_km,
				trail.elevation_gain_m * fraction,
				trail.elevation_loss_m * fraction,
				trail.name.clone(),
				Some(trail.kind.clone()),
				EdgeProvenance::Original {
					trail_id: trail.trail_uuid.clone(),
				},
			);
			counts.created += 1;
		}
	}
	ws.recompute_degrees();
	debug!(
		"noder produced {} vertices, {} edges",
		ws.vertex_count(),
		ws.edge_count()
	);
	ws
}
