//! Stage 6: Connector Integrator.
//!
//! Connector trails exist purely to link two otherwise-separate trail
//! networks (a fire road cut-through, a paved access path). Once the Noder
//! and Welder have settled ordinary vertex identity, this stage (a) retags
//! every edge sourced from a connector trail with `ConnectorBridged`
//! provenance so downstream consumers can distinguish "real" trail from
//! stitched-in connective tissue, (b) collapses a connector that sits
//! between exactly one non-connector neighbor on each side into a single
//! fused edge, and (c) gives any remaining connector dead ends one more,
//! connector-specific bridging pass — connectors are deliberately placed to
//! join things, so their endpoints deserve the benefit of the doubt that a
//! generic dead end does not.

use std::collections::HashSet;

use log::debug;

use crate::config::Config;
use crate::geom;
use crate::model::{EdgeId, EdgeProvenance, Geometry3, StageCounts, VertexId};
use crate::spatial::VertexIndex;
use crate::store::WorkingSet;

pub const NAME: &str = "connector";

pub fn run(ws: &mut WorkingSet, config: &Config, counts: &mut StageCounts) {
	retag_connector_edges(ws, counts);
	collapse_connectors(ws, counts);
	ws.recompute_degrees();
	bridge_connector_dead_ends(ws, config, counts);
	ws.recompute_degrees();
}

fn oriented_ending_at(ws: &WorkingSet, edge_id: EdgeId, vertex: VertexId) -> Geometry3 {
	let edge = ws.edge(edge_id).expect("neighbor edge must exist");
	if edge.target == vertex {
		edge.geometry.clone()
	} else {
		edge.geometry.reversed()
	}
}

fn oriented_starting_at(ws: &WorkingSet, edge_id: EdgeId, vertex: VertexId) -> Geometry3 {
	let edge = ws.edge(edge_id).expect("neighbor edge must exist");
	if edge.source == vertex {
		edge.geometry.clone()
	} else {
		edge.geometry.reversed()
	}
}

/// `collapseConnectors`: for each connector edge with exactly one
/// non-connector neighbor on each side, fuse (neighbor_left -> connector ->
/// neighbor_right) into one edge and delete the three originals. Each
/// neighbor is oriented so its near endpoint (the one touching the
/// connector) comes first, which is simply its natural travel direction
/// toward the connector's respective endpoint.
fn collapse_connectors(ws: &mut WorkingSet, counts: &mut StageCounts) {
	let connector_edges: Vec<EdgeId> = ws.edges().filter(|e| e.is_connector()).map(|e| e.id).collect();
	let mut collapsed = 0u64;
	let mut deleted_connectors = 0u64;

	for conn_id in connector_edges {
		let Some(conn) = ws.edge(conn_id) else { continue };
		if conn.is_self_loop() {
			continue;
		}
		let (va, vb) = (conn.source, conn.target);
		let connector_trail_id = match &conn.provenance {
			EdgeProvenance::ConnectorBridged { connector_trail_id } => connector_trail_id.clone(),
			_ => continue,
		};

		let left: Vec<EdgeId> = ws
			.incident_edges(va)
			.iter()
			.copied()
			.filter(|e| *e != conn_id)
			.collect();
		let right: Vec<EdgeId> = ws
			.incident_edges(vb)
			.iter()
			.copied()
			.filter(|e| *e != conn_id)
			.collect();
		if left.len() != 1 || right.len() != 1 {
			continue;
		}
		let (left_id, right_id) = (left[0], right[0]);
		if left_id == right_id {
			continue;
		}
		let Some(left_edge) = ws.edge(left_id) else { continue };
		let Some(right_edge) = ws.edge(right_id) else { continue };
		if left_edge.is_connector() || right_edge.is_connector() {
			continue;
		}

		let new_source = left_edge.other(va);
		let new_target = right_edge.other(vb);
		if new_source == new_target {
			// would produce a self-loop; leave the connector unfused
			continue;
		}

		let left_geom = oriented_ending_at(ws, left_id, va);
		let conn_geom = oriented_starting_at(ws, conn_id, va);
		let right_geom = oriented_starting_at(ws, right_id, vb);

		let mut points = left_geom.points.clone();
		points.extend(conn_geom.points.into_iter().skip(1));
		points.extend(right_geom.points.into_iter().skip(1));
		let merged = Geometry3::new(points);
		let length_km = geom::length_meters(&merged) / 1000.0;

		let (left_edge, conn, right_edge) = (
			ws.edge(left_id).unwrap().clone(),
			ws.edge(conn_id).unwrap().clone(),
			ws.edge(right_id).unwrap().clone(),
		);
		let gain = left_edge.elevation_gain_m + conn.elevation_gain_m + right_edge.elevation_gain_m;
		let loss = left_edge.elevation_loss_m + conn.elevation_loss_m + right_edge.elevation_loss_m;
		let name = left_edge.name.clone().or_else(|| right_edge.name.clone());
		let kind = left_edge.kind.clone().or_else(|| right_edge.kind.clone());

		ws.remove_edge(left_id);
		ws.remove_edge(conn_id);
		ws.remove_edge(right_id);
		ws.remove_vertex(va);
		ws.remove_vertex(vb);
		ws.add_edge(
			new_source,
			new_target,
			merged,
			length_km,
			gain,
			loss,
			name,
			kind,
			EdgeProvenance::ConnectorBridged { connector_trail_id },
		);
		collapsed += 1;
		deleted_connectors += 1;
	}

	counts.merged += collapsed;
	counts.removed += deleted_connectors * 3;
	debug!(
		"connector integrator collapsed {} connectors ({} edges deleted)",
		collapsed,
		deleted_connectors * 3
	);
}

fn retag_connector_edges(ws: &mut WorkingSet, counts: &mut StageCounts) {
	let ids: Vec<_> = ws
		.edges()
		.filter(|e| e.is_connector() && matches!(e.provenance, EdgeProvenance::Original { .. }))
		.map(|e| e.id)
		.collect();
	for id in ids {
		if let Some(edge) = ws.edge_mut(id) {
			if let EdgeProvenance::Original { trail_id } = &edge.provenance {
				let connector_trail_id = trail_id.clone();
				edge.provenance = EdgeProvenance::ConnectorBridged { connector_trail_id };
				counts.merged += 1;
			}
		}
	}
	debug!("connector integrator retagged {} edges", counts.merged);
}

fn connector_dead_ends(ws: &WorkingSet) -> Vec<VertexId> {
	ws.vertex_ids()
		.filter(|id| {
			ws.degree(*id) == 1
				&& ws
					.incident_edges(*id)
					.iter()
					.filter_map(|e| ws.edge(*e))
					.any(|e| e.is_connector())
		})
		.collect()
}

fn bridge_connector_dead_ends(ws: &mut WorkingSet, config: &Config, counts: &mut StageCounts) {
	let dead_ends = connector_dead_ends(ws);
	if dead_ends.is_empty() {
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
	let mut bridged: HashSet<(VertexId, VertexId)> = HashSet::new();

	for v in dead_ends {
		if ws.degree(v) != 1 {
			continue;
		}
		let pos = ws.vertex(v).unwrap().position;
		let radius_deg = geom::meters_to_degrees(config.connector_tolerance_meters, pos.y);
		let mut best: Option<(VertexId, f64)> = None;
		for c in index.within_radius(pos.x, pos.y, radius_deg) {
			if c == v {
				continue;
			}
			let c_pos = ws.vertex(c).unwrap().position;
			let d = geom::haversine_distance_m(pos, c_pos);
			if d == 0.0 || d > config.connector_tolerance_meters {
				continue;
			}
			let key = if v < c { (v, c) } else { (c, v) };
			if bridged.contains(&key) {
				continue;
			}
			if ws
				.incident_edges(v)
				.iter()
				.filter_map(|e| ws.edge(*e))
				.any(|e| e.other(v) == c)
			{
				continue;
			}
			if best.map(|(_, bd)| d < bd).unwrap_or(true) {
				best = Some((c, d));
			}
		}
		if let Some((target, distance_m)) = best {
			let target_pos = ws.vertex(target).unwrap().position;
			ws.add_edge(
				v,
				target,
				Geometry3::new(vec![pos, target_pos]),
				distance_m / 1000.0,
				0.0,
				0.0,
				None,
				None,
				EdgeProvenance::Bridge,
			);
			bridged.insert(if v < target { (v, target) } else { (target, v) });
			counts.created += 1;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::{Point3, TrailKind};

	fn pt(x: f64, y: f64) -> Point3 {
		Point3::new(x, y, 0.0)
	}

	#[test]
	fn retags_connector_original_edges() {
		let mut ws = WorkingSet::new();
		let a = ws.add_vertex(pt(0.0, 0.0));
		let b = ws.add_vertex(pt(0.001, 0.0));
		ws.add_edge(
			a,
			b,
			Geometry3::new(vec![pt(0.0, 0.0), pt(0.001, 0.0)]),
			0.1,
			0.0,
			0.0,
			None,
			Some(TrailKind::Connector),
			EdgeProvenance::Original {
				trail_id: "c1".into(),
			},
		);
		ws.recompute_degrees();
		let mut counts = StageCounts::default();
		run(&mut ws, &Config::default(), &mut counts);
		let edge = ws.edges().next().unwrap();
		assert!(matches!(
			edge.provenance,
			EdgeProvenance::ConnectorBridged { .. }
		));
	}

	#[test]
	fn collapses_connector_with_one_neighbor_each_side() {
		let mut ws = WorkingSet::new();
		let left_end = ws.add_vertex(pt(0.0, 0.0));
		let va = ws.add_vertex(pt(0.001, 0.0));
		let vb = ws.add_vertex(pt(0.002, 0.0));
		let right_end = ws.add_vertex(pt(0.003, 0.0));
		ws.add_edge(
			left_end,
			va,
			Geometry3::new(vec![pt(0.0, 0.0), pt(0.001, 0.0)]),
			0.1,
			1.0,
			0.0,
			Some("west trail".into()),
			Some(TrailKind::Trail),
			EdgeProvenance::Original { trail_id: "w".into() },
		);
		ws.add_edge(
			va,
			vb,
			Geometry3::new(vec![pt(0.001, 0.0), pt(0.002, 0.0)]),
			0.1,
			0.0,
			0.0,
			None,
			Some(TrailKind::Connector),
			EdgeProvenance::Original { trail_id: "c1".into() },
		);
		ws.add_edge(
			vb,
			right_end,
			Geometry3::new(vec![pt(0.002, 0.0), pt(0.003, 0.0)]),
			0.1,
			0.0,
			2.0,
			Some("east trail".into()),
			Some(TrailKind::Trail),
			EdgeProvenance::Original { trail_id: "e".into() },
		);
		ws.recompute_degrees();
		let mut counts = StageCounts::default();
		run(&mut ws, &Config::default(), &mut counts);
		assert_eq!(ws.edge_count(), 1);
		assert_eq!(ws.vertex_count(), 2);
		let fused = ws.edges().next().unwrap();
		assert!(matches!(fused.provenance, EdgeProvenance::ConnectorBridged { .. }));
		assert!((fused.length_km - 0.3).abs() < 1e-9);
		assert!((fused.elevation_gain_m - 1.0).abs() < 1e-9);
		assert!((fused.elevation_loss_m - 2.0).abs() < 1e-9);
		assert_eq!(fused.geometry.point_count(), 4);
	}
}
