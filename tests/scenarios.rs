//! Integration tests running the full nine-stage pipeline through its public
//! API (`Pipeline::run`), covering the worked scenarios and the graph-level
//! invariants they're meant to demonstrate.

use trailnet_topology::config::{Config, DedupPolicy};
use trailnet_topology::model::{EdgeProvenance, Geometry3, Point3, Report, Trail, TrailKind};
use trailnet_topology::pipeline::Pipeline;

fn trail(id: &str, kind: TrailKind, points: Vec<(f64, f64)>) -> Trail {
	let geometry = Geometry3::new(points.iter().map(|&(x, y)| Point3::new(x, y, 0.0)).collect());
	let length_km = trailnet_topology::geom::length_meters(&geometry) / 1000.0;
	Trail {
		trail_uuid: id.to_string(),
		name: Some(id.to_string()),
		kind,
		length_km,
		elevation_gain_m: 10.0,
		elevation_loss_m: 4.0,
		bbox: [0.0, 0.0, 1.0, 1.0],
		geometry,
	}
}

fn run(trails: Vec<Trail>, config: Config) -> trailnet_topology::model::PipelineOutput {
	let pipeline = Pipeline::new(config);
	let mut report = Report::default();
	pipeline.run(trails, &mut report).expect("pipeline run should succeed")
}

fn degree_of(output: &trailnet_topology::model::PipelineOutput, x: f64, y: f64) -> Option<u32> {
	output
		.vertices
		.iter()
		.find(|v| (v.x - x).abs() < 1e-6 && (v.y - y).abs() < 1e-6)
		.map(|v| v.degree)
}

/// Scenario A — Y junction. Three trails meeting at one point. No gap, no
/// chain to compact: the Noder's output should survive to the end unchanged.
#[test]
fn scenario_a_y_junction() {
	let hub = (-105.285, 39.985);
	let trails = vec![
		trail("arm_1", TrailKind::Trail, vec![hub, (-105.284, 39.985)]),
		trail("arm_2", TrailKind::Trail, vec![hub, (-105.286, 39.985)]),
		trail("arm_3", TrailKind::Trail, vec![hub, (-105.285, 39.986)]),
	];
	let output = run(trails, Config::default());
	assert_eq!(output.edges.len(), 3);
	assert_eq!(output.vertices.len(), 4);
	assert_eq!(degree_of(&output, hub.0, hub.1), Some(3));
	assert_eq!(output.vertices.iter().filter(|v| v.degree == 1).count(), 3);
}

/// Scenario B — T junction with a tiny gap. Two endpoints 5 m apart, well
/// inside a 10 m gap-bridge tolerance; bridging plus the compactor should
/// leave one continuous edge.
#[test]
fn scenario_b_t_junction_with_tiny_gap() {
	let a_end = (-105.280, 39.980);
	let b_start = (-105.27995, 39.98002);
	let trails = vec![
		trail("trail_1", TrailKind::Trail, vec![(-105.281, 39.980), a_end]),
		trail("trail_2", TrailKind::Trail, vec![b_start, (-105.279, 39.98004)]),
	];
	let mut config = Config::default();
	config.gap_bridge_meters = 10.0;
	let output = run(trails, config);
	assert_eq!(output.edges.len(), 1);
	let fused = &output.edges[0];
	assert!(matches!(fused.provenance, EdgeProvenance::MergedChain { .. }));
}

/// Scenario C — X crossing. Two trails properly crossing produce a real
/// degree-4 intersection vertex; no degree-2 chain exists to compact.
#[test]
fn scenario_c_x_crossing() {
	let crossing = (-105.2675, 39.980);
	let trails = vec![
		trail(
			"diag_1",
			TrailKind::Trail,
			vec![(-105.268, 39.9795), (-105.267, 39.9805)],
		),
		trail(
			"diag_2",
			TrailKind::Trail,
			vec![(-105.268, 39.9805), (-105.267, 39.9795)],
		),
	];
	let output = run(trails, Config::default());
	assert_eq!(output.edges.len(), 4);
	assert_eq!(output.vertices.len(), 5);
	assert_eq!(degree_of(&output, crossing.0, crossing.1), Some(4));
}

/// Scenario D — short dead-end connector. A 23 m connector off a through
/// trail is pruned (under a 30 m threshold), its dead-end vertex dropped,
/// and the through trail fuses into a single edge across the former hub.
#[test]
fn scenario_d_short_dead_end_connector_pruned() {
	let a = (-105.30, 39.99);
	let b = (-105.29, 39.99); // ~880 m from a, roughly where the connector hangs off
	let c = (-105.28, 39.99);
	// ~23 m north of b
	let dead_end = (-105.29, 39.990207);
	let trails = vec![
		trail("a_to_b", TrailKind::Trail, vec![a, b]),
		trail("b_to_c", TrailKind::Trail, vec![b, c]),
		trail("connector", TrailKind::Connector, vec![b, dead_end]),
	];
	let mut config = Config::default();
	config.short_dead_end_meters = 30.0;
	let output = run(trails, config);
	assert!(!output.vertices.iter().any(|v| (v.x - dead_end.0).abs() < 1e-6 && (v.y - dead_end.1).abs() < 1e-6));
	assert_eq!(output.edges.len(), 1);
	assert_eq!(output.vertices.len(), 2);
}

/// Scenario E — a straight chain through five intermediate degree-2
/// vertices compacts to one edge between the two true endpoints.
#[test]
fn scenario_e_long_degree2_chain_compacts_to_one_edge() {
	// six ~100 m segments, due east along the equator-ish latitude
	let step = 100.0 / 111_195.0;
	let points: Vec<(f64, f64)> = (0..=6).map(|i| (i as f64 * step, 0.0)).collect();
	let trails = vec![trail("long_chain", TrailKind::Trail, points)];
	let output = run(trails, Config::default());
	assert_eq!(output.vertices.len(), 2);
	assert_eq!(output.edges.len(), 1);
	let fused = &output.edges[0];
	assert!(matches!(fused.provenance, EdgeProvenance::MergedChain { .. }));
	assert!((fused.length_km - 0.6).abs() < 0.05);
}

/// Scenario F — duplicate bidirectional edges between the same two
/// vertices, slightly different lengths; `keep_shortest` survives the
/// shorter of the pair.
#[test]
fn scenario_f_duplicate_edges_keep_shortest() {
	let v7 = (-105.20, 39.90);
	let v8 = (-105.19, 39.90);
	// two geometrically distinct paths between the same endpoints, one
	// slightly longer than the other via a small detour
	let trails = vec![
		trail("edge_a", TrailKind::Trail, vec![v7, v8]),
		trail(
			"edge_b",
			TrailKind::Trail,
			vec![v7, (-105.195, 39.9002), v8],
		),
	];
	let mut config = Config::default();
	config.dedup_policy = DedupPolicy::KeepShortest;
	let output = run(trails, config);
	assert_eq!(output.edges.len(), 1);
	assert!(output.edges[0].length_km < 1.2);
}

/// Invariant: the output graph never contains a dangling edge — every
/// edge's source and target both appear in the vertex list.
#[test]
fn invariant_no_dangling_edges() {
	let trails = vec![
		trail("a", TrailKind::Trail, vec![(0.0, 0.0), (0.01, 0.0)]),
		trail("b", TrailKind::Trail, vec![(0.01, 0.0), (0.01, 0.01)]),
		trail("c", TrailKind::Trail, vec![(0.01, 0.01), (0.02, 0.02)]),
	];
	let output = run(trails, Config::default());
	let ids: std::collections::HashSet<u64> = output.vertices.iter().map(|v| v.id).collect();
	for edge in &output.edges {
		assert!(ids.contains(&edge.source));
		assert!(ids.contains(&edge.target));
	}
}

/// Invariant: no edge is a self-loop with the default configuration (fusing
/// closed degree-2 cycles is opt-in, left off here).
#[test]
fn invariant_no_self_loops_by_default() {
	let trails = vec![
		trail("a", TrailKind::Trail, vec![(0.0, 0.0), (0.01, 0.0)]),
		trail("b", TrailKind::Trail, vec![(0.01, 0.0), (0.01, 0.01)]),
	];
	let output = run(trails, Config::default());
	for edge in &output.edges {
		assert_ne!(edge.source, edge.target);
	}
}

/// Invariant: a connector trail is never silently dropped just for being
/// short — only the Pruner's explicit dead-end rule removes connector edges,
/// and only when the far end is a true dead end.
#[test]
fn invariant_connector_surviving_a_junction_is_retagged() {
	let trails = vec![
		trail("north", TrailKind::Trail, vec![(0.0, 0.0), (0.01, 0.0)]),
		trail("south", TrailKind::Trail, vec![(0.01, 0.0002), (0.02, 0.0002)]),
		trail("link", TrailKind::Connector, vec![(0.01, 0.0), (0.01, 0.0002)]),
	];
	let output = run(trails, Config::default());
	assert!(output
		.edges
		.iter()
		.any(|e| matches!(e.provenance, EdgeProvenance::ConnectorBridged { .. })));
}
