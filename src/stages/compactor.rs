//! Stage 9: Degree-2 Chain Compactor.
//!
//! The last and most delicate stage. Every vertex of degree 2 is, from a
//! routing standpoint, not really a junction at all — it's a shape point
//! that only exists because the Noder had to assign *some* vertex identity
//! to an endpoint. This stage finds every maximal run of degree-2 vertices
//! (a "chain") and fuses it into a single edge between its two real
//! junctions, shrinking the graph to just the vertices that matter for
//! routing (branch points, dead ends, and true intersections).
//!
//! Each chain goes through a small state machine:
//!
//! - **Seed**: pick an unclaimed degree-2 vertex.
//! - **Extend**: walk outward in both directions, stopping at a non-degree-2
//!   vertex, a turn sharper than `max_chain_turn_degrees`, `max_chain_edges`
//!   edges traversed on that side, or (for a ring made entirely of degree-2
//!   vertices) back at the seed itself.
//! - **Finalize**: the walk's geometry is stitched with [`geom::line_merge`];
//!   success replaces every consumed edge/vertex with one fused edge.
//! - **Reject**: the stitch fails (or a closed ring isn't permitted by
//!   config), so the chain's edges are left exactly as they were.
//!
//! Because every degree-2 vertex seeds the same maximal chain as every other
//! member of that chain, candidates would naturally partition the graph
//! without overlap — except a vertex can simultaneously be the apparent
//! terminus of two different walks when a turn-angle break happens to land
//! asymmetrically. [`select_non_overlapping`] resolves any such conflicts
//! deterministically: the longer chain wins, ties go to the longer total
//! length, and remaining ties are broken by the lexicographically smaller
//! boundary-id pair.

use std::collections::HashSet;

use log::{debug, warn};

use crate::config::Config;
use crate::geom;
use crate::model::{EdgeId, EdgeProvenance, Geometry3, StageCounts, VertexId};
use crate::store::WorkingSet;

pub const NAME: &str = "compactor";

struct Walk {
	/// Vertices visited after the seed, in travel order; the last entry is
	/// the boundary vertex the walk stopped at (or the seed again, for a
	/// closed ring).
	vertices: Vec<VertexId>,
	/// Edges traversed, aligned with `vertices` (edges[i] leads to vertices[i]).
	edges: Vec<EdgeId>,
	closed_loop: bool,
}

fn oriented_starting_at(ws: &WorkingSet, edge_id: EdgeId, vertex: VertexId) -> Geometry3 {
	let edge = ws.edge(edge_id).expect("chain edge must exist");
	if edge.source == vertex {
		edge.geometry.clone()
	} else {
		edge.geometry.reversed()
	}
}

fn oriented_ending_at(ws: &WorkingSet, edge_id: EdgeId, vertex: VertexId) -> Geometry3 {
	let edge = ws.edge(edge_id).expect("chain edge must exist");
	if edge.target == vertex {
		edge.geometry.clone()
	} else {
		edge.geometry.reversed()
	}
}

fn angle_between_degrees(a: (f64, f64), b: (f64, f64)) -> f64 {
	let mag_a = (a.0 * a.0 + a.1 * a.1).sqrt();
	let mag_b = (b.0 * b.0 + b.1 * b.1).sqrt();
	if mag_a < 1e-15 || mag_b < 1e-15 {
		return 0.0; // degenerate shape point; don't let it block a fusion
	}
	let cos_theta = ((a.0 * b.0 + a.1 * b.1) / (mag_a * mag_b)).clamp(-1.0, 1.0);
	cos_theta.acos().to_degrees()
}

/// Whether continuing the chain from `edge_in` through `at_vertex` onto
/// `edge_out` stays within the configured turn tolerance.
fn within_turn_tolerance(
	ws: &WorkingSet,
	config: &Config,
	edge_in: EdgeId,
	edge_out: EdgeId,
	at_vertex: VertexId,
) -> bool {
	let incoming = oriented_ending_at(ws, edge_in, at_vertex);
	let outgoing = oriented_starting_at(ws, edge_out, at_vertex);
	if incoming.points.len() < 2 || outgoing.points.len() < 2 {
		return true;
	}
	let n = incoming.points.len();
	let vec_in = (
		incoming.points[n - 1].x - incoming.points[n - 2].x,
		incoming.points[n - 1].y - incoming.points[n - 2].y,
	);
	let vec_out = (
		outgoing.points[1].x - outgoing.points[0].x,
		outgoing.points[1].y - outgoing.points[0].y,
	);
	angle_between_degrees(vec_in, vec_out) <= config.max_chain_turn_degrees
}

fn walk_one_side(ws: &WorkingSet, config: &Config, seed: VertexId, first_edge: EdgeId) -> Walk {
	let mut vertices = Vec::new();
	let mut edges = vec![first_edge];
	let mut prev_edge = first_edge;
	let mut current = ws.edge(first_edge).unwrap().other(seed);

	loop {
		vertices.push(current);
		if current == seed {
			return Walk {
				vertices,
				edges,
				closed_loop: true,
			};
		}
		if ws.degree(current) != 2 {
			return Walk {
				vertices,
				edges,
				closed_loop: false,
			};
		}
		if edges.len() as u32 >= config.max_chain_edges {
			return Walk {
				vertices,
				edges,
				closed_loop: false,
			};
		}
		let incident = ws.incident_edges(current);
		let next_edge = match incident.iter().find(|e| **e != prev_edge) {
			Some(e) => *e,
			None => {
				return Walk {
					vertices,
					edges,
					closed_loop: false,
				}
			}
		};
		if !within_turn_tolerance(ws, config, prev_edge, next_edge, current) {
			return Walk {
				vertices,
				edges,
				closed_loop: false,
			};
		}
		let next_vertex = ws.edge(next_edge).unwrap().other(current);
		edges.push(next_edge);
		prev_edge = next_edge;
		current = next_vertex;
	}
}

/// A candidate maximal chain, ready to be fused pending overlap resolution.
struct ChainCandidate {
	/// Full vertex path, boundary to boundary inclusive (for a closed ring,
	/// the seed appears only once, at index 0).
	vertices: Vec<VertexId>,
	/// Edges aligned with `vertices`: `edges[i]` is traversed departing
	/// `vertices[i]` (or the seed, for `edges[0]`) and arriving `vertices[i+1]`.
	edges: Vec<EdgeId>,
	boundary_a: VertexId,
	boundary_b: VertexId,
	closed: bool,
	total_length_km: f64,
}

impl ChainCandidate {
	/// The vertices actually deleted when this chain fuses: every interior
	/// degree-2 vertex, plus (for a closed ring) all but the surviving seed.
	fn consumed_vertices(&self) -> Vec<VertexId> {
		if self.closed {
			self.vertices[1..].to_vec()
		} else if self.vertices.len() <= 2 {
			Vec::new()
		} else {
			self.vertices[1..self.vertices.len() - 1].to_vec()
		}
	}

	fn dedup_key(&self) -> Vec<EdgeId> {
		let mut edges = self.edges.clone();
		edges.sort();
		edges
	}
}

fn build_candidate(ws: &WorkingSet, config: &Config, seed: VertexId) -> Option<ChainCandidate> {
	if ws.degree(seed) != 2 {
		return None;
	}
	let incident = ws.incident_edges(seed).to_vec();
	if incident.len() != 2 || incident[0] == incident[1] {
		return None;
	}
	let (e_a, e_b) = (incident[0], incident[1]);
	if !within_turn_tolerance(ws, config, e_a, e_b, seed) {
		// the seed itself is as much a pass-through point as any vertex
		// visited mid-walk; too sharp a turn here means it cannot join a
		// chain at all and stays an unfused degree-2 vertex.
		return None;
	}

	let walk_a = walk_one_side(ws, config, seed, e_a);
	let chosen = if walk_a.closed_loop {
		walk_a
	} else {
		let walk_b = walk_one_side(ws, config, seed, e_b);
		if walk_b.closed_loop {
			walk_b
		} else {
			let mut vertices: Vec<VertexId> = walk_a.vertices.iter().rev().copied().collect();
			vertices.push(seed);
			vertices.extend(walk_b.vertices.iter().copied());

			let mut edges: Vec<EdgeId> = walk_a.edges.iter().rev().copied().collect();
			edges.extend(walk_b.edges.iter().copied());

			let boundary_a = *walk_a.vertices.last().unwrap();
			let boundary_b = *walk_b.vertices.last().unwrap();

			let total_length_km = edges
				.iter()
				.map(|e| ws.edge(*e).unwrap().length_km)
				.sum();
			return Some(ChainCandidate {
				vertices,
				edges,
				boundary_a,
				boundary_b,
				closed: false,
				total_length_km,
			});
		}
	};

	let mut vertices = vec![seed];
	vertices.extend(chosen.vertices.iter().copied().filter(|v| *v != seed));
	let total_length_km = chosen.edges.iter().map(|e| ws.edge(*e).unwrap().length_km).sum();
	Some(ChainCandidate {
		vertices,
		edges: chosen.edges,
		boundary_a: seed,
		boundary_b: seed,
		closed: true,
		total_length_km,
	})
}

fn lexicographic_key(c: &ChainCandidate) -> (u64, u64) {
	let (a, b) = (c.boundary_a.0, c.boundary_b.0);
	if a <= b {
		(a, b)
	} else {
		(b, a)
	}
}

/// Greedily selects the priority-ranked, non-overlapping set of chains:
/// longer chain (by vertex count) wins, ties broken by total length, then by
/// the lexicographically smaller boundary-id pair.
fn select_non_overlapping(mut candidates: Vec<ChainCandidate>) -> Vec<ChainCandidate> {
	candidates.sort_by(|a, b| {
		b.vertices
			.len()
			.cmp(&a.vertices.len())
			.then(b.total_length_km.partial_cmp(&a.total_length_km).unwrap())
			.then(lexicographic_key(a).cmp(&lexicographic_key(b)))
	});

	let mut claimed: HashSet<VertexId> = HashSet::new();
	let mut selected = Vec::new();
	for candidate in candidates {
		let consumed = candidate.consumed_vertices();
		if consumed.iter().any(|v| claimed.contains(v)) {
			continue;
		}
		claimed.extend(consumed);
		selected.push(candidate);
	}
	selected
}

fn fuse(ws: &mut WorkingSet, config: &Config, candidate: ChainCandidate, counts: &mut StageCounts) {
	let ordered_geoms: Vec<Geometry3> = candidate
		.edges
		.iter()
		.zip(candidate.vertices.iter())
		.map(|(edge_id, from_vertex)| oriented_starting_at(ws, *edge_id, *from_vertex))
		.collect();

	let merged = match geom::line_merge(&ordered_geoms, config.chain_join_meters) {
		Some(g) => g,
		None => {
			warn!(
				"compactor rejected chain {:?}..{:?}: geometry did not stitch within tolerance",
				candidate.boundary_a, candidate.boundary_b
			);
			return;
		}
	};

	if candidate.closed && !config.fuse_closed_degree2_cycles {
		debug!(
			"compactor leaving closed degree-2 ring at {:?} unfused (fuse_closed_degree2_cycles = false)",
			candidate.boundary_a
		);
		return;
	}

	let (gain, loss) = candidate
		.edges
		.iter()
		.map(|e| {
			let edge = ws.edge(*e).unwrap();
			(edge.elevation_gain_m, edge.elevation_loss_m)
		})
		.fold((0.0, 0.0), |acc, v| (acc.0 + v.0, acc.1 + v.1));
	let name = candidate
		.edges
		.iter()
		.find_map(|e| ws.edge(*e).unwrap().name.clone());
	let kind = candidate
		.edges
		.iter()
		.find_map(|e| ws.edge(*e).unwrap().kind.clone());
	let length_km = geom::length_meters(&merged) / 1000.0;

	let chain_edges = candidate.edges.clone();
	let chain_vertices = candidate.vertices.clone();

	for edge_id in &candidate.edges {
		ws.remove_edge(*edge_id);
	}
	for vertex_id in candidate.consumed_vertices() {
		ws.remove_vertex(vertex_id);
	}

	ws.add_edge(
		candidate.boundary_a,
		candidate.boundary_b,
		merged,
		length_km,
		gain,
		loss,
		name,
		kind,
		EdgeProvenance::MergedChain {
			chain_vertices,
			chain_edges,
		},
	);

	counts.created += 1;
	counts.removed += candidate.edges.len() as u64;
	counts.merged += candidate.consumed_vertices().len() as u64;
}

pub fn run(ws: &mut WorkingSet, config: &Config, counts: &mut StageCounts) {
	let mut seen_edge_sets: HashSet<Vec<EdgeId>> = HashSet::new();
	let mut candidates = Vec::new();
	for seed in ws.vertex_ids().collect::<Vec<_>>() {
		if let Some(candidate) = build_candidate(ws, config, seed) {
			if seen_edge_sets.insert(candidate.dedup_key()) {
				candidates.push(candidate);
			}
		}
	}

	let selected = select_non_overlapping(candidates);
	let attempted = selected.len();
	for candidate in selected {
		fuse(ws, config, candidate, counts);
	}
	ws.recompute_degrees();
	debug!(
		"compactor fused {} chains out of {} candidates into {} new edges",
		counts.created, attempted, counts.created
	);
}
