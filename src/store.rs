//! The arena-addressed working set shared by every pipeline stage.
//!
//! Vertices and edges live in parallel `IndexMap`s addressed by integer id
//! (never by owning reference), with an incidence list rebuilt whenever a
//! stage needs it fresh. This replaces the teacher's generic,
//! trait-object-edge `Graph<NId, N, E>` with a concrete store tailored to
//! this pipeline's `Vertex`/`Edge` types, but keeps its IndexMap-backed
//! incidence-list shape.

use indexmap::IndexMap;

use crate::error::StageError;
use crate::model::{Edge, EdgeId, EdgeProvenance, Point3, Vertex, VertexId};

/// Owns every vertex and edge for the duration of a run.
#[derive(Default)]
pub struct WorkingSet {
	vertices: IndexMap<VertexId, Vertex>,
	edges: IndexMap<EdgeId, Edge>,
	incidence: IndexMap<VertexId, Vec<EdgeId>>,
	next_vertex: u64,
	next_edge: u64,
}

impl WorkingSet {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn vertex_count(&self) -> usize {
		self.vertices.len()
	}

	pub fn edge_count(&self) -> usize {
		self.edges.len()
	}

	pub fn add_vertex(&mut self, position: Point3) -> VertexId {
		let id = VertexId(self.next_vertex);
		self.next_vertex += 1;
		self.vertices.insert(
			id,
			Vertex {
				id,
				position,
				degree: 0,
			},
		);
		self.incidence.insert(id, Vec::new());
		id
	}

	pub fn add_edge(
		&mut self,
		source: VertexId,
		target: VertexId,
		geometry: crate::model::Geometry3,
		length_km: f64,
		elevation_gain_m: f64,
		elevation_loss_m: f64,
		name: Option<String>,
		kind: Option<crate::model::TrailKind>,
		provenance: EdgeProvenance,
	) -> EdgeId {
		let id = EdgeId(self.next_edge);
		self.next_edge += 1;
		self.edges.insert(
			id,
			Edge {
				id,
				source,
				target,
				geometry,
				length_km,
				elevation_gain_m,
				elevation_loss_m,
				name,
				kind,
				provenance,
			},
		);
		self.incidence.entry(source).or_default().push(id);
		if target != source {
			self.incidence.entry(target).or_default().push(id);
		}
		id
	}

	/// Removes an edge and its incidence entries. Does not touch either
	/// endpoint's vertex record; call [`Self::recompute_degrees`] afterward.
	pub fn remove_edge(&mut self, id: EdgeId) -> Option<Edge> {
		let edge = self.edges.shift_remove(id)?;
		if let Some(list) = self.incidence.get_mut(&edge.source) {
			list.retain(|e| *e != id);
		}
		if edge.target != edge.source {
			if let Some(list) = self.incidence.get_mut(&edge.target) {
				list.retain(|e| *e != id);
			}
		}
		Some(edge)
	}

	/// Removes a vertex. Callers must ensure it has no incident edges first
	/// (orphan cleanup happens explicitly in the stages that create orphans).
	pub fn remove_vertex(&mut self, id: VertexId) -> Option<Vertex> {
		self.incidence.shift_remove(&id);
		self.vertices.shift_remove(&id)
	}

	/// Reroutes one endpoint of `edge` from `old` to `new`, keeping incidence
	/// lists consistent. Used by stages that merge vertex identity after
	/// edges already exist (the Welder, the Connector Integrator).
	pub fn repoint_edge_endpoint(&mut self, edge_id: EdgeId, old: VertexId, new: VertexId) {
		if let Some(edge) = self.edges.get_mut(&edge_id) {
			if edge.source == old {
				edge.source = new;
			}
			if edge.target == old {
				edge.target = new;
			}
		}
		if let Some(list) = self.incidence.get_mut(&old) {
			list.retain(|e| *e != edge_id);
		}
		self.incidence.entry(new).or_default().push(edge_id);
	}

	/// Merges `remove` into `keep`: every edge incident to `remove` is
	/// repointed to `keep`, `remove` is deleted, and `keep`'s position is
	/// updated if `new_position` is given. Returns the ids of any edges that
	/// became self-loops as a result (both endpoints now `keep`) — the
	/// caller decides whether to drop them.
	pub fn merge_vertices(
		&mut self,
		keep: VertexId,
		remove: VertexId,
		new_position: Option<Point3>,
	) -> Vec<EdgeId> {
		let incident: Vec<EdgeId> = self.incident_edges(remove).to_vec();
		for edge_id in &incident {
			self.repoint_edge_endpoint(*edge_id, remove, keep);
		}
		self.remove_vertex(remove);
		if let Some(pos) = new_position {
			if let Some(v) = self.vertex_mut(keep) {
				v.position = pos;
			}
		}
		incident
			.into_iter()
			.filter(|eid| self.edge(*eid).map(|e| e.is_self_loop()).unwrap_or(false))
			.collect()
	}

	pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
		self.vertices.get(&id)
	}

	pub fn vertex_mut(&mut self, id: VertexId) -> Option<&mut Vertex> {
		self.vertices.get_mut(&id)
	}

	pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
		self.edges.get(&id)
	}

	pub fn edge_mut(&mut self, id: EdgeId) -> Option<&mut Edge> {
		self.edges.get_mut(&id)
	}

	pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
		self.vertices.values()
	}

	pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
		self.vertices.keys().copied()
	}

	pub fn edges(&self) -> impl Iterator<Item = &Edge> {
		self.edges.values()
	}

	pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
		self.edges.keys().copied()
	}

	pub fn incident_edges(&self, id: VertexId) -> &[EdgeId] {
		self.incidence.get(&id).map(Vec::as_slice).unwrap_or(&[])
	}

	/// Ids of vertices directly reachable from `id` via one edge. A
	/// self-loop contributes `id` itself once per occurrence.
	pub fn neighbors(&self, id: VertexId) -> Vec<VertexId> {
		self.incident_edges(id)
			.iter()
			.filter_map(|eid| self.edges.get(eid))
			.map(|e| e.other(id))
			.collect()
	}

	pub fn degree(&self, id: VertexId) -> u32 {
		self.incident_edges(id).len() as u32
	}

	/// Recomputes every vertex's cached `degree` from the incidence lists.
	/// Run after any batch of edge mutations, before relying on `.degree`.
	pub fn recompute_degrees(&mut self) {
		let degrees: Vec<(VertexId, u32)> = self
			.vertices
			.keys()
			.map(|id| (*id, self.incidence.get(id).map(Vec::len).unwrap_or(0) as u32))
			.collect();
		for (id, degree) in degrees {
			if let Some(v) = self.vertices.get_mut(&id) {
				v.degree = degree;
			}
		}
	}

	/// Removes every vertex with zero incident edges. Returns how many were
	/// removed.
	pub fn prune_orphan_vertices(&mut self) -> usize {
		let orphans: Vec<VertexId> = self
			.vertices
			.keys()
			.copied()
			.filter(|id| self.incident_edges(*id).is_empty())
			.collect();
		for id in &orphans {
			self.remove_vertex(*id);
		}
		orphans.len()
	}

	/// Validates the structural invariants a stage must leave intact:
	/// no dangling edges, no unexpected self-loops (callers pass `false` for
	/// `allow_self_loops` everywhere except where the spec explicitly allows
	/// a fused closed cycle), and cached degrees consistent with incidence.
	pub fn validate(&self, allow_self_loops: bool) -> Result<(), StageError> {
		for edge in self.edges.values() {
			if !self.vertices.contains_key(&edge.source) {
				return Err(StageError::DanglingEdge {
					edge: edge.id,
					missing_vertex: edge.source,
				});
			}
			if !self.vertices.contains_key(&edge.target) {
				return Err(StageError::DanglingEdge {
					edge: edge.id,
					missing_vertex: edge.target,
				});
			}
			if !allow_self_loops && edge.is_self_loop() {
				return Err(StageError::SelfLoop { edge: edge.id });
			}
		}
		for vertex in self.vertices.values() {
			let actual = self.degree(vertex.id);
			if vertex.degree != actual {
				return Err(StageError::DegreeMismatch {
					vertex: vertex.id,
					expected: vertex.degree,
					actual,
				});
			}
		}
		Ok(())
	}

	/// Degree histogram over all vertices, for the run report.
	pub fn degree_histogram(&self) -> std::collections::BTreeMap<u32, usize> {
		let mut hist = std::collections::BTreeMap::new();
		for v in self.vertices.values() {
			*hist.entry(v.degree).or_insert(0) += 1;
		}
		hist
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::Geometry3;

	fn pt(x: f64, y: f64) -> Point3 {
		Point3::new(x, y, 0.0)
	}

	fn simple_edge_geom(a: Point3, b: Point3) -> Geometry3 {
		Geometry3::new(vec![a, b])
	}

	#[test]
	fn add_edge_updates_incidence_both_ends() {
		let mut ws = WorkingSet::new();
		let a = ws.add_vertex(pt(0.0, 0.0));
		let b = ws.add_vertex(pt(1.0, 0.0));
		let e = ws.add_edge(
			a,
			b,
			simple_edge_geom(pt(0.0, 0.0), pt(1.0, 0.0)),
			0.1,
			0.0,
			0.0,
			None,
			None,
			EdgeProvenance::Bridge,
		);
		ws.recompute_degrees();
		assert_eq!(ws.degree(a), 1);
		assert_eq!(ws.degree(b), 1);
		assert_eq!(ws.incident_edges(a), &[e]);
	}

	#[test]
	fn remove_edge_clears_incidence_and_leaves_orphans_prunable() {
		let mut ws = WorkingSet::new();
		let a = ws.add_vertex(pt(0.0, 0.0));
		let b = ws.add_vertex(pt(1.0, 0.0));
		let e = ws.add_edge(
			a,
			b,
			simple_edge_geom(pt(0.0, 0.0), pt(1.0, 0.0)),
			0.1,
			0.0,
			0.0,
			None,
			None,
			EdgeProvenance::Bridge,
		);
		ws.remove_edge(e);
		ws.recompute_degrees();
		assert_eq!(ws.degree(a), 0);
		assert_eq!(ws.prune_orphan_vertices(), 2);
		assert_eq!(ws.vertex_count(), 0);
	}

	#[test]
	fn validate_rejects_self_loop_by_default() {
		let mut ws = WorkingSet::new();
		let a = ws.add_vertex(pt(0.0, 0.0));
		ws.add_edge(
			a,
			a,
			simple_edge_geom(pt(0.0, 0.0), pt(0.0, 0.0)),
			0.0,
			0.0,
			0.0,
			None,
			None,
			EdgeProvenance::Bridge,
		);
		ws.recompute_degrees();
		assert!(ws.validate(false).is_err());
		assert!(ws.validate(true).is_ok());
	}

	#[test]
	fn validate_detects_dangling_edge() {
		let mut ws = WorkingSet::new();
		let a = ws.add_vertex(pt(0.0, 0.0));
		let b = ws.add_vertex(pt(1.0, 0.0));
		ws.add_edge(
			a,
			b,
			simple_edge_geom(pt(0.0, 0.0), pt(1.0, 0.0)),
			0.1,
			0.0,
			0.0,
			None,
			None,
			EdgeProvenance::Bridge,
		);
		ws.remove_vertex(b);
		assert!(ws.validate(false).is_err());
	}
}
