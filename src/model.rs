//! Core data types for the network topology pipeline.
//!
//! Mirrors the wire shapes in the specification: trails come in from the
//! ingest collaborator, vertices and edges are produced for the route-search
//! and export collaborators.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque, stable identifier for an input trail. Never minted by this crate.
pub type TrailId = String;

/// Arena index for a [`Vertex`]. Assigned by the Noder, never reused within a run.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VertexId(pub u64);

impl fmt::Display for VertexId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "v{}", self.0)
	}
}

/// Arena index for an [`Edge`]. Assigned at creation time, never reused within a run.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub u64);

impl fmt::Display for EdgeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "e{}", self.0)
	}
}

/// A 3D point in the working CRS: longitude, latitude, elevation (meters).
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct Point3 {
	pub x: f64,
	pub y: f64,
	pub z: f64,
}

impl Point3 {
	pub fn new(x: f64, y: f64, z: f64) -> Self {
		Self { x, y, z }
	}

	pub fn xy(&self) -> (f64, f64) {
		(self.x, self.y)
	}
}

/// Classification of an input trail. `Connector` trails get special handling
/// in the Connector Integrator and Short Dead-End Pruner.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrailKind {
	Trail,
	Connector,
	#[serde(other)]
	Other,
}

impl TrailKind {
	pub fn is_connector(&self) -> bool {
		matches!(self, TrailKind::Connector)
	}
}

/// A 3D polyline: at least two points, in `(lon, lat, elev)` order.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Geometry3 {
	pub points: Vec<Point3>,
}

impl Geometry3 {
	pub fn new(points: Vec<Point3>) -> Self {
		Self { points }
	}

	pub fn start(&self) -> Option<Point3> {
		self.points.first().copied()
	}

	pub fn end(&self) -> Option<Point3> {
		self.points.last().copied()
	}

	pub fn is_empty(&self) -> bool {
		self.points.is_empty()
	}

	pub fn point_count(&self) -> usize {
		self.points.len()
	}

	pub fn reversed(&self) -> Self {
		let mut points = self.points.clone();
		points.reverse();
		Self { points }
	}
}

/// An input trail record, as produced by the (out of scope) ingest collaborator.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Trail {
	pub trail_uuid: TrailId,
	pub name: Option<String>,
	pub kind: TrailKind,
	pub length_km: f64,
	pub elevation_gain_m: f64,
	pub elevation_loss_m: f64,
	pub bbox: [f64; 4],
	pub geometry: Geometry3,
}

impl Trail {
	pub fn is_connector(&self) -> bool {
		self.kind.is_connector()
			|| self
				.name
				.as_deref()
				.map(|n| n.to_lowercase().contains("connector"))
				.unwrap_or(false)
	}
}

/// Tagged provenance for a routing edge. Replaces the source system's
/// free-form provenance strings (`merged-degree2-chain-...`, `bridge-extend`,
/// `connector-bridged`) with a closed enum, per the redesign notes.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub enum EdgeProvenance {
	/// A direct split of an original input trail.
	Original { trail_id: TrailId },
	/// A synthetic bridge inserted by the Gap Bridger between near-miss endpoints.
	Bridge,
	/// A connector trail's edge, after being normalized/welded by the Connector Integrator.
	ConnectorBridged { connector_trail_id: TrailId },
	/// The result of fusing a maximal degree-2 chain into a single edge.
	MergedChain {
		chain_vertices: Vec<VertexId>,
		chain_edges: Vec<EdgeId>,
	},
}

impl EdgeProvenance {
	pub fn is_connector(&self) -> bool {
		matches!(self, EdgeProvenance::ConnectorBridged { .. })
	}
}

/// A routing vertex.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Vertex {
	pub id: VertexId,
	pub position: Point3,
	/// Cached incident-edge count; kept consistent by `recompute_degrees`.
	pub degree: u32,
}

/// A routing edge.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Edge {
	pub id: EdgeId,
	pub source: VertexId,
	pub target: VertexId,
	pub geometry: Geometry3,
	pub length_km: f64,
	pub elevation_gain_m: f64,
	pub elevation_loss_m: f64,
	pub name: Option<String>,
	pub kind: Option<TrailKind>,
	pub provenance: EdgeProvenance,
}

impl Edge {
	pub fn is_self_loop(&self) -> bool {
		self.source == self.target
	}

	/// The other endpoint of this edge, given one of them.
	pub fn other(&self, from: VertexId) -> VertexId {
		if from == self.source {
			self.target
		} else {
			self.source
		}
	}

	pub fn is_connector(&self) -> bool {
		self.provenance.is_connector()
			|| self
				.kind
				.as_ref()
				.map(|k| k.is_connector())
				.unwrap_or(false)
	}
}

/// Outward-facing vertex shape, per the specification's §6 wire format.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct VertexOut {
	pub id: u64,
	pub x: f64,
	pub y: f64,
	pub z: f64,
	pub degree: u32,
}

impl From<&Vertex> for VertexOut {
	fn from(v: &Vertex) -> Self {
		Self {
			id: v.id.0,
			x: v.position.x,
			y: v.position.y,
			z: v.position.z,
			degree: v.degree,
		}
	}
}

/// Outward-facing edge shape, per the specification's §6 wire format.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct EdgeOut {
	pub id: u64,
	pub source: u64,
	pub target: u64,
	pub length_km: f64,
	pub elevation_gain_m: f64,
	pub elevation_loss_m: f64,
	pub name: Option<String>,
	pub kind: Option<TrailKind>,
	pub provenance: EdgeProvenance,
	pub geometry: Geometry3,
}

impl From<&Edge> for EdgeOut {
	fn from(e: &Edge) -> Self {
		Self {
			id: e.id.0,
			source: e.source.0,
			target: e.target.0,
			length_km: e.length_km,
			elevation_gain_m: e.elevation_gain_m,
			elevation_loss_m: e.elevation_loss_m,
			name: e.name.clone(),
			kind: e.kind.clone(),
			provenance: e.provenance.clone(),
			geometry: e.geometry.clone(),
		}
	}
}

/// Per-stage counters, accumulated into the run [`Report`].
#[derive(Clone, Default, PartialEq, Debug, Serialize, Deserialize)]
pub struct StageCounts {
	pub created: u64,
	pub merged: u64,
	pub removed: u64,
}

/// Report emitted at the end of a run (or on fatal abort, partial).
#[derive(Clone, Default, PartialEq, Debug, Serialize, Deserialize)]
pub struct Report {
	pub stage_counts: indexmap::IndexMap<String, StageCounts>,
	pub degree_histogram: std::collections::BTreeMap<u32, usize>,
	pub stage_durations_ms: std::collections::BTreeMap<String, u128>,
	pub invalid_geometries: u64,
}

impl Report {
	pub fn counts_for(&mut self, stage: &str) -> &mut StageCounts {
		self.stage_counts.entry(stage.to_string()).or_default()
	}
}

/// Final output handed to the route-search / export collaborators.
#[derive(Clone, Default, PartialEq, Debug, Serialize, Deserialize)]
pub struct PipelineOutput {
	pub vertices: Vec<VertexOut>,
	pub edges: Vec<EdgeOut>,
	pub report: Report,
}
