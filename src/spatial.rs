//! R-tree spatial index over vertex positions.
//!
//! Grounded on the same `rstar` bulk-load + `RTreeObject`/`PointDistance`
//! pattern used for road-node snapping in comparable network tooling: the
//! index narrows candidates, every hit is still confirmed against an exact
//! haversine distance before being trusted.

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::model::VertexId;

#[derive(Clone, Copy, Debug)]
struct IndexedVertex {
	xy: [f64; 2],
	id: VertexId,
}

impl RTreeObject for IndexedVertex {
	type Envelope = AABB<[f64; 2]>;

	fn envelope(&self) -> Self::Envelope {
		AABB::from_point(self.xy)
	}
}

impl PointDistance for IndexedVertex {
	fn distance_2(&self, point: &[f64; 2]) -> f64 {
		let dx = self.xy[0] - point[0];
		let dy = self.xy[1] - point[1];
		dx * dx + dy * dy
	}
}

/// Spatial index over a snapshot of vertex positions. Rebuilt whenever a
/// stage needs fresh candidates after mutating the working set — cheap at
/// realistic trail-network sizes and far simpler than incremental
/// maintenance.
pub struct VertexIndex {
	tree: RTree<IndexedVertex>,
}

impl VertexIndex {
	pub fn build<I: IntoIterator<Item = (VertexId, f64, f64)>>(vertices: I) -> Self {
		let entries = vertices
			.into_iter()
			.map(|(id, x, y)| IndexedVertex { xy: [x, y], id })
			.collect();
		Self {
			tree: RTree::bulk_load(entries),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.tree.size() == 0
	}

	/// All vertices within `radius_deg` (degrees, planar) of `(x, y)`,
	/// nearest first. Callers confirm with an exact haversine check.
	pub fn within_radius(&self, x: f64, y: f64, radius_deg: f64) -> Vec<VertexId> {
		let radius_sq = radius_deg * radius_deg;
		self.tree
			.nearest_neighbor_iter_with_distance_2(&[x, y])
			.take_while(|(_, d2)| *d2 <= radius_sq)
			.map(|(v, _)| v.id)
			.collect()
	}

	pub fn nearest(&self, x: f64, y: f64) -> Option<VertexId> {
		self.tree.nearest_neighbor(&[x, y]).map(|v| v.id)
	}
}
