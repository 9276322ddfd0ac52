//! Stage 4: Vertex Welder (coincidence merger).
//!
//! The Noder only unifies endpoints that land on the exact same grid cell.
//! Independently digitized trails routinely meet a meter or two apart —
//! inside `vertex_merge_meters` but outside `snap_meters`. The Welder finds
//! clusters of such near-coincident vertices via the spatial index, confirms
//! each candidate pair with an exact haversine check, and fuses each cluster
//! into a single vertex at its centroid.

use std::collections::HashMap;

use log::{debug, warn};

use crate::config::Config;
use crate::geom;
use crate::model::{Point3, StageCounts, VertexId};
use crate::spatial::VertexIndex;
use crate::store::WorkingSet;

pub const NAME: &str = "welder";

/// Classic union-find with path compression and union-by-rank, scoped to
/// this stage's clustering pass.
struct UnionFind {
	parent: HashMap<VertexId, VertexId>,
	rank: HashMap<VertexId, u32>,
}

impl UnionFind {
	fn new(ids: impl Iterator<Item = VertexId>) -> Self {
		let mut parent = HashMap::new();
		let mut rank = HashMap::new();
		for id in ids {
			parent.insert(id, id);
			rank.insert(id, 0);
		}
		Self { parent, rank }
	}

	fn find(&mut self, x: VertexId) -> VertexId {
		let p = self.parent[&x];
		if p == x {
			return x;
		}
		let root = self.find(p);
		self.parent.insert(x, root);
		root
	}

	fn union(&mut self, a: VertexId, b: VertexId) {
		let ra = self.find(a);
		let rb = self.find(b);
		if ra == rb {
			return;
		}
		let (lo, hi) = if self.rank[&ra] < self.rank[&rb] {
			(ra, rb)
		} else {
			(rb, ra)
		};
		self.parent.insert(lo, hi);
		if self.rank[&lo] == self.rank[&hi] {
			*self.rank.get_mut(&hi).unwrap() += 1;
		}
	}
}

/// Merges every cluster of vertices within `config.vertex_merge_meters` of
/// one another, including vertices already joined by a direct edge — welding
/// those collapses that edge into a self-loop, which is deleted right after
/// the merge (see the `self_loops` handling below).
pub fn run(ws: &mut WorkingSet, config: &Config, counts: &mut StageCounts) {
	let entries: Vec<(VertexId, f64, f64)> = ws
		.vertices()
		.map(|v| (v.id, v.position.x, v.position.y))
		.collect();
	if entries.len() < 2 {
		return;
	}
	let index = VertexIndex::build(entries.clone());

	let mut uf = UnionFind::new(entries.iter().map(|(id, _, _)| *id));
	for &(id, x, y) in &entries {
		let pos = ws.vertex(id).unwrap().position;
		let radius_deg = geom::meters_to_degrees(config.vertex_merge_meters, y);
		for other in index.within_radius(x, y, radius_deg) {
			if other == id {
				continue;
			}
			let other_pos = ws.vertex(other).unwrap().position;
			if geom::haversine_distance_m(pos, other_pos) > config.vertex_merge_meters {
				continue;
			}
			uf.union(id, other);
		}
	}

	let mut clusters: HashMap<VertexId, Vec<VertexId>> = HashMap::new();
	for &(id, _, _) in &entries {
		let root = uf.find(id);
		clusters.entry(root).or_default().push(id);
	}

	for (_, members) in clusters {
		if members.len() < 2 {
			continue;
		}
		let centroid = centroid_of(ws, &members);
		// lowest id is the stable survivor so output ordering is deterministic
		let keep = *members.iter().min().unwrap();
		for member in members.into_iter() {
			if member == keep {
				continue;
			}
			let self_loops = ws.merge_vertices(keep, member, Some(centroid));
			for edge_id in self_loops {
				warn!("welder produced self-loop edge {edge_id}, dropping");
				ws.remove_edge(edge_id);
				counts.removed += 1;
			}
			counts.merged += 1;
		}
	}
	ws.recompute_degrees();
	debug!("welder merged down to {} vertices", ws.vertex_count());
}

fn centroid_of(ws: &WorkingSet, members: &[VertexId]) -> Point3 {
	let mut sx = 0.0;
	let mut sy = 0.0;
	let mut sz = 0.0;
	for m in members {
		let p = ws.vertex(*m).unwrap().position;
		sx += p.x;
		sy += p.y;
		sz += p.z;
	}
	let n = members.len() as f64;
	Point3::new(sx / n, sy / n, sz / n)
}
