//! Geometry operations backing every stage's tolerance checks.
//!
//! A thin, purpose-built wrapper over the `geo` crate rather than ad hoc
//! trigonometry scattered across stages — the abstraction the design notes
//! call for. Every function here is a free function; there is no trait
//! object indirection because there is exactly one implementation.

use geo::algorithm::euclidean_length::EuclideanLength;
use geo::algorithm::haversine_distance::HaversineDistance;
use geo::algorithm::simplify::Simplify;
use geo::{Coordinate, LineString, Point};

use crate::model::{Geometry3, Point3};

const EARTH_RADIUS_M: f64 = 6_371_008.8;

fn to_point(p: Point3) -> Point<f64> {
	Point::new(p.x, p.y)
}

/// Great-circle distance between two points, in meters. Ignores elevation —
/// every tolerance in the specification is a planar/ground tolerance.
pub fn haversine_distance_m(a: Point3, b: Point3) -> f64 {
	to_point(a).haversine_distance(&to_point(b))
}

/// Local scale factor converting a metric tolerance into degrees of
/// longitude/latitude at the given latitude. Used to size a spatial-index
/// query envelope cheaply; callers must still confirm candidates with
/// [`haversine_distance_m`].
pub fn meters_to_degrees(m: f64, at_lat_deg: f64) -> f64 {
	let lat_rad = at_lat_deg.to_radians();
	let meters_per_degree_lat = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;
	let meters_per_degree_lon = meters_per_degree_lat * lat_rad.cos().max(1e-6);
	m / meters_per_degree_lat.min(meters_per_degree_lon).max(1e-6)
}

fn to_linestring(g: &Geometry3) -> LineString<f64> {
	LineString::from(
		g.points
			.iter()
			.map(|p| Coordinate { x: p.x, y: p.y })
			.collect::<Vec<_>>(),
	)
}

fn from_linestring(ls: &LineString<f64>, template: &Geometry3) -> Geometry3 {
	// Simplify only drops points; elevation is carried forward by nearest
	// surviving input vertex so every simplified point keeps a plausible z.
	let points = ls
		.points_iter()
		.map(|pt| {
			let z = template
				.points
				.iter()
				.min_by(|a, b| {
					let da = (a.x - pt.x()).powi(2) + (a.y - pt.y()).powi(2);
					let db = (b.x - pt.x()).powi(2) + (b.y - pt.y()).powi(2);
					da.partial_cmp(&db).unwrap()
				})
				.map(|p| p.z)
				.unwrap_or(0.0);
			Point3::new(pt.x(), pt.y(), z)
		})
		.collect();
	Geometry3::new(points)
}

/// Douglas-Peucker simplification at `epsilon_m`, applied by the Preprocessor.
/// `epsilon_m` is treated as degrees-equivalent at the line's first point's
/// latitude — adequate for the short, local trail segments this pipeline
/// handles.
pub fn simplify(g: &Geometry3, epsilon_m: f64) -> Geometry3 {
	if g.points.len() < 3 {
		return g.clone();
	}
	let lat = g.points[0].y;
	let epsilon_deg = meters_to_degrees(epsilon_m, lat);
	let ls = to_linestring(g);
	let simplified = ls.simplify(&epsilon_deg);
	from_linestring(&simplified, g)
}

/// Practical validity subset: non-empty, at least two points, and no
/// immediately adjacent duplicate points beyond `snap_meters`. The `geo`
/// crate at this vintage does not ship a full OGC validity oracle, so this
/// implements exactly what the pipeline needs rather than reaching for one.
pub fn is_valid(g: &Geometry3, snap_meters: f64) -> bool {
	if g.points.len() < 2 {
		return false;
	}
	!g.points.windows(2).any(|w| {
		w[0].x == w[1].x && w[0].y == w[1].y && w[0].z == w[1].z
			&& haversine_distance_m(w[0], w[1]) < snap_meters * 0.01
	})
}

/// A line is simple if no two non-adjacent segments cross. Adjacent segments
/// sharing an endpoint are expected (they share a vertex) and not a
/// violation.
pub fn is_simple(g: &Geometry3) -> bool {
	let n = g.points.len();
	if n < 2 {
		return false;
	}
	for i in 0..n.saturating_sub(1) {
		for j in (i + 2)..n.saturating_sub(1) {
			if i == 0 && j == n - 2 {
				// closed ring: shared start/end point is not a self-crossing
				continue;
			}
			let a1 = g.points[i];
			let a2 = g.points[i + 1];
			let b1 = g.points[j];
			let b2 = g.points[j + 1];
			if segments_intersect(a1, a2, b1, b2).is_some() {
				return false;
			}
		}
	}
	true
}

/// Parametric segment intersection test, returning the intersection point
/// (with interpolated elevation) when the two closed segments cross or
/// touch. `geo` at this vintage does not expose a line-intersection-point
/// primitive, so this is implemented directly.
pub(crate) fn segments_intersect(p1: Point3, p2: Point3, p3: Point3, p4: Point3) -> Option<Point3> {
	let (x1, y1) = (p1.x, p1.y);
	let (x2, y2) = (p2.x, p2.y);
	let (x3, y3) = (p3.x, p3.y);
	let (x4, y4) = (p4.x, p4.y);

	let denom = (x1 - x2) * (y3 - y4) - (y1 - y2) * (x3 - x4);
	if denom.abs() < 1e-15 {
		return None; // parallel or collinear; treated as no crossing point
	}

	let t = ((x1 - x3) * (y3 - y4) - (y1 - y3) * (x3 - x4)) / denom;
	let u = ((x1 - x3) * (y1 - y2) - (y1 - y3) * (x1 - x2)) / denom;

	if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
		let x = x1 + t * (x2 - x1);
		let y = y1 + t * (y2 - y1);
		let z = p1.z + t * (p2.z - p1.z);
		Some(Point3::new(x, y, z))
	} else {
		None
	}
}

/// All pairwise intersection points between two polylines' segments,
/// including crossings internal to a single line when `a` and `b` are the
/// same geometry (self-intersections), used by the Noder to split trails at
/// crossing points not already shared vertices.
pub fn intersection_points(a: &Geometry3, b: &Geometry3) -> Vec<Point3> {
	let mut out = Vec::new();
	let same = std::ptr::eq(a, b);
	for i in 0..a.points.len().saturating_sub(1) {
		let j_start = if same { i + 2 } else { 0 };
		for j in j_start..b.points.len().saturating_sub(1) {
			if same && j + 1 == i {
				continue;
			}
			if let Some(pt) =
				segments_intersect(a.points[i], a.points[i + 1], b.points[j], b.points[j + 1])
			{
				out.push(pt);
			}
		}
	}
	out
}

/// Pairwise intersection points between two polylines, tagged with the
/// segment index (into `a` and `b` respectively) each crossing falls on —
/// the information the Noder needs to splice a new vertex into both
/// polylines at the right place.
pub fn intersection_points_indexed(a: &Geometry3, b: &Geometry3) -> Vec<(usize, usize, Point3)> {
	let mut out = Vec::new();
	for i in 0..a.points.len().saturating_sub(1) {
		for j in 0..b.points.len().saturating_sub(1) {
			if let Some(pt) =
				segments_intersect(a.points[i], a.points[i + 1], b.points[j], b.points[j + 1])
			{
				out.push((i, j, pt));
			}
		}
	}
	out
}

/// Quantizes a point onto a uniform metric grid of the given resolution,
/// used by the Noder to merge near-coincident endpoints before vertex
/// identity is assigned.
pub fn snap_to_grid(p: Point3, resolution_m: f64) -> Point3 {
	let deg = meters_to_degrees(resolution_m, p.y);
	if deg <= 0.0 {
		return p;
	}
	Point3::new(
		(p.x / deg).round() * deg,
		(p.y / deg).round() * deg,
		p.z,
	)
}

/// Stitches an ordered, oriented sequence of polylines into one continuous
/// polyline. Returns `None` when consecutive segments fail to join within
/// `tolerance_m` — a local "this fusion does not hold together" signal, not
/// a `StageError`.
pub fn line_merge(segments: &[Geometry3], tolerance_m: f64) -> Option<Geometry3> {
	let mut points: Vec<Point3> = Vec::new();
	for (idx, seg) in segments.iter().enumerate() {
		if seg.points.is_empty() {
			return None;
		}
		if idx == 0 {
			points.extend_from_slice(&seg.points);
			continue;
		}
		let last = *points.last().unwrap();
		let next_start = seg.points[0];
		if haversine_distance_m(last, next_start) > tolerance_m {
			return None;
		}
		points.extend_from_slice(&seg.points[1..]);
	}
	Some(Geometry3::new(points))
}

/// Total planar length of a polyline, in meters, approximated by summing
/// haversine segment lengths (accurate for the short, local trail segments
/// this pipeline handles; avoids `EuclideanLength`'s flat-plane assumption).
pub fn length_meters(g: &Geometry3) -> f64 {
	g.points
		.windows(2)
		.map(|w| haversine_distance_m(w[0], w[1]))
		.sum()
}

/// Distance between two geometries' nearest endpoints, in meters. Used for
/// coarse gap checks before a full candidate confirmation.
pub fn distance_meters(a: &Geometry3, b: &Geometry3) -> f64 {
	let (Some(a_end), Some(b_start)) = (a.end(), b.start()) else {
		return f64::INFINITY;
	};
	haversine_distance_m(a_end, b_start)
}

/// Planar bounding box `[min_x, min_y, max_x, max_y]`.
pub fn envelope(g: &Geometry3) -> [f64; 4] {
	let mut min_x = f64::INFINITY;
	let mut min_y = f64::INFINITY;
	let mut max_x = f64::NEG_INFINITY;
	let mut max_y = f64::NEG_INFINITY;
	for p in &g.points {
		min_x = min_x.min(p.x);
		min_y = min_y.min(p.y);
		max_x = max_x.max(p.x);
		max_y = max_y.max(p.y);
	}
	[min_x, min_y, max_x, max_y]
}

/// Euclidean (planar, degrees²-based) length, used only as a cheap ordering
/// key where the absolute unit doesn't matter (e.g. comparing two
/// candidates for "longer"). Prefer [`length_meters`] whenever an absolute
/// distance is needed.
pub fn planar_length_key(g: &Geometry3) -> f64 {
	to_linestring(g).euclidean_length()
}
