//! Stage 1: Geometry Preprocessor.
//!
//! Validates each input trail's geometry and simplifies it at
//! `simplify_epsilon_meters`. Trails that fail validation, fall under
//! `min_trail_length_meters`, or duplicate an earlier trail's geometry are
//! dropped and counted, never fatal — the run continues with whatever
//! remains. Dropping a trail can occasionally make a different trail
//! droppable too (simplification at the start of a later pass can shorten a
//! trail past the length floor), so the pass repeats until nothing more
//! changes or `PREPROCESSOR_MAX_PASSES` is reached.

use std::collections::HashSet;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::geom;
use crate::model::{StageCounts, Trail};

const PREPROCESSOR_MAX_PASSES: u32 = 5;

pub const NAME: &str = "preprocessor";

/// Result of a non-mutating pre-flight check over a trail set, surfaced
/// directly to the CLI's `validate` subcommand.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationSummary {
	pub total_trails: usize,
	pub valid_trails: usize,
	pub invalid_trails: usize,
	pub connector_trails: usize,
	pub total_length_km: f64,
}

/// Checks every trail's geometry without mutating anything. Backs both the
/// CLI's `validate` subcommand and the mutating `run` below.
pub fn validate(trails: &[Trail], config: &Config) -> ValidationSummary {
	let mut summary = ValidationSummary {
		total_trails: trails.len(),
		..Default::default()
	};
	for trail in trails {
		if geom::is_valid(&trail.geometry, config.snap_meters) && geom::is_simple(&trail.geometry)
		{
			summary.valid_trails += 1;
			summary.total_length_km += trail.length_km;
		} else {
			summary.invalid_trails += 1;
		}
		if trail.is_connector() {
			summary.connector_trails += 1;
		}
	}
	summary
}

/// A normalized stand-in for "hash of the normalized point sequence": exact
/// equality of rounded-to-snap-tolerance coordinates catches trails that are
/// the same geometry re-ingested under a different UUID.
fn geometry_fingerprint(trail: &Trail, snap_meters: f64) -> Vec<(i64, i64, i64)> {
	let scale = if snap_meters > 0.0 { snap_meters } else { 0.5 };
	trail
		.geometry
		.points
		.iter()
		.map(|p| {
			(
				(p.x / scale).round() as i64,
				(p.y / scale).round() as i64,
				(p.z / scale).round() as i64,
			)
		})
		.collect()
}

/// One pass over the trail set: drops anything failing validity, simplicity,
/// the length floor, or a duplicate-geometry check, and simplifies survivors.
/// Returns the surviving trails and how many were dropped this pass.
fn preprocess_pass(trails: Vec<Trail>, config: &Config, counts: &mut StageCounts) -> (Vec<Trail>, usize) {
	let mut out = Vec::with_capacity(trails.len());
	let mut seen_fingerprints: HashSet<Vec<(i64, i64, i64)>> = HashSet::new();
	let mut dropped = 0usize;
	for mut trail in trails {
		if !geom::is_valid(&trail.geometry, config.snap_meters) {
			warn!("dropping trail {}: invalid geometry", trail.trail_uuid);
			counts.removed += 1;
			dropped += 1;
			continue;
		}
		if !geom::is_simple(&trail.geometry) {
			warn!("dropping trail {}: self-intersecting geometry", trail.trail_uuid);
			counts.removed += 1;
			dropped += 1;
			continue;
		}
		if trail.length_km * 1000.0 < config.min_trail_length_meters {
			warn!(
				"dropping trail {}: length {:.2} m under the {:.2} m floor",
				trail.trail_uuid,
				trail.length_km * 1000.0,
				config.min_trail_length_meters
			);
			counts.removed += 1;
			dropped += 1;
			continue;
		}
		let fingerprint = geometry_fingerprint(&trail, config.snap_meters);
		if !seen_fingerprints.insert(fingerprint) {
			warn!("dropping trail {}: duplicate geometry", trail.trail_uuid);
			counts.removed += 1;
			dropped += 1;
			continue;
		}
		let simplified = geom::simplify(&trail.geometry, config.simplify_epsilon_meters);
		if simplified.point_count() >= 2 {
			trail.geometry = simplified;
			trail.length_km = geom::length_meters(&trail.geometry) / 1000.0;
		}
		debug!(
			"preprocessed trail {} ({} points)",
			trail.trail_uuid,
			trail.geometry.point_count()
		);
		out.push(trail);
	}
	(out, dropped)
}

/// Drops invalid, too-short, and duplicate trails and simplifies the rest,
/// repeating until a pass removes nothing or `PREPROCESSOR_MAX_PASSES` is
/// reached. Returns the cleaned trail set; `counts.removed` records how many
/// were dropped in total.
pub fn run(trails: Vec<Trail>, config: &Config, counts: &mut StageCounts) -> Vec<Trail> {
	let mut current = trails;
	for pass in 0..PREPROCESSOR_MAX_PASSES {
		let (next, dropped) = preprocess_pass(current, config, counts);
		current = next;
		debug!("preprocessor pass {pass}: {dropped} trails dropped");
		if dropped == 0 {
			break;
		}
	}
	current
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::{Geometry3, Point3, TrailKind};

	fn trail(id: &str, points: Vec<(f64, f64)>) -> Trail {
		Trail {
			trail_uuid: id.to_string(),
			name: None,
			kind: TrailKind::Trail,
			length_km: 1.0,
			elevation_gain_m: 0.0,
			elevation_loss_m: 0.0,
			bbox: [0.0, 0.0, 1.0, 1.0],
			geometry: Geometry3::new(
				points.into_iter().map(|(x, y)| Point3::new(x, y, 0.0)).collect(),
			),
		}
	}

	#[test]
	fn drops_degenerate_single_point_trail() {
		let trails = vec![trail("a", vec![(0.0, 0.0)])];
		let mut counts = StageCounts::default();
		let out = run(trails, &Config::default(), &mut counts);
		assert!(out.is_empty());
		assert_eq!(counts.removed, 1);
	}

	#[test]
	fn keeps_valid_trail() {
		let trails = vec![trail("a", vec![(0.0, 0.0), (0.001, 0.001)])];
		let mut counts = StageCounts::default();
		let out = run(trails, &Config::default(), &mut counts);
		assert_eq!(out.len(), 1);
		assert_eq!(counts.removed, 0);
	}

	#[test]
	fn drops_trail_under_min_length() {
		let mut short = trail("a", vec![(0.0, 0.0), (0.0000005, 0.0)]); // ~0.05 m
		short.length_km = 0.00005;
		let mut counts = StageCounts::default();
		let out = run(vec![short], &Config::default(), &mut counts);
		assert!(out.is_empty());
		assert_eq!(counts.removed, 1);
	}

	#[test]
	fn drops_later_duplicate_by_geometry() {
		let trails = vec![
			trail("a", vec![(0.0, 0.0), (0.001, 0.001)]),
			trail("b", vec![(0.0, 0.0), (0.001, 0.001)]),
		];
		let mut counts = StageCounts::default();
		let out = run(trails, &Config::default(), &mut counts);
		assert_eq!(out.len(), 1);
		assert_eq!(out[0].trail_uuid, "a");
		assert_eq!(counts.removed, 1);
	}

	#[test]
	fn validate_does_not_mutate() {
		let trails = vec![trail("a", vec![(0.0, 0.0), (0.001, 0.001)])];
		let summary = validate(&trails, &Config::default());
		assert_eq!(summary.total_trails, 1);
		assert_eq!(summary.valid_trails, 1);
		assert_eq!(trails[0].geometry.point_count(), 2);
	}
}
