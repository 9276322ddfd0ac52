//! Pipeline configuration, loaded from YAML the way the teacher's
//! `meta::Parameters` is loaded — a flat, serializable options struct with a
//! `Default` impl giving the specification's stated defaults.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Policy for resolving duplicate/near-duplicate edges between the same
/// endpoint pair, applied by the Edge Deduplicator. Ties within a policy are
/// broken by lowest edge ID.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
	/// Keep the shortest of the duplicate group, drop the rest.
	KeepShortest,
	/// Keep the longest of the duplicate group, drop the rest.
	KeepLongest,
}

impl Default for DedupPolicy {
	fn default() -> Self {
		DedupPolicy::KeepShortest
	}
}

/// All tunables named in the specification's external interfaces section.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
	/// Coordinate-snap resolution used by the Preprocessor/Noder, in meters.
	pub snap_meters: f64,
	/// Maximum separation at which two vertices are merged by the Welder, in meters.
	pub vertex_merge_meters: f64,
	/// Maximum gap the Gap Bridger will close with a synthetic edge, in meters.
	pub gap_bridge_meters: f64,
	/// Tolerance the Connector Integrator uses for its own dead-end welding
	/// pass over connector endpoints, in meters.
	pub connector_tolerance_meters: f64,
	/// Maximum join tolerance used by the Degree-2 Chain Compactor, in meters.
	pub chain_join_meters: f64,
	/// Connector edges shorter than this whose far end is a degree-1 dead
	/// end are candidates for pruning, in meters (the specification's
	/// `maxConnectorLengthMeters`).
	pub short_dead_end_meters: f64,
	/// Trails shorter than this are dropped by the Preprocessor, in meters.
	pub min_trail_length_meters: f64,
	/// Maximum angular deviation (degrees) tolerated when fusing a degree-2 chain.
	pub max_chain_turn_degrees: f64,
	/// Policy used by the Edge Deduplicator when multiple edges share an endpoint pair.
	pub dedup_policy: DedupPolicy,
	/// Whether a closed cycle made entirely of degree-2 vertices is fused into one
	/// self-loop edge, or left as a cycle of unfused edges (an Open Question from §9).
	pub fuse_closed_degree2_cycles: bool,
	/// Upper bound on Preprocessor simplification epsilon, in meters.
	pub simplify_epsilon_meters: f64,
	/// Maximum number of dangling short-trail bridging passes before giving up (§4.2).
	pub max_bridging_passes: u32,
	/// Maximum number of edges a single Degree-2 Chain Compactor chain may
	/// span before the walk stops extending, to bound the walk's length.
	pub max_chain_edges: u32,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			snap_meters: 0.5,
			vertex_merge_meters: 5.0,
			gap_bridge_meters: 15.0,
			connector_tolerance_meters: 15.0,
			chain_join_meters: 2.0,
			short_dead_end_meters: 20.0,
			min_trail_length_meters: 1.0,
			max_chain_turn_degrees: 45.0,
			dedup_policy: DedupPolicy::default(),
			fuse_closed_degree2_cycles: false,
			simplify_epsilon_meters: 1.0,
			max_bridging_passes: 3,
			max_chain_edges: 20,
		}
	}
}

impl Config {
	pub fn from_yaml_reader<R: std::io::Read>(reader: R) -> Result<Self, ConfigError> {
		let cfg: Config = serde_yaml::from_reader(reader)?;
		cfg.validate()?;
		Ok(cfg)
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.snap_meters <= 0.0 {
			return Err(ConfigError::Invalid("snap_meters must be positive".into()));
		}
		if self.vertex_merge_meters < self.snap_meters {
			return Err(ConfigError::Invalid(
				"vertex_merge_meters must be >= snap_meters".into(),
			));
		}
		if self.max_chain_turn_degrees <= 0.0 || self.max_chain_turn_degrees > 180.0 {
			return Err(ConfigError::Invalid(
				"max_chain_turn_degrees must be in (0, 180]".into(),
			));
		}
		Ok(())
	}
}
