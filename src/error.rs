//! Fatal error taxonomy for the pipeline and its configuration layer.
//!
//! Local recoveries (a malformed trail dropped, a fusion skipped) are never
//! represented here — they are counted into the run [`crate::model::Report`]
//! instead, per the error handling design.

use thiserror::Error;

use crate::model::{EdgeId, VertexId};

/// A fatal condition raised by a pipeline stage. Aborts the run; the caller
/// gets back the working set as it stood after the previous stage.
#[derive(Error, Debug)]
pub enum StageError {
	#[error("edge {edge} is a self-loop")]
	SelfLoop { edge: EdgeId },

	#[error("edge {edge} references missing vertex {missing_vertex}")]
	DanglingEdge {
		edge: EdgeId,
		missing_vertex: VertexId,
	},

	#[error("vertex {vertex} has cached degree {expected} but {actual} incident edges")]
	DegreeMismatch {
		vertex: VertexId,
		expected: u32,
		actual: u32,
	},

	#[error("run cancelled during stage {stage}")]
	Cancelled { stage: &'static str },

	#[error("io error: {0}")]
	Io(#[from] std::io::Error),

	#[error("json error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("yaml error: {0}")]
	Yaml(#[from] serde_yaml::Error),
}

/// Errors that can occur loading a [`crate::config::Config`].
#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("io error reading config: {0}")]
	Io(#[from] std::io::Error),

	#[error("yaml error parsing config: {0}")]
	Yaml(#[from] serde_yaml::Error),

	#[error("invalid config: {0}")]
	Invalid(String),
}
