//! The pipeline driver: owns the working set and runs every stage in order.
//!
//! Single-threaded by design (see the concurrency notes) — determinism and
//! testability matter more here than throughput at the trail-network sizes
//! this pipeline targets. A `CancellationToken` is checked between stages so
//! a long-running build can be aborted cleanly from the CLI (e.g. on SIGINT,
//! wired up by `main.rs`).

use std::time::Instant;

use log::info;

use crate::config::Config;
use crate::error::StageError;
use crate::model::{EdgeOut, PipelineOutput, Report, Trail, VertexOut};
use crate::stages::{bridging, compactor, connector, dedup, gap_bridger, noder, preprocessor, pruner, welder};
use crate::stages::CancellationToken;
use crate::store::WorkingSet;

pub struct Pipeline {
	config: Config,
	cancellation: CancellationToken,
}

impl Pipeline {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			cancellation: CancellationToken::new(),
		}
	}

	pub fn cancellation_token(&self) -> CancellationToken {
		self.cancellation.clone()
	}

	fn check_cancelled(&self, stage: &'static str) -> Result<(), StageError> {
		if self.cancellation.is_cancelled() {
			return Err(StageError::Cancelled { stage });
		}
		Ok(())
	}

	/// Runs all nine stages over `trails`, returning the final output. On a
	/// fatal error from stage *N*, returns the error alongside the report
	/// accumulated through stage *N-1* — the most recently completed stage's
	/// progress is what the caller gets back.
	pub fn run(&self, trails: Vec<Trail>, report: &mut Report) -> Result<PipelineOutput, StageError> {
		let trails = self.timed(preprocessor::NAME, report, |counts| {
			self.check_cancelled(preprocessor::NAME)?;
			Ok(preprocessor::run(trails, &self.config, counts))
		})?;

		let trails = self.timed(bridging::NAME, report, |counts| {
			self.check_cancelled(bridging::NAME)?;
			Ok(bridging::run(trails, &self.config, counts))
		})?;

		let mut ws: WorkingSet = self.timed(noder::NAME, report, |counts| {
			self.check_cancelled(noder::NAME)?;
			Ok(noder::run(&trails, &self.config, counts))
		})?;
		ws.validate(false)?;

		self.run_mutating_stage(welder::NAME, report, &mut ws, |ws, config, counts| {
			welder::run(ws, config, counts)
		})?;
		ws.validate(false)?;

		self.run_mutating_stage(gap_bridger::NAME, report, &mut ws, |ws, config, counts| {
			gap_bridger::run(ws, config, counts)
		})?;
		ws.validate(false)?;

		self.run_mutating_stage(connector::NAME, report, &mut ws, |ws, config, counts| {
			connector::run(ws, config, counts)
		})?;
		ws.validate(false)?;

		self.run_mutating_stage(dedup::NAME, report, &mut ws, |ws, config, counts| {
			dedup::run(ws, config, counts)
		})?;
		ws.validate(false)?;

		self.run_mutating_stage(pruner::NAME, report, &mut ws, |ws, config, counts| {
			pruner::run(ws, config, counts)
		})?;
		ws.validate(false)?;

		self.run_mutating_stage(compactor::NAME, report, &mut ws, |ws, config, counts| {
			compactor::run(ws, config, counts)
		})?;
		ws.validate(self.config.fuse_closed_degree2_cycles)?;

		report.degree_histogram = ws.degree_histogram();

		let vertices: Vec<VertexOut> = ws.vertices().map(VertexOut::from).collect();
		let edges: Vec<EdgeOut> = ws.edges().map(EdgeOut::from).collect();
		info!(
			"pipeline finished: {} vertices, {} edges",
			vertices.len(),
			edges.len()
		);

		Ok(PipelineOutput {
			vertices,
			edges,
			report: report.clone(),
		})
	}

	fn timed<T>(
		&self,
		stage: &'static str,
		report: &mut Report,
		f: impl FnOnce(&mut crate::model::StageCounts) -> Result<T, StageError>,
	) -> Result<T, StageError> {
		let start = Instant::now();
		let counts = report.counts_for(stage);
		let mut local_counts = std::mem::take(counts);
		let result = f(&mut local_counts);
		*report.counts_for(stage) = local_counts;
		report
			.stage_durations_ms
			.insert(stage.to_string(), start.elapsed().as_millis());
		result
	}

	fn run_mutating_stage(
		&self,
		stage: &'static str,
		report: &mut Report,
		ws: &mut WorkingSet,
		f: impl FnOnce(&mut WorkingSet, &Config, &mut crate::model::StageCounts),
	) -> Result<(), StageError> {
		self.check_cancelled(stage)?;
		let start = Instant::now();
		let counts = report.counts_for(stage);
		let mut local_counts = std::mem::take(counts);
		f(ws, &self.config, &mut local_counts);
		*report.counts_for(stage) = local_counts;
		report
			.stage_durations_ms
			.insert(stage.to_string(), start.elapsed().as_millis());
		Ok(())
	}
}
