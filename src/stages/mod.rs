//! The nine pipeline stages, run strictly in order by [`crate::pipeline::Pipeline`].

pub mod preprocessor;
pub mod bridging;
pub mod noder;
pub mod welder;
pub mod gap_bridger;
pub mod connector;
pub mod dedup;
pub mod pruner;
pub mod compactor;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Monotonic cancellation flag shared across every stage sub-step. Once set,
/// it never clears; stages check it between internal sub-steps and return
/// `StageError::Cancelled` promptly rather than racing to finish.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn cancel(&self) {
		self.0.store(true, Ordering::SeqCst);
	}

	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::SeqCst)
	}
}
