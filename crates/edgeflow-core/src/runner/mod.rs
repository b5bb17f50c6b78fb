//! # Edgeflow Core Pipeline Runner
//!
//! Executes a pipeline: builds and initializes its stages, then repeats
//! produce → process → deliver → commit cycles until stopped.
//!
//! - [`PipelineRunner`]: lifecycle state machine and control loop.
//! - [`OffsetStore`]: where committed source offsets live
//!   ([`MemoryOffsetStore`], [`FileOffsetStore`]).
//! - [`StopHandle`]: cooperative stop shared with stages.
pub mod error;
pub mod offset;
pub mod pipeline;
pub mod stop;

pub use error::{PipelineState, RunnerError};
pub use offset::{FileOffsetStore, MemoryOffsetStore, OffsetStore};
pub use pipeline::{CycleOutcome, PipelineRunner, RunSummary, RunnerMetrics, build_pipeline_beans};
pub use stop::StopHandle;

// Test module declaration
#[cfg(test)]
mod tests;
