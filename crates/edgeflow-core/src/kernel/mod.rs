//! # Edgeflow Core Kernel
//!
//! Process-level pieces of the runtime:
//!
//! - **Bootstrap**: [`Agent`](bootstrap::Agent) hosts pipelines on tokio
//!   tasks, each with its own file offset store, sharing one stage registry.
//! - **Constants**: names, defaults and on-disk layout in `constants`.
//! - **Error Handling**: the crate-wide [`Error`](error::Error) and `Result`
//!   alias in `error`.
pub mod bootstrap;
pub mod constants;
pub mod error;

pub use bootstrap::{Agent, PipelineHandle};
pub use error::{Error, Result};

// Test module declaration
#[cfg(test)]
mod tests;
