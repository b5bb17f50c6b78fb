//! # Edgeflow Core Stage Manager
//!
//! Stage contracts and everything needed to turn a [`StageConfiguration`]
//! into a configured stage:
//!
//! - [`Stage`]: lifecycle shared by every stage, with capability queries for
//!   [`Origin`], [`Processor`] and [`Destination`].
//! - [`StageRegistry`]: `(library, stage name)` to constructor and schema.
//! - [`ConfigInjector`]: coerces configuration entries into a typed tree.
//! - [`new_stage_bean`]: construction plus injection in one call.
//! - [`BatchMaker`]: per-cycle record accumulator.
//!
//! [`StageConfiguration`]: crate::config::StageConfiguration
pub mod batch;
pub mod bean;
pub mod context;
pub mod core_stages;
pub mod error;
pub mod injector;
pub mod registry;
pub mod schema;

use std::any::Any;
use std::fmt;

use async_trait::async_trait;

use crate::kernel::error::Result;

/// Role a stage plays in a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageType {
    Origin,
    Processor,
    Destination,
}

impl fmt::Display for StageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageType::Origin => write!(f, "origin"),
            StageType::Processor => write!(f, "processor"),
            StageType::Destination => write!(f, "destination"),
        }
    }
}

/// Lifecycle every stage implements
#[async_trait]
pub trait Stage: Send + Sync {
    /// Prepare the stage for a run. Called once, after configuration injection.
    async fn init(&mut self, context: &StageContext) -> Result<()>;

    /// Release held resources. Must be idempotent and must work after a
    /// partially failed `init`.
    async fn destroy(&mut self) -> Result<()>;

    /// Origin capability, if implemented
    fn as_origin(&mut self) -> Option<&mut dyn Origin> {
        None
    }

    /// Processor capability, if implemented
    fn as_processor(&mut self) -> Option<&mut dyn Processor> {
        None
    }

    /// Destination capability, if implemented
    fn as_destination(&mut self) -> Option<&mut dyn Destination> {
        None
    }

    /// Cast to Any for downcasting
    fn as_any(&self) -> &dyn Any;

    /// Cast to mutable Any for downcasting
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Reads from a source and produces records plus a resumption offset
#[async_trait]
pub trait Origin: Send + Sync {
    /// Append at most `max_batch_size` records read after `last_source_offset`
    /// and return the offset that resumes right after the last appended record.
    ///
    /// With no new data, returns `last_source_offset` unchanged and appends
    /// nothing. Waiting for data must be bounded.
    async fn produce(
        &mut self,
        last_source_offset: &str,
        max_batch_size: usize,
        batch_maker: &mut BatchMaker,
    ) -> Result<String>;
}

/// Transforms a batch into a new batch
#[async_trait]
pub trait Processor: Send + Sync {
    /// Write output records to `batch_maker`. Per-record failures go to
    /// [`BatchMaker::to_error`]; an `Err` means the stage itself failed.
    async fn process(&mut self, batch: &Batch, batch_maker: &mut BatchMaker) -> Result<()>;
}

/// Writes a batch to an external sink
#[async_trait]
pub trait Destination: Send + Sync {
    async fn write(&mut self, batch: &Batch) -> Result<()>;
}

// Re-export important types
pub use batch::{Batch, BatchMaker, ErrorRecord, Record, RecordHeader};
pub use bean::{StageBean, StageSystemConfigs, new_stage_bean};
pub use context::StageContext;
pub use injector::ConfigInjector;
pub use registry::{StageDefinition, StageDescriptor, StageRegistry, global_registry, install_global_registry};
pub use schema::{ConfigDef, ConfigSchema, ConfigType};

// Test module declaration
#[cfg(test)]
mod tests;
