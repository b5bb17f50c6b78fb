pub mod config;
pub mod kernel;
pub mod runner;
pub mod stage_manager;
pub mod storage;

// Re-export key public types/traits for the binary and stage plugins
pub use config::{Config, ConfigValue, PipelineConfiguration, StageConfiguration};
pub use kernel::error::{Error, Result};
pub use kernel::{Agent, PipelineHandle};
pub use runner::{OffsetStore, PipelineRunner, PipelineState, StopHandle};
pub use stage_manager::{
    Batch, BatchMaker, Destination, Origin, Processor, Record, Stage, StageContext, StageDescriptor, StageRegistry,
    StageType,
};
