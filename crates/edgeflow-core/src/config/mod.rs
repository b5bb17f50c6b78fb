//! # Edgeflow Core Configuration Model
//!
//! Pure data describing pipelines and their stages, as read from pipeline
//! definition files:
//!
//! - [`ConfigValue`]: the dynamic value of a configuration entry.
//! - [`Config`] / [`StageConfiguration`]: the name/value list of one stage.
//! - [`PipelineConfiguration`]: stages plus pipeline-level settings.
//! - [`loader`]: JSON / YAML / TOML parsing selected by file extension.
pub mod value;
pub mod model;
pub mod loader;

pub use value::ConfigValue;
pub use model::{Config, StageConfiguration, PipelineConfiguration, ErrorRecordPolicy, RetryPolicy};
pub use loader::{ConfigFormat, load_pipeline_configuration, parse_pipeline_configuration};
