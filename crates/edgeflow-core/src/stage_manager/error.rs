//! # Edgeflow Core Stage Manager Errors
//!
//! Defines [`StageSystemError`], covering everything that can go wrong while
//! turning a stage configuration into a configured stage instance: registry
//! lookups, version checks, and configuration injection.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StageSystemError {
    #[error("Stage '{stage_name}' of library '{library}' is not registered")]
    UnknownStage { library: String, stage_name: String },

    #[error("Stage '{stage_name}' of library '{library}' is already registered")]
    StageAlreadyRegistered { library: String, stage_name: String },

    #[error("Invalid definition for stage '{stage_name}' of library '{library}': {reason}")]
    InvalidStageDefinition { library: String, stage_name: String, reason: String },

    #[error("Stage '{stage_name}' version '{requested}' requested but version '{registered}' is registered")]
    StageVersionMismatch { stage_name: String, requested: String, registered: String },

    #[error("Stage '{stage}': unknown configuration field '{field}'")]
    UnknownConfigField { stage: String, field: String },

    #[error("Stage '{stage}': configuration field '{field}' expects {expected} but got {found}")]
    TypeMismatch { stage: String, field: String, expected: String, found: String },

    #[error("Stage '{stage}': required configuration field '{field}' is missing")]
    MissingRequiredConfig { stage: String, field: String },

    #[error("Stage '{instance}' does not implement the {capability} capability")]
    MissingCapability { instance: String, capability: String },

    #[error("A global stage registry has already been installed")]
    RegistryAlreadyInstalled,

    #[error("Internal stage manager error: {0}")]
    InternalError(String),
}
