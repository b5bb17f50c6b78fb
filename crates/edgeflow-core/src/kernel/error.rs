//! # Edgeflow Core Kernel Errors
//!
//! Defines the top-level error type of `edgeflow-core`.
//!
//! [`Error`] aggregates the typed errors of each subsystem (stage management,
//! pipeline runner, storage) and adds the [`Error::Stage`] variant that stage
//! implementations use to report their own failures.
use std::error::Error as StdError;
use std::path::PathBuf;
use std::result::Result as StdResult;

use crate::runner::error::RunnerError;
use crate::stage_manager::error::StageSystemError;
use crate::storage::error::StorageSystemError;
use thiserror::Error as ThisError;

/// Top-level error type for the edgeflow runtime
#[derive(Debug, ThisError)]
pub enum Error {
    /// Stage registry, schema or injection error
    #[error("Stage system error: {0}")]
    StageSystem(#[from] StageSystemError),

    /// Pipeline lifecycle or control loop error
    #[error("Pipeline runner error: {0}")]
    Runner(#[from] RunnerError),

    /// Storage (offset files, pipeline definitions) error
    #[error("Storage system error: {0}")]
    StorageSystem(#[from] StorageSystemError),

    /// Failure reported by a stage implementation
    #[error("Stage '{instance}' failed: {message}")]
    Stage {
        instance: String,
        message: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    },

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

// Prefer Error::io with a path; this keeps `?` usable on bare io calls.
impl From<std::io::Error> for Error {
    fn from(io_err: std::io::Error) -> Self {
        Error::StorageSystem(StorageSystemError::Io {
            source: io_err,
            path: PathBuf::new(),
            operation: "unknown".to_string(),
        })
    }
}

impl Error {
    /// I/O error with operation and path context
    pub fn io(source: std::io::Error, operation: impl Into<String>, path: PathBuf) -> Self {
        Error::StorageSystem(StorageSystemError::io(source, operation, path))
    }

    /// Stage failure without an underlying cause
    pub fn stage(instance: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Stage {
            instance: instance.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Stage failure wrapping the underlying cause
    pub fn stage_with_source<E>(instance: impl Into<String>, message: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Error::Stage {
            instance: instance.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
