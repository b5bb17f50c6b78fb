//! # Edgeflow Core Pipeline Runner Errors
//!
//! [`RunnerError`] covers pipeline lifecycle failures: invalid pipeline
//! layout, stage initialization, production, delivery, error records and
//! offset persistence. [`RunnerError::Interrupted`] marks a retry cut short by
//! a stop request. Stage failures keep the original error as their source.
use std::fmt;

use thiserror::Error;

use crate::kernel::error::Error;

/// Lifecycle state of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Created,
    Initialized,
    Running,
    Stopped,
    Errored,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Created => "CREATED",
            PipelineState::Initialized => "INITIALIZED",
            PipelineState::Running => "RUNNING",
            PipelineState::Stopped => "STOPPED",
            PipelineState::Errored => "ERRORED",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Pipeline '{pipeline_id}' is invalid: {reason}")]
    InvalidTopology { pipeline_id: String, reason: String },

    #[error("Pipeline '{pipeline_id}' cannot {operation} in state {state}")]
    InvalidState {
        pipeline_id: String,
        operation: String,
        state: PipelineState,
    },

    #[error("Stage '{instance}' failed to initialize: {source}")]
    StageInit {
        instance: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Origin '{instance}' failed to produce a batch: {source}")]
    Production {
        instance: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Stage '{instance}' failed to deliver a batch: {source}")]
    Delivery {
        instance: String,
        #[source]
        source: Box<Error>,
    },

    /// A stop request cut a retry short; the batch was neither delivered nor committed
    #[error("Stage '{instance}' was interrupted by a stop request while retrying: {source}")]
    Interrupted {
        instance: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Pipeline '{pipeline_id}' stopped on {count} error record(s), first from '{stage}': {message}")]
    ErrorRecords {
        pipeline_id: String,
        count: usize,
        stage: String,
        message: String,
    },

    #[error("Offset persistence failed for pipeline '{pipeline_id}': {source}")]
    Offset {
        pipeline_id: String,
        #[source]
        source: Box<Error>,
    },
}
