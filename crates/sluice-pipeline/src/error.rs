//! Error types for the pipeline engine.

use sluice_config::VariableError;
use sluice_types::{ExecutionError, TypeError};
use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while preparing or running a pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Bad graph wiring, an undefined variable or an unusable setting.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A transform failed while processing rows.
    #[error("Transform '{transform}' failed: {message}")]
    Execution { transform: String, message: String },

    /// A row listener rejected a row.
    #[error("Row listener failed: {0}")]
    Listener(#[from] ExecutionError),

    /// The row set was marked done; no further rows are accepted.
    #[error("Row set {0} is closed")]
    RowSetClosed(String),

    /// Every output of the transform has been closed by its consumer.
    #[error("All outputs are closed")]
    OutputClosed,

    /// The operation is not valid in the pipeline's current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Failed to start a transform thread.
    #[error("Failed to spawn thread for transform '{transform}': {source}")]
    Spawn {
        transform: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Type(#[from] TypeError),
}

impl PipelineError {
    pub fn execution(transform: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            transform: transform.into(),
            message: message.into(),
        }
    }

    /// True for the configuration class of errors.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

impl From<VariableError> for PipelineError {
    fn from(err: VariableError) -> Self {
        Self::Configuration(err.to_string())
    }
}
