//! Error types for the workflow engine.

use sluice_config::VariableError;
use sluice_pipeline::PipelineError;
use sluice_types::TypeError;
use thiserror::Error;

/// Result type for workflow operations.
pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Errors that can occur while editing or running a workflow.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Invalid graph wiring or an unresolvable setting.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A second start action was offered to a workflow that already has one.
    #[error("Workflow already has a start action: {0}")]
    DuplicateStart(String),

    #[error("Action not found: {0}")]
    ActionNotFound(String),

    #[error("Hop not found: {from} -> {to}")]
    HopNotFound { from: String, to: String },

    /// An action failed while executing.
    #[error("Action '{action}' failed: {message}")]
    Execution { action: String, message: String },

    /// The operation is not valid in the workflow's current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Type(#[from] TypeError),
}

impl WorkflowError {
    pub fn execution(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            action: action.into(),
            message: message.into(),
        }
    }

    /// True for the configuration class of errors.
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::Configuration(_) | Self::DuplicateStart(_) => true,
            Self::Pipeline(e) => e.is_configuration(),
            _ => false,
        }
    }
}

impl From<VariableError> for WorkflowError {
    fn from(err: VariableError) -> Self {
        Self::Configuration(err.to_string())
    }
}
