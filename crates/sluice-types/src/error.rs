//! Error types shared across the engine crates.

use thiserror::Error;

/// Result type alias for type-level operations.
pub type Result<T> = std::result::Result<T, TypeError>;

/// Errors raised while building schemas, converting values or looking up plugins.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TypeError {
    /// A row meta already holds a field with this name.
    #[error("duplicate field name '{0}' in row meta")]
    DuplicateField(String),

    /// A field name was not found in a row meta.
    #[error("field '{0}' not found in row meta")]
    UnknownField(String),

    /// A string could not be converted to the requested type.
    #[error("cannot convert '{value}' to {target}")]
    Conversion { value: String, target: String },

    /// No plugin is registered under this id.
    #[error("plugin not found: {0}")]
    PluginNotFound(String),
}

/// Failure reported by a unit of work or one of its callbacks while running.
///
/// Row listeners and execution-finished listeners return this; the engine
/// that invoked them decides whether it aborts the unit (row listeners) or
/// is only logged (finished listeners).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ExecutionError {
    pub message: String,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for ExecutionError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for ExecutionError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}
