//! Injection error types.

use thiserror::Error;

/// Result type alias for injection operations.
pub type Result<T> = std::result::Result<T, InjectionError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InjectionError {
    /// The key is not declared in the target's catalog.
    #[error("no such injectable field: {0}")]
    NoSuchField(String),

    /// The supplied value could not be coerced to the field's declared type.
    #[error("type mismatch for field '{field}': cannot use '{value}' as {expected}")]
    TypeMismatch {
        field: String,
        value: String,
        expected: String,
    },

    /// A key refers to a group the catalog does not declare.
    #[error("field '{field}' refers to undeclared group '{group}'")]
    UnknownGroup { field: String, group: String },

    /// A group index past the largest group the engine will grow to.
    #[error("index {index} for field '{field}' exceeds the group limit of {limit} entries")]
    IndexOutOfRange {
        field: String,
        index: usize,
        limit: usize,
    },

    /// A metadata row does not line up with its row meta.
    #[error("metadata row {row} has {actual} values but the row meta declares {expected}")]
    RowShape {
        row: usize,
        expected: usize,
        actual: usize,
    },
}
