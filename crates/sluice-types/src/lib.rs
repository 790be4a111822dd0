//! Shared types for the Sluice data-integration engine.
//!
//! Everything that both the pipeline and the workflow engines (and the
//! metadata injection layer) need to agree on lives here:
//!
//! - [`Value`] / [`ValueType`]: typed cells and their type tags
//! - [`ValueMeta`] / [`RowMeta`] / [`Row`]: the schema and records that
//!   stream between transforms
//! - [`Registry`] / [`MetadataProvider`]: plugin id → constructor lookup
//! - [`ExecutionFinishedListener`]: the once-per-run completion callback

pub mod error;
pub mod listener;
pub mod registry;
pub mod row;
pub mod value;

pub use error::{ExecutionError, Result, TypeError};
pub use listener::ExecutionFinishedListener;
pub use registry::{MetadataProvider, PluginDescriptor, Registry};
pub use row::{Row, RowMeta, ValueMeta};
pub use value::{Value, ValueType};
