//! Row-streaming pipeline engine for Sluice.
//!
//! A [`Pipeline`] takes a [`PipelineMeta`] graph, connects its transforms
//! with bounded [`RowSet`] queues and runs one OS thread per transform. The
//! row sets are the only synchronization points between transforms.
//!
//! ```no_run
//! use sluice_config::Variables;
//! use sluice_pipeline::{Pipeline, PipelineMeta, RowGeneratorMeta, TransformConfig};
//!
//! let mut meta = PipelineMeta::new("demo");
//! meta.add_transform(
//!     "generate",
//!     TransformConfig::RowGenerator(RowGeneratorMeta::with_limit("${ROW_LIMIT}")),
//! )
//! .add_transform("count", TransformConfig::Dummy)
//! .add_hop("generate", "count");
//!
//! let mut vars = Variables::new();
//! vars.set("ROW_LIMIT", "1440");
//!
//! let pipeline = Pipeline::new(meta, vars);
//! pipeline.execute()?;
//! pipeline.wait_until_finished();
//! # Ok::<(), sluice_pipeline::PipelineError>(())
//! ```

pub mod definition;
pub mod engine;
pub mod error;
pub mod listener;
pub mod rowset;
pub mod status;
pub mod transform;
pub mod transforms;

pub use definition::{PipelineHop, PipelineMeta, TransformMeta};
pub use engine::{Pipeline, PipelineResult, StopHandle, TransformResult};
pub use error::{PipelineError, Result};
pub use listener::{OnRowRead, OnRowWritten, RowListener};
pub use rowset::{MetaRow, Poll, RowSet};
pub use status::Status;
pub use transform::{Flow, TransformHandle, TransformIo, TransformLogic};
pub use transforms::{
    Dummy, GeneratorField, Normaliser, NormaliserField, NormaliserMeta, RowGenerator,
    RowGeneratorMeta, TransformConfig, TransformPlugin, builtin_transforms,
};
