//! Workflow engine for Sluice.
//!
//! A workflow is a graph of actions joined by conditional hops. Execution
//! begins at the single start action; after each action the outgoing hops
//! are evaluated against its result and every eligible successor runs,
//! in parallel when more than one is eligible.
//!
//! ```no_run
//! use sluice_config::Variables;
//! use sluice_workflow::{ActionConfig, ActionMeta, Workflow, WorkflowHopMeta, WorkflowMeta};
//!
//! # async fn run() -> sluice_workflow::Result<()> {
//! let mut meta = WorkflowMeta::new("nightly");
//! meta.add_action(ActionMeta::new("Start", ActionConfig::Start))?;
//! meta.add_action(ActionMeta::new("Load", ActionConfig::Dummy))?;
//! meta.add_action(ActionMeta::new("Done", ActionConfig::Success))?;
//! meta.add_action(ActionMeta::new("Alert", ActionConfig::abort("load failed")))?;
//! meta.add_hop(WorkflowHopMeta::unconditional("Start", "Load"))?;
//! meta.add_hop(WorkflowHopMeta::new("Load", "Done"))?;
//! meta.add_hop(WorkflowHopMeta::on_failure("Load", "Alert"))?;
//!
//! let result = Workflow::new(meta, Variables::new()).execute().await?;
//! println!("{}: {}", result.name, result.status);
//! # Ok(())
//! # }
//! ```

pub mod actions;
pub mod engine;
pub mod error;
pub mod meta;
pub mod result;
pub mod selection;

pub use actions::{ActionConfig, ActionContext, ActionPlugin, RunPipelineMeta, builtin_actions};
pub use engine::Workflow;
pub use error::{Result, WorkflowError};
pub use meta::{ActionMeta, WorkflowHopMeta, WorkflowMeta};
pub use result::{ActionExecution, ExecutionResult, WorkflowResult};
pub use selection::select_successors;
