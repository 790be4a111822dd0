//! Built-in actions and the configuration enum that selects them.

mod pipeline;
mod special;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use sluice_config::Variables;
use sluice_types::Registry;

use crate::error::Result;
use crate::result::ExecutionResult;

pub use pipeline::RunPipelineMeta;

pub const START_ID: &str = "START";
pub const SUCCESS_ID: &str = "SUCCESS";
pub const ABORT_ID: &str = "ABORT";
pub const DUMMY_ID: &str = "DUMMY";
pub const PIPELINE_ID: &str = "PIPELINE";

/// What an action sees while it runs.
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    pub workflow: &'a str,
    pub action: &'a str,
    /// Result of the action that led here (success for the start action).
    pub previous: &'a ExecutionResult,
    pub variables: &'a Variables,
    /// Raised when the workflow is asked to stop.
    pub stop: &'a AtomicBool,
}

impl ActionContext<'_> {
    /// Long-running actions poll this and wind down when it turns true.
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// An action supplied from outside this crate.
///
/// `execute` runs on a blocking thread and may block for as long as it needs.
pub trait ActionPlugin: Send + Sync {
    fn id(&self) -> &str;

    fn is_start(&self) -> bool {
        false
    }

    /// Whether hops inserted after this action should be unconditional.
    fn is_unconditional(&self) -> bool {
        false
    }

    fn execute(&self, ctx: &ActionContext<'_>) -> Result<ExecutionResult>;
}

/// Static configuration of one action, one variant per kind.
#[derive(Clone)]
pub enum ActionConfig {
    Start,
    Success,
    /// Fails the branch with a message; variables are substituted.
    Abort { message: String },
    Dummy,
    RunPipeline(RunPipelineMeta),
    Plugin(Arc<dyn ActionPlugin>),
}

impl ActionConfig {
    pub fn plugin(plugin: impl ActionPlugin + 'static) -> Self {
        Self::Plugin(Arc::new(plugin))
    }

    pub fn abort(message: impl Into<String>) -> Self {
        Self::Abort {
            message: message.into(),
        }
    }

    pub fn plugin_id(&self) -> &str {
        match self {
            Self::Start => START_ID,
            Self::Success => SUCCESS_ID,
            Self::Abort { .. } => ABORT_ID,
            Self::Dummy => DUMMY_ID,
            Self::RunPipeline(_) => PIPELINE_ID,
            Self::Plugin(p) => p.id(),
        }
    }

    pub fn is_start(&self) -> bool {
        match self {
            Self::Start => true,
            Self::Plugin(p) => p.is_start(),
            _ => false,
        }
    }

    pub fn is_unconditional(&self) -> bool {
        match self {
            Self::Start => true,
            Self::Plugin(p) => p.is_unconditional(),
            _ => false,
        }
    }

    /// Run the action to completion on the current thread.
    pub fn execute(&self, ctx: &ActionContext<'_>) -> Result<ExecutionResult> {
        match self {
            Self::Start | Self::Success | Self::Dummy => Ok(special::succeed()),
            Self::Abort { message } => Ok(special::abort(message, ctx)),
            Self::RunPipeline(meta) => meta.execute(ctx),
            Self::Plugin(p) => p.execute(ctx),
        }
    }
}

impl fmt::Debug for ActionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("Start"),
            Self::Success => f.write_str("Success"),
            Self::Abort { message } => f.debug_struct("Abort").field("message", message).finish(),
            Self::Dummy => f.write_str("Dummy"),
            Self::RunPipeline(meta) => f.debug_tuple("RunPipeline").field(meta).finish(),
            Self::Plugin(p) => f.debug_tuple("Plugin").field(&p.id()).finish(),
        }
    }
}

/// Registry of the built-in action kinds, keyed by plugin id.
pub fn builtin_actions() -> Registry<ActionConfig> {
    let mut registry = Registry::new();
    registry.register(START_ID, "Start", || ActionConfig::Start);
    registry.register(SUCCESS_ID, "Success", || ActionConfig::Success);
    registry.register(ABORT_ID, "Abort", || ActionConfig::abort("Aborted"));
    registry.register(DUMMY_ID, "Dummy", || ActionConfig::Dummy);
    registry.register(PIPELINE_ID, "Pipeline", || {
        ActionConfig::RunPipeline(RunPipelineMeta::default())
    });
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_types::MetadataProvider;

    #[test]
    fn test_builtin_registry() {
        let registry = builtin_actions();
        assert_eq!(registry.ids(), vec![ABORT_ID, DUMMY_ID, PIPELINE_ID, START_ID, SUCCESS_ID]);

        let start = registry.lookup(START_ID).unwrap();
        assert!(start.is_start());
        assert!(start.is_unconditional());

        let dummy = registry.create(DUMMY_ID).unwrap();
        assert!(!dummy.is_start());
        assert_eq!(dummy.plugin_id(), DUMMY_ID);

        assert!(registry.lookup("MAIL").is_none());
    }
}
