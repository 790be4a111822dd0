//! Action that runs a pipeline to completion.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use sluice_config::{EngineConfig, Variables};
use sluice_pipeline::{Pipeline, PipelineMeta, Status};
use tracing::info;

use super::ActionContext;
use crate::error::Result;
use crate::result::ExecutionResult;

/// How often a running pipeline checks for a workflow stop.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Configuration of the pipeline action.
#[derive(Debug, Clone, Default)]
pub struct RunPipelineMeta {
    pub pipeline: PipelineMeta,
    /// Variables set in the pipeline's own scope. Values may reference the
    /// workflow's variables and are resolved when the action runs.
    pub parameters: BTreeMap<String, String>,
    pub engine: EngineConfig,
}

impl RunPipelineMeta {
    pub fn new(pipeline: PipelineMeta) -> Self {
        Self {
            pipeline,
            ..Default::default()
        }
    }

    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Run the pipeline in a child of the workflow scope and wait for it.
    /// A workflow stop while waiting stops the pipeline abruptly.
    pub(super) fn execute(&self, ctx: &ActionContext<'_>) -> Result<ExecutionResult> {
        let mut scope = Variables::with_parent(Arc::new(ctx.variables.clone()));
        for (name, value) in &self.parameters {
            scope.set(name.as_str(), ctx.variables.resolve(value)?);
        }

        let pipeline = Pipeline::with_config(self.pipeline.clone(), scope, self.engine.clone());
        pipeline.execute()?;

        let done = AtomicBool::new(false);
        let handle = pipeline.stop_handle();
        thread::scope(|threads| {
            threads.spawn(|| {
                while !done.load(Ordering::SeqCst) {
                    if ctx.is_stopped() {
                        info!(workflow = %ctx.workflow, action = %ctx.action, "stopping pipeline");
                        handle.stop();
                        return;
                    }
                    thread::sleep(STOP_POLL_INTERVAL);
                }
            });
            pipeline.wait_until_finished();
            done.store(true, Ordering::SeqCst);
        });

        let outcome = pipeline.result();
        info!(
            workflow = %ctx.workflow,
            action = %ctx.action,
            pipeline = %outcome.name,
            status = %outcome.status,
            "pipeline action finished"
        );

        let mut result = if outcome.status == Status::Finished {
            ExecutionResult::success()
        } else {
            let message = outcome.error.clone().unwrap_or_else(|| {
                format!("pipeline '{}' ended {}", outcome.name, outcome.status)
            });
            ExecutionResult::failure(message)
        };
        result.lines_read = outcome.lines_read();
        result.lines_written = outcome.lines_written();
        result.errors = outcome
            .transforms
            .iter()
            .filter(|t| t.status == Status::Failed)
            .count() as u64;
        if !result.result && result.errors == 0 {
            result.errors = 1;
        }
        Ok(result)
    }
}
