//! Workflow executor.
//!
//! Starting at the start action, each completed action's outgoing hops are
//! evaluated and every eligible successor is spawned. The first successor
//! continues the current branch; each extra one opens a parallel branch.
//! Actions run on tokio's blocking pool, collected through a `JoinSet`.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use sluice_config::{BranchAggregation, Variables, WorkflowConfig};
use sluice_pipeline::Status;
use sluice_types::ExecutionFinishedListener;
use tokio::task::JoinSet;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::actions::ActionContext;
use crate::error::{Result, WorkflowError};
use crate::meta::WorkflowMeta;
use crate::result::{ActionExecution, ExecutionResult, WorkflowResult};
use crate::selection::select_successors;

type FinishedListener = Arc<dyn ExecutionFinishedListener<Workflow>>;

struct WorkflowInner {
    meta: Arc<WorkflowMeta>,
    config: WorkflowConfig,
    variables: RwLock<Variables>,
    status: Mutex<Status>,
    running: AtomicBool,
    stop: Arc<AtomicBool>,
    result: Mutex<Option<WorkflowResult>>,
    listeners: Mutex<Vec<FinishedListener>>,
}

/// Cloneable handle to a workflow and its runs.
#[derive(Clone)]
pub struct Workflow {
    inner: Arc<WorkflowInner>,
}

/// Output of one action task.
struct Step {
    action: String,
    branch: usize,
    /// The branch went through an error hop after a failure.
    diverted: bool,
    result: ExecutionResult,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
}

/// How a branch ended.
#[derive(Debug, Clone)]
struct BranchEnd {
    result: bool,
    diverted: bool,
    error: Option<String>,
}

impl Workflow {
    pub fn new(meta: WorkflowMeta, variables: Variables) -> Self {
        Self::with_config(meta, variables, WorkflowConfig::default())
    }

    pub fn with_config(meta: WorkflowMeta, variables: Variables, config: WorkflowConfig) -> Self {
        Self {
            inner: Arc::new(WorkflowInner {
                meta: Arc::new(meta),
                config,
                variables: RwLock::new(variables),
                status: Mutex::new(Status::Created),
                running: AtomicBool::new(false),
                stop: Arc::new(AtomicBool::new(false)),
                result: Mutex::new(None),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.meta.name
    }

    pub fn meta(&self) -> &WorkflowMeta {
        &self.inner.meta
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.inner.config
    }

    pub fn status(&self) -> Status {
        *self.inner.status.lock()
    }

    /// Snapshot of the workflow's variable scope.
    pub fn variables(&self) -> Variables {
        self.inner.variables.read().clone()
    }

    /// Takes effect from the next run.
    pub fn set_variable(&self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.variables.write().set(name, value);
    }

    pub fn add_execution_finished_listener(
        &self,
        listener: impl ExecutionFinishedListener<Workflow> + 'static,
    ) {
        self.inner.listeners.lock().push(Arc::new(listener));
    }

    /// Result of the last completed run.
    pub fn result(&self) -> Option<WorkflowResult> {
        self.inner.result.lock().clone()
    }

    /// Stop following hops. No new action starts and the run ends STOPPED.
    /// Running actions see the request through [`ActionContext::is_stopped`];
    /// a running pipeline action stops its pipeline. Idempotent.
    pub fn stop(&self) {
        if self.inner.running.load(Ordering::SeqCst) && !self.inner.stop.swap(true, Ordering::SeqCst) {
            info!(workflow = %self.name(), "workflow stop requested");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stop.load(Ordering::SeqCst)
    }

    /// Run the workflow to completion.
    ///
    /// Only graph and state problems are returned as errors; failing actions
    /// are reported in the [`WorkflowResult`].
    pub async fn execute(&self) -> Result<WorkflowResult> {
        let meta = self.inner.meta.clone();
        meta.validate()?;
        let start = meta.find_start().map(|a| a.name.clone()).ok_or_else(|| {
            WorkflowError::Configuration(format!("workflow '{}' has no start action", meta.name))
        })?;

        if self.inner.running.swap(true, Ordering::SeqCst) {
            return Err(WorkflowError::InvalidState(format!(
                "workflow '{}' is already running",
                meta.name
            )));
        }
        *self.inner.status.lock() = Status::Running;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let variables = Arc::new(self.variables());
        let single_hop_always = self.inner.config.single_hop_always;
        info!(workflow = %meta.name, run_id = %run_id, start = %start, "workflow started");

        let mut tasks: JoinSet<Step> = JoinSet::new();
        spawn_step(
            &mut tasks,
            &meta,
            &variables,
            &self.inner.stop,
            start,
            0,
            false,
            ExecutionResult::success(),
        );
        let mut next_branch = 1;

        let mut executions = Vec::new();
        let mut ends = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            let step = match joined {
                Ok(step) => step,
                Err(e) => {
                    error!(workflow = %meta.name, error = %e, "action task did not complete");
                    ends.push(BranchEnd {
                        result: false,
                        diverted: false,
                        error: Some(e.to_string()),
                    });
                    continue;
                }
            };
            debug!(
                workflow = %meta.name,
                action = %step.action,
                branch = step.branch,
                result = step.result.result,
                "action finished"
            );

            let successors: Vec<_> = select_successors(
                meta.outgoing_hops(&step.action),
                step.result.result,
                single_hop_always,
            )
            .into_iter()
            .cloned()
            .collect();

            executions.push(ActionExecution {
                action: step.action.clone(),
                branch: step.branch,
                result: step.result.clone(),
                started_at: step.started_at,
                finished_at: step.finished_at,
            });

            if successors.is_empty() {
                ends.push(BranchEnd {
                    result: step.result.result,
                    diverted: step.diverted,
                    error: step.result.error.clone(),
                });
                continue;
            }
            if self.is_stopped() {
                debug!(workflow = %meta.name, action = %step.action, "stopped; successors skipped");
                continue;
            }

            for (i, hop) in successors.into_iter().enumerate() {
                let branch = if i == 0 {
                    step.branch
                } else {
                    next_branch += 1;
                    next_branch - 1
                };
                let diverted = step.diverted || (hop.error_hop && !step.result.result);
                debug!(
                    workflow = %meta.name,
                    from = %hop.from,
                    to = %hop.to,
                    branch,
                    "following hop"
                );
                spawn_step(
                    &mut tasks,
                    &meta,
                    &variables,
                    &self.inner.stop,
                    hop.to,
                    branch,
                    diverted,
                    step.result.clone(),
                );
            }
        }

        let stopped = self.is_stopped();
        let result = !stopped && aggregate(self.inner.config.aggregation, &ends, &executions);
        let status = if stopped {
            Status::Stopped
        } else if result {
            Status::Finished
        } else {
            Status::Failed
        };
        let error = if result {
            None
        } else {
            ends.iter()
                .filter(|end| !end.result)
                .find_map(|end| end.error.clone())
                .or_else(|| executions.iter().find_map(|e| e.result.error.clone()))
        };

        let outcome = WorkflowResult {
            name: meta.name.clone(),
            run_id,
            result,
            status,
            executions,
            error,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            workflow = %meta.name,
            run_id = %run_id,
            status = %status,
            actions = outcome.executions.len(),
            "workflow finished"
        );

        *self.inner.result.lock() = Some(outcome.clone());
        *self.inner.status.lock() = status;
        self.fire_listeners();
        self.inner.stop.store(false, Ordering::SeqCst);
        self.inner.running.store(false, Ordering::SeqCst);
        Ok(outcome)
    }

    fn fire_listeners(&self) {
        let listeners = self.inner.listeners.lock().clone();
        for listener in listeners {
            if let Err(e) = listener.finished(self) {
                error!(workflow = %self.name(), error = %e, "execution finished listener failed");
            }
        }
    }
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("name", &self.name())
            .field("status", &self.status())
            .finish()
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_step(
    tasks: &mut JoinSet<Step>,
    meta: &Arc<WorkflowMeta>,
    variables: &Arc<Variables>,
    stop: &Arc<AtomicBool>,
    action: String,
    branch: usize,
    diverted: bool,
    previous: ExecutionResult,
) {
    let meta = meta.clone();
    let variables = variables.clone();
    let stop = stop.clone();
    tasks.spawn_blocking(move || {
        run_step(&meta, &variables, &stop, action, branch, diverted, &previous)
    });
}

/// Execute one action on the current (blocking) thread. Errors and panics
/// become a failed result.
fn run_step(
    meta: &WorkflowMeta,
    variables: &Variables,
    stop: &AtomicBool,
    action: String,
    branch: usize,
    diverted: bool,
    previous: &ExecutionResult,
) -> Step {
    let started_at = Utc::now();
    let result = match meta.find_action(&action) {
        None => ExecutionResult::failure(format!("action '{}' not found", action)),
        Some(node) => {
            let ctx = ActionContext {
                workflow: &meta.name,
                action: &action,
                previous,
                variables,
                stop,
            };
            match panic::catch_unwind(AssertUnwindSafe(|| node.config.execute(&ctx))) {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => {
                    error!(workflow = %meta.name, action = %action, error = %e, "action failed");
                    ExecutionResult::failure(e.to_string())
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(workflow = %meta.name, action = %action, error = %message, "action panicked");
                    ExecutionResult::failure(format!("panic: {}", message))
                }
            }
        }
    };

    Step {
        action,
        branch,
        diverted,
        result,
        started_at,
        finished_at: Utc::now(),
    }
}

/// Combine branch outcomes under the configured policy.
fn aggregate(policy: BranchAggregation, ends: &[BranchEnd], executions: &[ActionExecution]) -> bool {
    match policy {
        BranchAggregation::Strict => executions.iter().all(|e| e.result.result),
        BranchAggregation::AllBranches => ends.iter().all(|end| end.result),
        BranchAggregation::ExcludeErrorHandled => {
            let mut kept = ends.iter().filter(|end| !end.diverted).peekable();
            if kept.peek().is_none() {
                // Every branch was diverted: judge the handlers themselves.
                ends.iter().all(|end| end.result)
            } else {
                kept.all(|end| end.result)
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
