//! Outcomes of action and workflow runs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sluice_pipeline::Status;
use uuid::Uuid;

/// Outcome of one action run, consumed by successor selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    /// Success flag that drives hop evaluation.
    pub result: bool,
    pub lines_read: u64,
    pub lines_written: u64,
    /// Number of errors the action observed.
    pub errors: u64,
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn success() -> Self {
        Self {
            result: true,
            lines_read: 0,
            lines_written: 0,
            errors: 0,
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            result: false,
            lines_read: 0,
            lines_written: 0,
            errors: 1,
            error: Some(message.into()),
        }
    }
}

impl Default for ExecutionResult {
    fn default() -> Self {
        Self::success()
    }
}

/// One executed action, in completion order.
#[derive(Debug, Clone, Serialize)]
pub struct ActionExecution {
    pub action: String,
    /// Branch the action ran on; the start action runs on branch 0.
    pub branch: usize,
    pub result: ExecutionResult,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Summary of a finished workflow run.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResult {
    pub name: String,
    pub run_id: Uuid,
    /// Aggregated branch outcome.
    pub result: bool,
    pub status: Status,
    pub executions: Vec<ActionExecution>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl WorkflowResult {
    /// Executions of the named action (an action reached by two branches runs twice).
    pub fn executions_of<'a>(&'a self, action: &'a str) -> impl Iterator<Item = &'a ActionExecution> {
        self.executions.iter().filter(move |e| e.action == action)
    }

    pub fn executed(&self, action: &str) -> bool {
        self.executions_of(action).next().is_some()
    }

    /// Action names in completion order.
    pub fn action_names(&self) -> Vec<&str> {
        self.executions.iter().map(|e| e.action.as_str()).collect()
    }
}
