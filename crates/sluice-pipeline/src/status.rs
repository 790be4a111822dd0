//! Lifecycle states shared by transforms, pipelines and workflows.

use std::fmt;

use serde::{Deserialize, Serialize};

/// `Created → Initialized → Running → {Finished | Stopped | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Created,
    Initialized,
    Running,
    Finished,
    Stopped,
    Failed,
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Finished | Status::Stopped | Status::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Created => "CREATED",
            Status::Initialized => "INITIALIZED",
            Status::Running => "RUNNING",
            Status::Finished => "FINISHED",
            Status::Stopped => "STOPPED",
            Status::Failed => "FAILED",
        }
    }

    /// Combine terminal states: any failure wins, then any stop, else finished.
    pub fn aggregate(statuses: impl IntoIterator<Item = Status>) -> Status {
        let mut result = Status::Finished;
        for status in statuses {
            match status {
                Status::Failed => return Status::Failed,
                Status::Stopped => result = Status::Stopped,
                _ => {}
            }
        }
        result
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!Status::Created.is_terminal());
        assert!(!Status::Running.is_terminal());
        assert!(Status::Finished.is_terminal());
        assert!(Status::Stopped.is_terminal());
        assert!(Status::Failed.is_terminal());
    }

    #[test]
    fn test_aggregate() {
        use Status::*;
        assert_eq!(Status::aggregate([Finished, Finished]), Finished);
        assert_eq!(Status::aggregate([Finished, Stopped]), Stopped);
        assert_eq!(Status::aggregate([Stopped, Failed, Finished]), Failed);
        assert_eq!(Status::aggregate([]), Finished);
    }
}
