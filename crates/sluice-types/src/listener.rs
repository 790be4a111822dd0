//! Completion callbacks for pipeline and workflow runs.

use crate::error::ExecutionError;

/// Called once per run after the engine's terminal status is known.
///
/// `T` is the engine handle (a pipeline or a workflow). Errors are caught
/// and logged by the engine; they never replace the run's own result.
pub trait ExecutionFinishedListener<T: ?Sized>: Send + Sync {
    fn finished(&self, engine: &T) -> Result<(), ExecutionError>;
}

impl<T, F> ExecutionFinishedListener<T> for F
where
    T: ?Sized,
    F: Fn(&T) -> Result<(), ExecutionError> + Send + Sync,
{
    fn finished(&self, engine: &T) -> Result<(), ExecutionError> {
        self(engine)
    }
}
