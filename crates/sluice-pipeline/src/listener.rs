//! Row-level callbacks around a transform's row set I/O.

use sluice_types::{ExecutionError, Row, RowMeta};

/// Observes rows as a transform writes and reads them.
///
/// Callbacks run synchronously on the transform's thread. Returning an
/// error fails the transform. All hooks default to no-ops.
///
/// Write hooks bracket the hand-off to the output row sets. Read hooks fire
/// once the row has been dequeued: `before_row_read` before the transform's
/// read counter moves, `after_row_read` after.
pub trait RowListener: Send + Sync {
    fn before_row_write(&self, _meta: &RowMeta, _row: &Row) -> Result<(), ExecutionError> {
        Ok(())
    }

    fn after_row_write(&self, _meta: &RowMeta, _row: &Row) -> Result<(), ExecutionError> {
        Ok(())
    }

    fn before_row_read(&self, _meta: &RowMeta, _row: &Row) -> Result<(), ExecutionError> {
        Ok(())
    }

    fn after_row_read(&self, _meta: &RowMeta, _row: &Row) -> Result<(), ExecutionError> {
        Ok(())
    }
}

/// Adapter turning a closure into an `after_row_read` listener.
pub struct OnRowRead<F>(pub F);

impl<F> RowListener for OnRowRead<F>
where
    F: Fn(&RowMeta, &Row) -> Result<(), ExecutionError> + Send + Sync,
{
    fn after_row_read(&self, meta: &RowMeta, row: &Row) -> Result<(), ExecutionError> {
        (self.0)(meta, row)
    }
}

/// Adapter turning a closure into an `after_row_write` listener.
pub struct OnRowWritten<F>(pub F);

impl<F> RowListener for OnRowWritten<F>
where
    F: Fn(&RowMeta, &Row) -> Result<(), ExecutionError> + Send + Sync,
{
    fn after_row_write(&self, meta: &RowMeta, row: &Row) -> Result<(), ExecutionError> {
        (self.0)(meta, row)
    }
}
