//! Transform runtime: the per-thread run loop, row I/O and counters.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use sluice_types::{Row, RowMeta};
use tracing::{debug, error};

use crate::error::{PipelineError, Result};
use crate::listener::RowListener;
use crate::rowset::{MetaRow, Poll, RowSet};
use crate::status::Status;

/// What the run loop should do after one `process_row` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// No more work: inputs exhausted or the limit reached.
    Finished,
}

/// The executable part of a transform, created by `init` and owned by its thread.
pub trait TransformLogic: Send {
    /// Produce or consume one row (or one batch).
    fn process_row(&mut self, io: &mut TransformIo) -> Result<Flow>;

    /// Release resources. Called once after the loop exits, whatever the outcome.
    fn dispose(&mut self) {}
}

/// Stop flags shared by every transform of one pipeline run.
#[derive(Debug, Default)]
pub(crate) struct RunControl {
    stop: AtomicBool,
    safe_stop: AtomicBool,
}

impl RunControl {
    pub(crate) fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub(crate) fn request_safe_stop(&self) {
        self.safe_stop.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub(crate) fn is_safe_stopped(&self) -> bool {
        self.safe_stop.load(Ordering::SeqCst)
    }

    fn any_stop(&self) -> bool {
        self.is_stopped() || self.is_safe_stopped()
    }
}

/// Runtime state of one transform, readable from any thread.
pub(crate) struct TransformState {
    name: String,
    status: Mutex<Status>,
    lines_read: AtomicU64,
    lines_written: AtomicU64,
    error: Mutex<Option<String>>,
    listeners: RwLock<Vec<Arc<dyn RowListener>>>,
}

impl TransformState {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: Mutex::new(Status::Created),
            lines_read: AtomicU64::new(0),
            lines_written: AtomicU64::new(0),
            error: Mutex::new(None),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn status(&self) -> Status {
        *self.status.lock()
    }

    pub(crate) fn set_status(&self, status: Status) {
        *self.status.lock() = status;
    }

    pub(crate) fn error(&self) -> Option<String> {
        self.error.lock().clone()
    }

    pub(crate) fn set_error(&self, message: String) {
        *self.error.lock() = Some(message);
    }

    fn listeners(&self) -> Option<Vec<Arc<dyn RowListener>>> {
        let listeners = self.listeners.read();
        if listeners.is_empty() {
            None
        } else {
            Some(listeners.clone())
        }
    }
}

/// Public view of a running (or finished) transform.
#[derive(Clone)]
pub struct TransformHandle {
    state: Arc<TransformState>,
}

impl TransformHandle {
    pub(crate) fn new(state: Arc<TransformState>) -> Self {
        Self { state }
    }

    pub(crate) fn state(&self) -> &Arc<TransformState> {
        &self.state
    }

    pub fn name(&self) -> &str {
        self.state.name()
    }

    pub fn status(&self) -> Status {
        self.state.status()
    }

    pub fn lines_read(&self) -> u64 {
        self.state.lines_read.load(Ordering::SeqCst)
    }

    pub fn lines_written(&self) -> u64 {
        self.state.lines_written.load(Ordering::SeqCst)
    }

    /// Failure detail when the transform ended FAILED.
    pub fn error(&self) -> Option<String> {
        self.state.error()
    }

    /// Observe this transform's row I/O.
    pub fn add_row_listener(&self, listener: impl RowListener + 'static) {
        self.state.listeners.write().push(Arc::new(listener));
    }
}

impl std::fmt::Debug for TransformHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformHandle")
            .field("name", &self.name())
            .field("status", &self.status())
            .field("lines_read", &self.lines_read())
            .field("lines_written", &self.lines_written())
            .finish()
    }
}

/// A transform's view of its input and output row sets.
pub struct TransformIo {
    state: Arc<TransformState>,
    inputs: Vec<Arc<RowSet>>,
    outputs: Vec<Arc<RowSet>>,
    /// Inputs not yet exhausted (indices into `inputs`).
    active: Vec<usize>,
    next_input: usize,
    poll: Duration,
}

impl TransformIo {
    pub(crate) fn new(
        state: Arc<TransformState>,
        inputs: Vec<Arc<RowSet>>,
        outputs: Vec<Arc<RowSet>>,
        poll: Duration,
    ) -> Self {
        let active = (0..inputs.len()).collect();
        Self {
            state,
            inputs,
            outputs,
            active,
            next_input: 0,
            poll,
        }
    }

    pub fn name(&self) -> &str {
        self.state.name()
    }

    pub fn has_inputs(&self) -> bool {
        !self.inputs.is_empty()
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    pub fn lines_read(&self) -> u64 {
        self.state.lines_read.load(Ordering::SeqCst)
    }

    pub fn lines_written(&self) -> u64 {
        self.state.lines_written.load(Ordering::SeqCst)
    }

    /// Read the next row from any input; `None` once every input is exhausted.
    ///
    /// With a single input this blocks on it. With several, inputs are polled
    /// round-robin, so rows from different inputs interleave in no fixed order.
    pub fn get_row(&mut self) -> Result<Option<MetaRow>> {
        let entry = match self.inputs.len() {
            0 => None,
            1 => {
                if self.active.is_empty() {
                    None
                } else {
                    let entry = self.inputs[0].get();
                    if entry.is_none() {
                        self.active.clear();
                    }
                    entry
                }
            }
            _ => self.poll_inputs(),
        };

        let Some((meta, row)) = entry else {
            return Ok(None);
        };

        let listeners = self.state.listeners();
        if let Some(listeners) = &listeners {
            for listener in listeners {
                listener.before_row_read(&meta, &row)?;
            }
        }
        self.state.lines_read.fetch_add(1, Ordering::SeqCst);
        if let Some(listeners) = &listeners {
            for listener in listeners {
                listener.after_row_read(&meta, &row)?;
            }
        }
        Ok(Some((meta, row)))
    }

    fn poll_inputs(&mut self) -> Option<MetaRow> {
        loop {
            if self.active.is_empty() {
                return None;
            }

            // One non-blocking sweep over every live input.
            let mut swept = 0;
            while swept < self.active.len() {
                let slot = self.next_input % self.active.len();
                match self.inputs[self.active[slot]].try_get() {
                    Poll::Row(entry) => {
                        self.next_input = slot + 1;
                        return Some(entry);
                    }
                    Poll::Done => {
                        self.active.remove(slot);
                    }
                    Poll::Empty => {
                        self.next_input = slot + 1;
                        swept += 1;
                    }
                }
            }

            if let Some(&index) = self.active.get(self.next_input % self.active.len().max(1)) {
                match self.inputs[index].get_timeout(self.poll) {
                    Poll::Row(entry) => {
                        self.next_input += 1;
                        return Some(entry);
                    }
                    Poll::Done | Poll::Empty => {}
                }
            }
        }
    }

    /// Write a row to every output. Counts as written when at least one
    /// output accepted it, or when the transform has no outputs at all.
    pub fn put_row(&mut self, meta: &Arc<RowMeta>, row: Row) -> Result<()> {
        if row.len() != meta.len() {
            return Err(PipelineError::execution(
                self.name(),
                format!(
                    "row has {} values but its row meta declares {} fields",
                    row.len(),
                    meta.len()
                ),
            ));
        }

        let listeners = self.state.listeners();
        if let Some(listeners) = &listeners {
            for listener in listeners {
                listener.before_row_write(meta, &row)?;
            }
        }

        if !self.outputs.is_empty() {
            let mut accepted = 0;
            for output in &self.outputs {
                if output.put(meta.clone(), row.clone()).is_ok() {
                    accepted += 1;
                }
            }
            if accepted == 0 {
                return Err(PipelineError::OutputClosed);
            }
        }
        self.state.lines_written.fetch_add(1, Ordering::SeqCst);

        if let Some(listeners) = &listeners {
            for listener in listeners {
                listener.after_row_write(meta, &row)?;
            }
        }
        Ok(())
    }

    /// Mark every connected row set done.
    fn close(&self) {
        for rowset in self.outputs.iter().chain(self.inputs.iter()) {
            rowset.set_done();
        }
    }
}

/// Drive one transform to a terminal state on the current thread.
pub(crate) fn run_transform(
    mut logic: Box<dyn TransformLogic>,
    mut io: TransformIo,
    control: &RunControl,
) -> Status {
    let state = io.state.clone();
    state.set_status(Status::Running);
    debug!(transform = %state.name(), "transform started");

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let status = run_loop(logic.as_mut(), &mut io, control);
        logic.dispose();
        status
    }));

    let status = match outcome {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => {
            error!(transform = %state.name(), error = %e, "transform failed");
            state.set_error(e.to_string());
            Status::Failed
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(transform = %state.name(), error = %message, "transform panicked");
            state.set_error(format!("panic: {}", message));
            Status::Failed
        }
    };

    io.close();
    state.set_status(status);
    debug!(
        transform = %state.name(),
        status = %status,
        lines_read = state.lines_read.load(Ordering::SeqCst),
        lines_written = state.lines_written.load(Ordering::SeqCst),
        "transform ended"
    );
    status
}

fn run_loop(
    logic: &mut dyn TransformLogic,
    io: &mut TransformIo,
    control: &RunControl,
) -> Result<Status> {
    loop {
        if control.is_stopped() {
            return Ok(Status::Stopped);
        }
        // Safe stop halts producers; everything downstream drains.
        if control.is_safe_stopped() && !io.has_inputs() {
            return Ok(Status::Stopped);
        }

        match logic.process_row(io) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Finished) | Err(PipelineError::OutputClosed) => {
                return Ok(if control.any_stop() {
                    Status::Stopped
                } else {
                    Status::Finished
                });
            }
            Err(e) if control.is_stopped() => {
                debug!(transform = %io.name(), error = %e, "error after abrupt stop ignored");
                return Ok(Status::Stopped);
            }
            Err(e) => return Err(e),
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
