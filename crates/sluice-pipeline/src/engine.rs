//! Pipeline engine: wires transforms to row sets and runs one thread per transform.
//!
//! Lifecycle of a run:
//! 1. [`Pipeline::prepare_execution`] validates the graph, allocates row sets
//!    and initializes every transform. Nothing runs yet; a failure here leaves
//!    no threads behind.
//! 2. [`Pipeline::start_threads`] spawns one thread per transform.
//! 3. [`Pipeline::wait_until_finished`] blocks until every thread is done.
//!
//! The last transform to finish computes the terminal status and invokes the
//! finished listeners, exactly once per run. A pipeline in a terminal state
//! can be prepared again.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex, RwLock};
use serde::Serialize;
use sluice_config::{EngineConfig, Variables};
use sluice_types::ExecutionFinishedListener;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::definition::PipelineMeta;
use crate::error::{PipelineError, Result};
use crate::rowset::RowSet;
use crate::status::Status;
use crate::transform::{
    RunControl, TransformHandle, TransformIo, TransformLogic, TransformState, run_transform,
};

type FinishedListener = Arc<dyn ExecutionFinishedListener<Pipeline>>;

/// Outcome of one transform in a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformResult {
    pub name: String,
    pub status: Status,
    pub lines_read: u64,
    pub lines_written: u64,
    pub error: Option<String>,
}

/// Snapshot of a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub name: String,
    pub run_id: Option<Uuid>,
    pub status: Status,
    /// First transform failure, if any.
    pub error: Option<String>,
    pub transforms: Vec<TransformResult>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineResult {
    pub fn transform(&self, name: &str) -> Option<&TransformResult> {
        self.transforms.iter().find(|t| t.name == name)
    }

    pub fn lines_read(&self) -> u64 {
        self.transforms.iter().map(|t| t.lines_read).sum()
    }

    pub fn lines_written(&self) -> u64 {
        self.transforms.iter().map(|t| t.lines_written).sum()
    }
}

struct RunState {
    id: Uuid,
    control: Arc<RunControl>,
    transforms: Vec<Arc<TransformState>>,
    rowsets: Vec<Arc<RowSet>>,
    pending: Vec<(Box<dyn TransformLogic>, TransformIo)>,
    threads: Vec<JoinHandle<()>>,
    remaining: usize,
    started: bool,
    finished: bool,
    listeners_fired: bool,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

struct PipelineInner {
    meta: PipelineMeta,
    config: EngineConfig,
    variables: RwLock<Variables>,
    status: Mutex<Status>,
    run: Mutex<Option<RunState>>,
    finished: Condvar,
    listeners: Mutex<Vec<FinishedListener>>,
}

/// Cloneable handle to a pipeline and its current run.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<PipelineInner>,
}

/// Stops a pipeline without keeping it alive.
///
/// Safe to capture in a row listener registered on the same pipeline.
#[derive(Clone)]
pub struct StopHandle {
    inner: Weak<PipelineInner>,
}

impl StopHandle {
    pub fn stop(&self) {
        if let Some(inner) = self.inner.upgrade() {
            Pipeline { inner }.stop();
        }
    }

    pub fn safe_stop(&self) {
        if let Some(inner) = self.inner.upgrade() {
            Pipeline { inner }.safe_stop();
        }
    }
}

impl Pipeline {
    pub fn new(meta: PipelineMeta, variables: Variables) -> Self {
        Self::with_config(meta, variables, EngineConfig::default())
    }

    pub fn with_config(meta: PipelineMeta, variables: Variables, config: EngineConfig) -> Self {
        Self {
            inner: Arc::new(PipelineInner {
                meta,
                config,
                variables: RwLock::new(variables),
                status: Mutex::new(Status::Created),
                run: Mutex::new(None),
                finished: Condvar::new(),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.meta.name
    }

    pub fn meta(&self) -> &PipelineMeta {
        &self.inner.meta
    }

    pub fn status(&self) -> Status {
        *self.inner.status.lock()
    }

    /// A copy of the pipeline's variable scope.
    pub fn variables(&self) -> Variables {
        self.inner.variables.read().clone()
    }

    /// Set a variable for subsequent runs. Takes effect at the next prepare.
    pub fn set_variable(&self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.variables.write().set(name, value);
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn add_execution_finished_listener(
        &self,
        listener: impl ExecutionFinishedListener<Pipeline> + 'static,
    ) {
        self.inner.listeners.lock().push(Arc::new(listener));
    }

    /// Prepare and start in one call.
    pub fn execute(&self) -> Result<()> {
        self.prepare_execution()?;
        self.start_threads()
    }

    /// Validate the graph, allocate row sets and initialize every transform.
    pub fn prepare_execution(&self) -> Result<()> {
        let mut guard = self.inner.run.lock();
        if let Some(run) = guard.as_ref()
            && !run.finished
        {
            return Err(PipelineError::InvalidState(format!(
                "pipeline '{}' is already {}",
                self.name(),
                self.status()
            )));
        }

        let meta = &self.inner.meta;
        meta.validate()?;
        let order = meta.topological_order()?;

        let index: HashMap<&str, usize> = meta
            .transforms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.as_str(), i))
            .collect();
        let n = meta.transforms.len();

        let mut inputs: Vec<Vec<Arc<RowSet>>> = vec![Vec::new(); n];
        let mut outputs: Vec<Vec<Arc<RowSet>>> = vec![Vec::new(); n];
        let mut rowsets = Vec::new();
        for hop in meta.enabled_hops() {
            let (Some(&from), Some(&to)) = (index.get(hop.from.as_str()), index.get(hop.to.as_str()))
            else {
                continue;
            };
            let rowset = Arc::new(RowSet::new(
                &hop.from,
                &hop.to,
                self.inner.config.rowset_size,
            )?);
            outputs[from].push(rowset.clone());
            inputs[to].push(rowset.clone());
            rowsets.push(rowset);
        }

        let variables = self.variables();
        let states: Vec<Arc<TransformState>> = meta
            .transforms
            .iter()
            .map(|t| Arc::new(TransformState::new(&t.name)))
            .collect();
        let mut logics: Vec<Option<Box<dyn TransformLogic>>> = (0..n).map(|_| None).collect();

        for &i in &order {
            let transform = &meta.transforms[i];
            let logic = transform.config.init(&variables).map_err(|e| {
                let message = match e {
                    PipelineError::Configuration(message) => message,
                    other => other.to_string(),
                };
                PipelineError::Configuration(format!(
                    "transform '{}' failed to initialize: {}",
                    transform.name, message
                ))
            })?;
            debug!(pipeline = %meta.name, transform = %transform.name, "transform initialized");
            states[i].set_status(Status::Initialized);
            logics[i] = Some(logic);
        }

        let poll = Duration::from_millis(self.inner.config.input_poll_ms);
        let pending = logics
            .into_iter()
            .zip(inputs.into_iter().zip(outputs))
            .zip(&states)
            .filter_map(|((logic, (ins, outs)), state)| {
                logic.map(|logic| (logic, TransformIo::new(state.clone(), ins, outs, poll)))
            })
            .collect();

        *guard = Some(RunState {
            id: Uuid::new_v4(),
            control: Arc::new(RunControl::default()),
            transforms: states,
            rowsets,
            pending,
            threads: Vec::new(),
            remaining: 0,
            started: false,
            finished: false,
            listeners_fired: false,
            started_at: None,
            finished_at: None,
        });
        *self.inner.status.lock() = Status::Initialized;

        info!(pipeline = %meta.name, transforms = n, "pipeline prepared");
        Ok(())
    }

    /// Launch one thread per transform.
    pub fn start_threads(&self) -> Result<()> {
        let (pending, control) = {
            let mut guard = self.inner.run.lock();
            let Some(run) = guard.as_mut() else {
                return Err(PipelineError::InvalidState(format!(
                    "pipeline '{}' has not been prepared",
                    self.name()
                )));
            };
            if run.started {
                return Err(PipelineError::InvalidState(format!(
                    "pipeline '{}' has already been started",
                    self.name()
                )));
            }
            run.started = true;
            run.started_at = Some(Utc::now());
            run.remaining = run.pending.len();
            *self.inner.status.lock() = Status::Running;
            (std::mem::take(&mut run.pending), run.control.clone())
        };

        info!(pipeline = %self.name(), threads = pending.len(), "pipeline started");
        if pending.is_empty() {
            self.complete_run();
            return Ok(());
        }

        let mut handles = Vec::with_capacity(pending.len());
        let mut spawn_error = None;
        for (logic, io) in pending {
            let transform = io.name().to_string();
            if spawn_error.is_some() {
                // A previous spawn failed and the run is being torn down.
                drop((logic, io));
                if let Some(handle) = self.transform(&transform) {
                    handle.state().set_status(Status::Stopped);
                }
                self.transform_ended();
                continue;
            }

            let pipeline = self.clone();
            let thread_control = control.clone();
            let spawned = thread::Builder::new()
                .name(format!("{}/{}", self.name(), transform))
                .spawn(move || {
                    run_transform(logic, io, &thread_control);
                    pipeline.transform_ended();
                });

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(source) => {
                    error!(
                        pipeline = %self.name(),
                        transform = %transform,
                        error = %source,
                        "failed to spawn transform thread"
                    );
                    self.mark_failed(&transform, format!("thread spawn failed: {}", source));
                    self.stop();
                    self.transform_ended();
                    spawn_error = Some(PipelineError::Spawn { transform, source });
                }
            }
        }

        if let Some(run) = self.inner.run.lock().as_mut() {
            run.threads.extend(handles);
        }
        match spawn_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Block until every transform thread has reached a terminal state and
    /// the finished listeners have run. Returns immediately when not started.
    pub fn wait_until_finished(&self) {
        let threads = {
            let mut guard = self.inner.run.lock();
            loop {
                let settled = match guard.as_ref() {
                    None => return,
                    Some(run) => !run.started || run.finished,
                };
                if settled {
                    break;
                }
                self.inner.finished.wait(&mut guard);
            }
            guard
                .as_mut()
                .map(|run| std::mem::take(&mut run.threads))
                .unwrap_or_default()
        };

        let current = thread::current().id();
        for handle in threads {
            if handle.thread().id() != current {
                let _ = handle.join();
            }
        }
    }

    /// Abrupt stop: every transform halts at its next iteration and buffered
    /// rows are discarded. Idempotent; callable from any thread.
    pub fn stop(&self) {
        let (rowsets, abandoned) = {
            let mut guard = self.inner.run.lock();
            let Some(run) = guard.as_mut() else {
                return;
            };
            run.control.request_stop();
            (run.rowsets.clone(), Self::abandon_unstarted(run))
        };

        let discarded: usize = rowsets.iter().map(|rs| rs.discard_and_close()).sum();
        info!(pipeline = %self.name(), discarded, "pipeline stop requested");
        if abandoned {
            self.complete_run();
        }
    }

    /// Safe stop: producers stop producing, consumers drain what is already
    /// buffered. Idempotent; callable from any thread.
    pub fn safe_stop(&self) {
        let abandoned = {
            let mut guard = self.inner.run.lock();
            let Some(run) = guard.as_mut() else {
                return;
            };
            run.control.request_safe_stop();
            Self::abandon_unstarted(run)
        };

        info!(pipeline = %self.name(), "pipeline safe stop requested");
        if abandoned {
            self.complete_run();
        }
    }

    /// A prepared run that never started ends STOPPED without threads.
    fn abandon_unstarted(run: &mut RunState) -> bool {
        if run.started {
            return false;
        }
        run.started = true;
        run.pending.clear();
        run.remaining = 0;
        for state in &run.transforms {
            state.set_status(Status::Stopped);
        }
        true
    }

    /// Handle to a transform of the current run.
    pub fn transform(&self, name: &str) -> Option<TransformHandle> {
        let guard = self.inner.run.lock();
        guard
            .as_ref()?
            .transforms
            .iter()
            .find(|t| t.name() == name)
            .map(|t| TransformHandle::new(t.clone()))
    }

    /// Snapshot of the current (or last) run.
    pub fn result(&self) -> PipelineResult {
        let guard = self.inner.run.lock();
        let status = self.status();
        let Some(run) = guard.as_ref() else {
            return PipelineResult {
                name: self.name().to_string(),
                run_id: None,
                status,
                error: None,
                transforms: Vec::new(),
                started_at: None,
                finished_at: None,
            };
        };

        let transforms: Vec<TransformResult> = run
            .transforms
            .iter()
            .map(|state| {
                let handle = TransformHandle::new(state.clone());
                TransformResult {
                    name: handle.name().to_string(),
                    status: handle.status(),
                    lines_read: handle.lines_read(),
                    lines_written: handle.lines_written(),
                    error: handle.error(),
                }
            })
            .collect();
        let error = transforms
            .iter()
            .find_map(|t| t.error.as_ref().map(|e| format!("transform '{}': {}", t.name, e)));

        PipelineResult {
            name: self.name().to_string(),
            run_id: Some(run.id),
            status,
            error,
            transforms,
            started_at: run.started_at,
            finished_at: run.finished_at,
        }
    }

    fn mark_failed(&self, transform: &str, message: String) {
        if let Some(handle) = self.transform(transform) {
            handle.state().set_error(message);
            handle.state().set_status(Status::Failed);
        }
    }

    fn transform_ended(&self) {
        let complete = {
            let mut guard = self.inner.run.lock();
            match guard.as_mut() {
                Some(run) if run.remaining > 0 => {
                    run.remaining -= 1;
                    run.remaining == 0
                }
                _ => false,
            }
        };
        if complete {
            self.complete_run();
        }
    }

    fn complete_run(&self) {
        let (status, fire) = {
            let mut guard = self.inner.run.lock();
            let Some(run) = guard.as_mut() else {
                return;
            };
            let status = Status::aggregate(run.transforms.iter().map(|t| t.status()));
            run.finished_at = Some(Utc::now());
            let fire = !run.listeners_fired;
            run.listeners_fired = true;
            *self.inner.status.lock() = status;
            (status, fire)
        };

        info!(pipeline = %self.name(), status = %status, "pipeline finished");
        if fire {
            self.fire_listeners();
        }

        if let Some(run) = self.inner.run.lock().as_mut() {
            run.finished = true;
        }
        self.inner.finished.notify_all();
    }

    fn fire_listeners(&self) {
        let listeners = self.inner.listeners.lock().clone();
        for listener in listeners {
            if let Err(e) = listener.finished(self) {
                error!(pipeline = %self.name(), error = %e, "execution finished listener failed");
            }
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name())
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::{RowGeneratorMeta, TransformConfig};

    fn generator_to_dummy(limit: &str) -> PipelineMeta {
        let mut meta = PipelineMeta::new("gen-dummy");
        meta.add_transform(
            "generate",
            TransformConfig::RowGenerator(RowGeneratorMeta::with_limit(limit)),
        )
        .add_transform("count", TransformConfig::Dummy)
        .add_hop("generate", "count");
        meta
    }

    #[test]
    fn test_status_lifecycle() {
        let pipeline = Pipeline::new(generator_to_dummy("2"), Variables::new());
        assert_eq!(pipeline.status(), Status::Created);
        pipeline.prepare_execution().unwrap();
        assert_eq!(pipeline.status(), Status::Initialized);
        assert_eq!(
            pipeline.transform("count").unwrap().status(),
            Status::Initialized
        );
        pipeline.start_threads().unwrap();
        pipeline.wait_until_finished();
        assert_eq!(pipeline.status(), Status::Finished);
    }

    #[test]
    fn test_start_without_prepare() {
        let pipeline = Pipeline::new(generator_to_dummy("2"), Variables::new());
        assert!(matches!(
            pipeline.start_threads(),
            Err(PipelineError::InvalidState(_))
        ));
        // Nothing to wait for.
        pipeline.wait_until_finished();
    }

    #[test]
    fn test_double_prepare_rejected() {
        let pipeline = Pipeline::new(generator_to_dummy("2"), Variables::new());
        pipeline.prepare_execution().unwrap();
        assert!(matches!(
            pipeline.prepare_execution(),
            Err(PipelineError::InvalidState(_))
        ));
    }

    #[test]
    fn test_stop_before_start() {
        let pipeline = Pipeline::new(generator_to_dummy("2"), Variables::new());
        pipeline.prepare_execution().unwrap();
        pipeline.stop();
        pipeline.wait_until_finished();
        assert_eq!(pipeline.status(), Status::Stopped);
        assert!(pipeline.start_threads().is_err());
    }

    #[test]
    fn test_empty_pipeline_finishes() {
        let pipeline = Pipeline::new(PipelineMeta::new("empty"), Variables::new());
        pipeline.execute().unwrap();
        pipeline.wait_until_finished();
        assert_eq!(pipeline.status(), Status::Finished);
    }

    #[test]
    fn test_result_before_any_run() {
        let pipeline = Pipeline::new(generator_to_dummy("2"), Variables::new());
        let result = pipeline.result();
        assert_eq!(result.status, Status::Created);
        assert!(result.run_id.is_none());
        assert!(pipeline.transform("count").is_none());
    }

    #[test]
    fn test_stop_handle_does_not_keep_pipeline_alive() {
        let pipeline = Pipeline::new(generator_to_dummy("2"), Variables::new());
        let handle = pipeline.stop_handle();
        drop(pipeline);
        handle.stop();
        handle.safe_stop();
    }
}
