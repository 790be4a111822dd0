//! Integration tests for the workflow executor.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

use parking_lot::Mutex;
use sluice_config::{BranchAggregation, Variables, WorkflowConfig};
use sluice_pipeline::{PipelineMeta, RowGeneratorMeta, Status, TransformConfig};
use sluice_types::ExecutionError;
use sluice_workflow::{
    ActionConfig, ActionContext, ActionMeta, ActionPlugin, ExecutionResult, RunPipelineMeta,
    Workflow, WorkflowError, WorkflowHopMeta, WorkflowMeta,
};

/// Action backed by a closure.
struct FnAction<F>(F);

impl<F> ActionPlugin for FnAction<F>
where
    F: Fn(&ActionContext<'_>) -> sluice_workflow::Result<ExecutionResult> + Send + Sync,
{
    fn id(&self) -> &str {
        "FN"
    }

    fn execute(&self, ctx: &ActionContext<'_>) -> sluice_workflow::Result<ExecutionResult> {
        (self.0)(ctx)
    }
}

fn action<F>(f: F) -> ActionConfig
where
    F: Fn(&ActionContext<'_>) -> sluice_workflow::Result<ExecutionResult> + Send + Sync + 'static,
{
    ActionConfig::plugin(FnAction(f))
}

/// Workflow with a start action plus the given actions.
fn workflow(actions: Vec<(&str, ActionConfig)>) -> WorkflowMeta {
    let mut meta = WorkflowMeta::new("wf");
    meta.add_action(ActionMeta::new("Start", ActionConfig::Start))
        .unwrap();
    for (name, config) in actions {
        meta.add_action(ActionMeta::new(name, config)).unwrap();
    }
    meta
}

fn hops(meta: &mut WorkflowMeta, hops: Vec<WorkflowHopMeta>) {
    for hop in hops {
        meta.add_hop(hop).unwrap();
    }
}

fn with_aggregation(aggregation: BranchAggregation) -> WorkflowConfig {
    WorkflowConfig {
        aggregation,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_linear_workflow() {
    let mut meta = workflow(vec![("A", ActionConfig::Dummy), ("B", ActionConfig::Success)]);
    hops(
        &mut meta,
        vec![
            WorkflowHopMeta::unconditional("Start", "A"),
            WorkflowHopMeta::new("A", "B"),
        ],
    );

    let wf = Workflow::new(meta, Variables::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();
    wf.add_execution_finished_listener(move |w: &Workflow| -> Result<(), ExecutionError> {
        assert_eq!(w.status(), Status::Finished);
        c.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let result = wf.execute().await.unwrap();
    assert!(result.result);
    assert_eq!(result.status, Status::Finished);
    assert_eq!(result.action_names(), vec!["Start", "A", "B"]);
    assert!(result.error.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(wf.result().unwrap().run_id, result.run_id);
}

#[tokio::test]
async fn test_failure_follows_only_error_hop() {
    let mut meta = workflow(vec![
        ("Load", ActionConfig::abort("no source")),
        ("Publish", ActionConfig::Success),
        ("Cleanup", ActionConfig::Dummy),
    ]);
    hops(
        &mut meta,
        vec![
            WorkflowHopMeta::unconditional("Start", "Load"),
            WorkflowHopMeta::new("Load", "Publish"),
            WorkflowHopMeta::on_failure("Load", "Cleanup"),
        ],
    );

    let result = Workflow::new(meta.clone(), Variables::new())
        .execute()
        .await
        .unwrap();
    assert_eq!(result.action_names(), vec!["Start", "Load", "Cleanup"]);
    assert!(!result.executed("Publish"));
    // The failure was handled by the error branch.
    assert!(result.result);
    assert_eq!(result.status, Status::Finished);

    let strict = Workflow::with_config(meta, Variables::new(), with_aggregation(BranchAggregation::Strict))
        .execute()
        .await
        .unwrap();
    assert!(!strict.result);
    assert_eq!(strict.status, Status::Failed);
    assert_eq!(strict.error.as_deref(), Some("no source"));
}

#[tokio::test]
async fn test_success_skips_error_hop() {
    let mut meta = workflow(vec![
        ("Load", ActionConfig::Dummy),
        ("Publish", ActionConfig::Success),
        ("Cleanup", ActionConfig::Dummy),
    ]);
    hops(
        &mut meta,
        vec![
            WorkflowHopMeta::unconditional("Start", "Load"),
            WorkflowHopMeta::new("Load", "Publish"),
            WorkflowHopMeta::on_failure("Load", "Cleanup"),
        ],
    );

    let result = Workflow::new(meta, Variables::new()).execute().await.unwrap();
    assert_eq!(result.action_names(), vec!["Start", "Load", "Publish"]);
}

#[tokio::test]
async fn test_unhandled_failure_fails_workflow() {
    let mut meta = workflow(vec![("Abort", ActionConfig::abort("table ${TABLE} missing"))]);
    hops(&mut meta, vec![WorkflowHopMeta::unconditional("Start", "Abort")]);

    let wf = Workflow::new(meta, Variables::new());
    wf.set_variable("TABLE", "orders");
    let result = wf.execute().await.unwrap();

    assert!(!result.result);
    assert_eq!(result.status, Status::Failed);
    assert_eq!(result.error.as_deref(), Some("table orders missing"));
    assert_eq!(wf.status(), Status::Failed);
}

#[tokio::test]
async fn test_single_hop_taken_regardless_of_flags() {
    let mut meta = workflow(vec![
        ("Check", ActionConfig::abort("not ready")),
        ("Next", ActionConfig::Success),
    ]);
    hops(
        &mut meta,
        vec![
            WorkflowHopMeta::unconditional("Start", "Check"),
            WorkflowHopMeta::new("Check", "Next"),
        ],
    );

    let linear = Workflow::new(meta.clone(), Variables::new())
        .execute()
        .await
        .unwrap();
    assert!(linear.executed("Next"));
    assert!(linear.result);

    let config = WorkflowConfig {
        single_hop_always: false,
        ..Default::default()
    };
    let evaluated = Workflow::with_config(meta, Variables::new(), config)
        .execute()
        .await
        .unwrap();
    assert!(!evaluated.executed("Next"));
    assert!(!evaluated.result);
}

#[tokio::test]
async fn test_fan_out_runs_branches_in_parallel() {
    let barrier = Arc::new(Barrier::new(2));
    let (left, right) = (barrier.clone(), barrier.clone());
    let mut meta = workflow(vec![
        (
            "Left",
            action(move |_| {
                left.wait();
                Ok(ExecutionResult::success())
            }),
        ),
        (
            "Right",
            action(move |_| {
                right.wait();
                Ok(ExecutionResult::success())
            }),
        ),
    ]);
    hops(
        &mut meta,
        vec![
            WorkflowHopMeta::unconditional("Start", "Left"),
            WorkflowHopMeta::unconditional("Start", "Right"),
        ],
    );

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        Workflow::new(meta, Variables::new()).execute(),
    )
    .await
    .expect("branches did not run concurrently")
    .unwrap();

    assert!(result.result);
    let left = result.executions_of("Left").next().unwrap();
    let right = result.executions_of("Right").next().unwrap();
    assert_ne!(left.branch, right.branch);
}

#[tokio::test]
async fn test_branch_aggregation_policies() {
    // Start fans out to Report (succeeds) and Load (fails, error hop to a
    // Notify action that fails as well).
    let mut meta = workflow(vec![
        ("Report", ActionConfig::Success),
        ("Load", ActionConfig::abort("load failed")),
        ("Notify", ActionConfig::abort("notified")),
    ]);
    hops(
        &mut meta,
        vec![
            WorkflowHopMeta::unconditional("Start", "Report"),
            WorkflowHopMeta::unconditional("Start", "Load"),
            WorkflowHopMeta::on_failure("Load", "Notify"),
        ],
    );

    let run = |aggregation| {
        let wf = Workflow::with_config(meta.clone(), Variables::new(), with_aggregation(aggregation));
        async move { wf.execute().await.unwrap() }
    };

    assert!(run(BranchAggregation::ExcludeErrorHandled).await.result);
    let all = run(BranchAggregation::AllBranches).await;
    assert!(!all.result);
    assert_eq!(all.error.as_deref(), Some("notified"));
    assert!(!run(BranchAggregation::Strict).await.result);
}

#[tokio::test]
async fn test_unhandled_branch_failure_fails_fan_out() {
    let mut meta = workflow(vec![
        ("Good", ActionConfig::Success),
        ("Bad", ActionConfig::abort("bad branch")),
    ]);
    hops(
        &mut meta,
        vec![
            WorkflowHopMeta::unconditional("Start", "Good"),
            WorkflowHopMeta::unconditional("Start", "Bad"),
        ],
    );

    let result = Workflow::new(meta, Variables::new()).execute().await.unwrap();
    assert!(!result.result);
    assert_eq!(result.status, Status::Failed);
    assert_eq!(result.executions.len(), 3);
}

#[tokio::test]
async fn test_previous_result_passed_to_successor() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = seen.clone();
    let mut meta = workflow(vec![
        ("Fail", ActionConfig::abort("x")),
        (
            "Inspect",
            action(move |ctx| {
                record.lock().push((ctx.action.to_string(), ctx.previous.result));
                Ok(ExecutionResult::success())
            }),
        ),
    ]);
    hops(
        &mut meta,
        vec![
            WorkflowHopMeta::unconditional("Start", "Fail"),
            WorkflowHopMeta::on_failure("Fail", "Inspect"),
        ],
    );

    Workflow::new(meta, Variables::new()).execute().await.unwrap();
    assert_eq!(*seen.lock(), vec![("Inspect".to_string(), false)]);
}

#[tokio::test]
async fn test_action_error_and_panic_become_failures() {
    let mut meta = workflow(vec![
        (
            "Errors",
            action(|ctx| Err(WorkflowError::execution(ctx.action, "exploded"))),
        ),
        ("Panics", action(|_| panic!("kaboom"))),
    ]);
    hops(
        &mut meta,
        vec![
            WorkflowHopMeta::unconditional("Start", "Errors"),
            WorkflowHopMeta::unconditional("Start", "Panics"),
        ],
    );

    let result = Workflow::new(meta, Variables::new()).execute().await.unwrap();
    assert_eq!(result.status, Status::Failed);

    let errors = result.executions_of("Errors").next().unwrap();
    assert!(errors.result.error.as_deref().unwrap().contains("exploded"));
    let panics = result.executions_of("Panics").next().unwrap();
    assert!(panics.result.error.as_deref().unwrap().contains("kaboom"));
}

#[tokio::test]
async fn test_run_pipeline_action() {
    let mut pipeline = PipelineMeta::new("load");
    pipeline
        .add_transform(
            "generate",
            TransformConfig::RowGenerator(RowGeneratorMeta::with_limit("${ROWS}")),
        )
        .add_transform("count", TransformConfig::Dummy)
        .add_hop("generate", "count");

    let mut meta = workflow(vec![
        (
            "Load",
            ActionConfig::RunPipeline(RunPipelineMeta::new(pipeline.clone()).parameter("ROWS", "${BATCH}")),
        ),
        ("Missing", ActionConfig::RunPipeline(RunPipelineMeta::new(pipeline))),
        ("Recover", ActionConfig::Dummy),
    ]);
    hops(
        &mut meta,
        vec![
            WorkflowHopMeta::unconditional("Start", "Load"),
            WorkflowHopMeta::new("Load", "Missing"),
            WorkflowHopMeta::on_failure("Missing", "Recover"),
        ],
    );

    let mut vars = Variables::new();
    vars.set("BATCH", "25");
    let result = Workflow::new(meta, vars).execute().await.unwrap();

    let load = result.executions_of("Load").next().unwrap();
    assert!(load.result.result);
    assert_eq!(load.result.lines_read, 25);

    // ROWS only exists inside the first pipeline's scope.
    let missing = result.executions_of("Missing").next().unwrap();
    assert!(!missing.result.result);
    assert!(missing.result.error.as_deref().unwrap().contains("ROWS"));
    assert!(result.executed("Recover"));
    assert!(result.result);
}

#[tokio::test]
async fn test_stop_prevents_new_actions() {
    let mut meta = workflow(vec![
        (
            "Slow",
            action(|_| {
                std::thread::sleep(Duration::from_millis(300));
                Ok(ExecutionResult::success())
            }),
        ),
        ("After", ActionConfig::Success),
    ]);
    hops(
        &mut meta,
        vec![
            WorkflowHopMeta::unconditional("Start", "Slow"),
            WorkflowHopMeta::new("Slow", "After"),
        ],
    );

    let wf = Workflow::new(meta, Variables::new());
    let stopper = wf.clone();
    let run = tokio::spawn(async move { wf.execute().await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    stopper.stop();

    let result = run.await.unwrap().unwrap();
    assert_eq!(result.status, Status::Stopped);
    assert!(!result.result);
    assert!(result.executed("Slow"));
    assert!(!result.executed("After"));
    assert!(!stopper.is_stopped());
}

#[tokio::test]
async fn test_stop_reaches_running_pipeline() {
    let mut child = PipelineMeta::new("endless");
    child
        .add_transform(
            "generate",
            TransformConfig::RowGenerator(RowGeneratorMeta {
                never_ending: true,
                ..RowGeneratorMeta::with_limit("0")
            }),
        )
        .add_transform("count", TransformConfig::Dummy)
        .add_hop("generate", "count");

    let mut meta = workflow(vec![
        ("Load", ActionConfig::RunPipeline(RunPipelineMeta::new(child))),
        ("After", ActionConfig::Success),
    ]);
    hops(
        &mut meta,
        vec![
            WorkflowHopMeta::unconditional("Start", "Load"),
            WorkflowHopMeta::unconditional("Load", "After"),
        ],
    );

    let wf = Workflow::new(meta, Variables::new());
    let stopper = wf.clone();
    let run = tokio::spawn(async move { wf.execute().await });
    tokio::time::sleep(Duration::from_millis(200)).await;
    stopper.stop();

    let result = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("workflow did not end after stop")
        .unwrap()
        .unwrap();
    assert_eq!(result.status, Status::Stopped);
    assert!(!result.result);

    let load = result.executions_of("Load").next().unwrap();
    assert!(!load.result.result);
    assert!(load.result.lines_written > 0);
    assert!(!result.executed("After"));
}

#[tokio::test]
async fn test_invalid_workflow_rejected() {
    let mut meta = WorkflowMeta::new("no-start");
    meta.add_action(ActionMeta::new("A", ActionConfig::Dummy))
        .unwrap();
    let wf = Workflow::new(meta, Variables::new());

    let err = wf.execute().await.unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(wf.status(), Status::Created);
    assert!(wf.result().is_none());
}

#[tokio::test]
async fn test_listener_error_does_not_mask_result() {
    let mut meta = workflow(vec![("A", ActionConfig::Dummy)]);
    hops(&mut meta, vec![WorkflowHopMeta::unconditional("Start", "A")]);
    let wf = Workflow::new(meta, Variables::new());
    wf.add_execution_finished_listener(|_: &Workflow| -> Result<(), ExecutionError> {
        Err(ExecutionError::new("listener broke"))
    });

    let first = wf.execute().await.unwrap();
    assert_eq!(first.status, Status::Finished);

    // A workflow can run again once the previous run ended.
    let second = wf.execute().await.unwrap();
    assert_ne!(first.run_id, second.run_id);
}
