use std::collections::HashSet;
use std::sync::Arc;

use jobkit::dag::{StageMode, StagePlan, TaskGraphScheduler};
use jobkit::task::{
    JobContext, ServiceContainer, StageKey, TaskDeclaration, TaskHandler, TaskInvoker,
    TracingLogSink,
};
use jobkit_test_utils::{ExecutionLog, init_tracing, with_timeout};
use proptest::prelude::*;
use tokio::sync::Barrier;
use tokio_util::sync::CancellationToken;

fn declarations_strategy() -> impl Strategy<Value = Vec<TaskDeclaration>> {
    proptest::collection::vec((proptest::option::of(-3i32..4), any::<bool>()), 1..24).prop_map(
        |specs| {
            specs
                .into_iter()
                .enumerate()
                .map(|(i, (stage, concurrent))| {
                    let decl = TaskDeclaration::new(format!("t{i}")).concurrent(concurrent);
                    match stage {
                        Some(stage) => decl.stage(stage),
                        None => decl,
                    }
                })
                .collect()
        },
    )
}

proptest! {
    #[test]
    fn stage_grouping_is_stable(decls in declarations_strategy()) {
        let plan = StagePlan::from_declarations(&decls);
        let stages = plan.stages();

        // Strictly ascending keys, so every key forms exactly one group.
        for pair in stages.windows(2) {
            prop_assert!(pair[0].key < pair[1].key);
        }

        // At most one trailing group, and it is last.
        let trailing = stages.iter().filter(|s| s.key == StageKey::Trailing).count();
        prop_assert!(trailing <= 1);
        if decls.iter().any(|d| d.stage_number().is_none()) {
            prop_assert_eq!(stages.last().map(|s| s.key), Some(StageKey::Trailing));
        }

        // Every task appears once, in its own stage, in declaration order.
        let mut seen = HashSet::new();
        for stage in stages {
            prop_assert!(stage.members.windows(2).all(|w| w[0] < w[1]));
            for &index in &stage.members {
                prop_assert!(seen.insert(index));
                prop_assert_eq!(decls[index].stage_key(), stage.key);
            }

            let all_concurrent = stage.members.iter().all(|&i| decls[i].is_concurrent());
            let expected = if stage.len() > 1 && all_concurrent {
                StageMode::Concurrent
            } else {
                StageMode::Sequential
            };
            prop_assert_eq!(stage.mode, expected);
        }
        prop_assert_eq!(seen.len(), decls.len());
    }
}

fn job() -> Arc<JobContext> {
    Arc::new(JobContext::new(
        "job-1",
        "grouping",
        Arc::new(ServiceContainer::new()),
        Arc::new(TracingLogSink),
    ))
}

#[tokio::test]
async fn stages_run_in_ascending_order_with_trailing_stage_last() {
    init_tracing();
    let log = ExecutionLog::new();
    let tasks = vec![
        TaskInvoker::new(TaskDeclaration::new("trailing"), log.succeed("trailing")),
        TaskInvoker::new(TaskDeclaration::new("two").stage(2), log.succeed("two")),
        TaskInvoker::new(TaskDeclaration::new("minus").stage(-1), log.succeed("minus")),
        TaskInvoker::new(TaskDeclaration::new("one-a").stage(1), log.succeed("one-a")),
        TaskInvoker::new(TaskDeclaration::new("one-b").stage(1), log.succeed("one-b")),
    ];

    let result = TaskGraphScheduler::new()
        .run(&tasks, job(), &CancellationToken::new())
        .await;

    assert!(result.success);
    assert_eq!(log.entries(), vec!["minus", "one-a", "one-b", "two", "trailing"]);
    assert_eq!(result.execution_order, log.entries());
    assert_eq!(result.total_tasks, 5);
    assert_eq!(result.successful_tasks, 5);
}

#[tokio::test]
async fn mixed_eligibility_stage_runs_sequentially() {
    init_tracing();
    // B sees A's result only if A was recorded before B started.
    let tasks = vec![
        TaskInvoker::new(
            TaskDeclaration::new("A").stage(1).concurrent(true),
            TaskHandler::no_args(|| async { Ok(serde_json::json!("from A")) }),
        ),
        TaskInvoker::new(
            TaskDeclaration::new("B").stage(1).concurrent(false),
            TaskHandler::with_context(|ctx| async move {
                let seen = ctx.previous_result("A").is_some();
                Ok(serde_json::json!(seen))
            }),
        ),
    ];

    let plan = StagePlan::from_declarations(tasks.iter().map(|t| t.declaration()));
    assert_eq!(plan.stages()[0].mode, StageMode::Sequential);

    let result = TaskGraphScheduler::new()
        .run(&tasks, job(), &CancellationToken::new())
        .await;
    assert_eq!(
        result.task("B").and_then(|r| r.output_value("result")),
        Some(&serde_json::json!(true))
    );
}

#[tokio::test]
async fn fully_concurrent_stage_runs_tasks_at_the_same_time() {
    init_tracing();
    // Both tasks wait on one barrier: sequential dispatch would never finish.
    let barrier = Arc::new(Barrier::new(2));
    let waiter = |barrier: Arc<Barrier>| {
        TaskHandler::no_args(move || {
            let barrier = Arc::clone(&barrier);
            async move {
                barrier.wait().await;
                Ok(())
            }
        })
    };
    let tasks = vec![
        TaskInvoker::new(
            TaskDeclaration::new("left").stage(1).concurrent(true),
            waiter(Arc::clone(&barrier)),
        ),
        TaskInvoker::new(
            TaskDeclaration::new("right").stage(1).concurrent(true),
            waiter(Arc::clone(&barrier)),
        ),
    ];

    let result =
        with_timeout(TaskGraphScheduler::new().run(&tasks, job(), &CancellationToken::new())).await;
    assert!(result.success);
    assert_eq!(result.successful_tasks, 2);
}
