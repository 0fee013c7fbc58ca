use std::io::Write;

use jobkit::config::{load_and_validate, load_or_default};
use jobkit::dag::{JobStatus, TaskGraph, TaskGraphScheduler};
use jobkit::errors::JobkitError;
use jobkit::fs::RealFileSystem;
use jobkit::task::{
    JobContext, ServiceContainer, TaskDeclaration, TaskHandler, TaskInvoker, TracingLogSink,
};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn invalid_toml_is_a_toml_error() {
    let file = config_file("[registry\nmodules_dir = ");
    let result = load_and_validate(&RealFileSystem, file.path());
    assert!(matches!(result, Err(JobkitError::TomlError(_))));
}

#[test]
fn invalid_registry_settings_are_config_errors() {
    let file = config_file("[registry]\nextensions = [\".so\"]\n");
    match load_and_validate(&RealFileSystem, file.path()) {
        Err(JobkitError::ConfigError(msg)) => assert!(msg.contains(".so")),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn missing_config_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = load_or_default(&RealFileSystem, dir.path().join("Jobkit.toml")).unwrap();
    assert_eq!(cfg.registry().modules_dir, dir.path().join("modules"));
}

#[test]
fn task_graph_rejects_bad_declarations() {
    let noop = || TaskHandler::no_args(|| async { Ok(()) });

    let cycle = TaskGraph::builder()
        .task(TaskDeclaration::new("a").depends_on("c"), noop())
        .task(TaskDeclaration::new("b").depends_on("a"), noop())
        .task(TaskDeclaration::new("c").depends_on("b"), noop())
        .build();
    assert!(matches!(cycle, Err(JobkitError::DependencyCycle(_))));

    let self_dep = TaskGraph::builder()
        .task(TaskDeclaration::new("a").depends_on("a"), noop())
        .build();
    assert!(matches!(self_dep, Err(JobkitError::ConfigError(m)) if m.contains("itself")));
}

#[tokio::test]
async fn missing_service_fails_the_task_not_the_scheduler() {
    struct Mailer;

    let tasks = vec![TaskInvoker::new(
        TaskDeclaration::new("notify").critical(true),
        TaskHandler::with_services(|services| async move {
            services.require::<Mailer>()?;
            Ok(())
        }),
    )];
    let job = Arc::new(JobContext::new(
        "job-1",
        "mailer",
        Arc::new(ServiceContainer::new()),
        Arc::new(TracingLogSink),
    ));

    let result = TaskGraphScheduler::new()
        .run(&tasks, job, &CancellationToken::new())
        .await;

    assert_eq!(result.status, JobStatus::Failed);
    let notify = result.task("notify").expect("recorded");
    assert!(notify.error_text().contains("Mailer"), "got: {}", notify.error_text());
}
