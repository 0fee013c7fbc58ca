// src/task/context.rs

//! Job- and task-scoped execution contexts, and the log sink they report to.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error, info, trace, warn};
use ulid::Ulid;

use crate::dag::ResultSnapshot;
use crate::task::{ServiceContainer, TaskResult};
use crate::types::Severity;

/// Destination for job and task log messages.
pub trait LogSink: Send + Sync {
    fn log(&self, severity: Severity, message: &str, error: Option<&anyhow::Error>);
}

/// Default sink: forwards everything to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&self, severity: Severity, message: &str, error: Option<&anyhow::Error>) {
        let error = error.map(|e| format!("{e:#}"));
        match severity {
            Severity::Trace => trace!(error = ?error, "{message}"),
            Severity::Debug => debug!(error = ?error, "{message}"),
            Severity::Information => info!(error = ?error, "{message}"),
            Severity::Warning => warn!(error = ?error, "{message}"),
            Severity::Error => error!(error = ?error, "{message}"),
            Severity::Critical => error!(critical = true, error = ?error, "{message}"),
        }
    }
}

/// Context shared by every task of one job run.
pub struct JobContext {
    job_id: String,
    job_type: String,
    execution_id: Ulid,
    configuration: toml::Table,
    services: Arc<ServiceContainer>,
    log_sink: Arc<dyn LogSink>,
}

impl fmt::Debug for JobContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobContext")
            .field("job_id", &self.job_id)
            .field("job_type", &self.job_type)
            .field("execution_id", &self.execution_id)
            .finish_non_exhaustive()
    }
}

impl JobContext {
    pub fn new(
        job_id: impl Into<String>,
        job_type: impl Into<String>,
        services: Arc<ServiceContainer>,
        log_sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            job_type: job_type.into(),
            execution_id: Ulid::new(),
            configuration: toml::Table::new(),
            services,
            log_sink,
        }
    }

    pub fn with_configuration(mut self, configuration: toml::Table) -> Self {
        self.configuration = configuration;
        self
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn job_type(&self) -> &str {
        &self.job_type
    }

    pub fn execution_id(&self) -> Ulid {
        self.execution_id
    }

    /// Opaque per-job configuration payload from the host config.
    pub fn configuration(&self) -> &toml::Table {
        &self.configuration
    }

    pub fn services(&self) -> &ServiceContainer {
        &self.services
    }

    pub fn shared_services(&self) -> Arc<ServiceContainer> {
        Arc::clone(&self.services)
    }

    pub fn log(&self, severity: Severity, message: &str, error: Option<&anyhow::Error>) {
        self.log_sink.log(severity, message, error);
    }
}

struct TaskContextInner {
    job: Arc<JobContext>,
    task_id: String,
    critical: bool,
    previous: ResultSnapshot,
    succeeded: AtomicBool,
    block_subsequent: AtomicBool,
}

/// Per-task handle given to a task body.
///
/// The view of previous results is fixed when the context is built; results
/// recorded afterwards are never visible through it.
#[derive(Clone)]
pub struct TaskContext {
    inner: Arc<TaskContextInner>,
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("task_id", &self.inner.task_id)
            .field("critical", &self.inner.critical)
            .field("previous_results", &self.inner.previous.version())
            .finish_non_exhaustive()
    }
}

impl TaskContext {
    pub fn new(
        job: Arc<JobContext>,
        task_id: impl Into<String>,
        critical: bool,
        previous: ResultSnapshot,
    ) -> Self {
        Self {
            inner: Arc::new(TaskContextInner {
                job,
                task_id: task_id.into(),
                critical,
                previous,
                succeeded: AtomicBool::new(false),
                block_subsequent: AtomicBool::new(false),
            }),
        }
    }

    pub fn job(&self) -> &JobContext {
        &self.inner.job
    }

    pub fn task_id(&self) -> &str {
        &self.inner.task_id
    }

    pub fn is_critical(&self) -> bool {
        self.inner.critical
    }

    pub fn previous_results(&self) -> &ResultSnapshot {
        &self.inner.previous
    }

    pub fn previous_result(&self, task_id: &str) -> Option<&TaskResult> {
        self.inner.previous.get(task_id)
    }

    pub fn services(&self) -> &ServiceContainer {
        self.inner.job.services()
    }

    /// Whether the invocation succeeded. Only meaningful after the scheduler
    /// has recorded the outcome.
    pub fn succeeded(&self) -> bool {
        self.inner.succeeded.load(Ordering::Acquire)
    }

    pub fn block_subsequent(&self) -> bool {
        self.inner.block_subsequent.load(Ordering::Acquire)
    }

    pub(crate) fn mark_outcome(&self, result: &TaskResult) {
        self.inner.succeeded.store(result.success, Ordering::Release);
        self.inner
            .block_subsequent
            .store(result.block_subsequent, Ordering::Release);
    }

    /// Report progress to the job's log sink as
    /// `task '<id>': <pct>% - <message>`.
    pub fn report_progress(&self, percent: u8, message: &str, severity: Severity) {
        let line = format_progress(&self.inner.task_id, percent, message);
        self.inner.job.log(severity, &line, None);
    }
}

pub(crate) fn format_progress(task_id: &str, percent: u8, message: &str) -> String {
    format!("task '{task_id}': {}% - {message}", percent.min(100))
}
