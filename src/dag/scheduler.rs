// src/dag/scheduler.rs

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::dag::outcome::{JobResult, JobStatus};
use crate::dag::results::ResultLog;
use crate::dag::stages::{Stage, StageMode, StagePlan};
use crate::errors::{JobkitError, Result};
use crate::task::{JobContext, TaskContext, TaskError, TaskInvoker, TaskResult};
use crate::types::Severity;

/// What the scheduler does after recording a result.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Flow {
    Continue,
    Finish(JobStatus, Option<String>),
}

/// Runs an ordered collection of task invokers as one job.
///
/// Stages run in ascending key order. Within a stage tasks run either
/// sequentially (each one sees the results recorded before it) or
/// concurrently (all see one snapshot taken when the stage starts).
///
/// Terminal conditions:
/// - a critical task fails: `Failed`, immediately;
/// - a task succeeds with `block_subsequent`: `Success`, immediately;
/// - the cancel token is set at a stage or sequential-task boundary:
///   `Cancelled`, with the results gathered so far;
/// - otherwise all stages run and failures are classified afterwards.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskGraphScheduler;

impl TaskGraphScheduler {
    pub fn new() -> Self {
        Self
    }

    /// Run `tasks` for the job in `job`.
    ///
    /// Never returns an error: anything unexpected is folded into a `Failed`
    /// [`JobResult`] here, and nowhere else.
    pub async fn run(
        &self,
        tasks: &[TaskInvoker],
        job: Arc<JobContext>,
        cancel: &CancellationToken,
    ) -> JobResult {
        let pending = JobResult::running(job.execution_id(), job.job_id(), job.job_type(), tasks.len());
        let mut log = ResultLog::new();

        info!(
            job_type = %job.job_type(),
            execution_id = %job.execution_id(),
            tasks = tasks.len(),
            "job run started"
        );

        let (status, message) = match self.run_stages(tasks, &job, cancel, &mut log).await {
            Ok(Flow::Finish(status, message)) => (status, message),
            Ok(Flow::Continue) => (JobStatus::Success, None),
            Err(err) => {
                error!(job_type = %job.job_type(), error = %err, "job run aborted");
                (JobStatus::Failed, Some(err.to_string()))
            }
        };

        let result = pending.finalize(status, message, &log);
        info!(
            job_type = %job.job_type(),
            execution_id = %job.execution_id(),
            status = %result.status,
            succeeded = result.successful_tasks,
            failed = result.failed_tasks,
            "job run finished"
        );
        result
    }

    async fn run_stages(
        &self,
        tasks: &[TaskInvoker],
        job: &Arc<JobContext>,
        cancel: &CancellationToken,
        log: &mut ResultLog,
    ) -> Result<Flow> {
        if tasks.is_empty() {
            return Err(JobkitError::ConfigError(format!(
                "job '{}' has no tasks to run",
                job.job_type()
            )));
        }

        let critical: HashMap<&str, bool> = tasks
            .iter()
            .map(|t| (t.id(), t.declaration().is_critical()))
            .collect();
        let plan = StagePlan::from_declarations(tasks.iter().map(|t| t.declaration()));

        for stage in plan.stages() {
            if cancel.is_cancelled() {
                info!(stage = %stage.key, recorded = log.len(), "cancellation requested; stopping before stage");
                return Ok(Flow::Finish(
                    JobStatus::Cancelled,
                    Some(format!("job cancelled before stage {}", stage.key)),
                ));
            }

            debug!(stage = %stage.key, tasks = stage.len(), mode = ?stage.mode, "starting stage");

            let flow = match stage.mode {
                StageMode::Sequential => self.run_sequential(stage, tasks, job, cancel, log).await?,
                StageMode::Concurrent => self.run_concurrent(stage, tasks, job, log).await?,
            };
            if flow != Flow::Continue {
                return Ok(flow);
            }
        }

        Ok(classify_failures(log, &critical, job))
    }

    async fn run_sequential(
        &self,
        stage: &Stage,
        tasks: &[TaskInvoker],
        job: &Arc<JobContext>,
        cancel: &CancellationToken,
        log: &mut ResultLog,
    ) -> Result<Flow> {
        for &index in &stage.members {
            let invoker = &tasks[index];

            if cancel.is_cancelled() {
                info!(task = %invoker.id(), "cancellation requested; stopping before task");
                return Ok(Flow::Finish(
                    JobStatus::Cancelled,
                    Some(format!("job cancelled before task '{}'", invoker.id())),
                ));
            }

            let ctx = TaskContext::new(
                Arc::clone(job),
                invoker.id(),
                invoker.declaration().is_critical(),
                log.snapshot(),
            );
            let started_at = Utc::now();
            let handle = tokio::spawn({
                let invoker = invoker.clone();
                let ctx = ctx.clone();
                async move { invoker.invoke(ctx).await }
            });
            let result = settle(invoker.id(), started_at, handle.await)?;

            let flow = record(&ctx, result, log, job);
            if flow != Flow::Continue {
                return Ok(flow);
            }
        }

        Ok(Flow::Continue)
    }

    async fn run_concurrent(
        &self,
        stage: &Stage,
        tasks: &[TaskInvoker],
        job: &Arc<JobContext>,
        log: &mut ResultLog,
    ) -> Result<Flow> {
        let snapshot = log.snapshot();
        let mut in_flight = Vec::with_capacity(stage.len());

        for &index in &stage.members {
            let invoker = tasks[index].clone();
            let ctx = TaskContext::new(
                Arc::clone(job),
                invoker.id(),
                invoker.declaration().is_critical(),
                snapshot.clone(),
            );
            let started_at = Utc::now();
            let handle = tokio::spawn({
                let ctx = ctx.clone();
                async move { invoker.invoke(ctx).await }
            });
            in_flight.push((ctx, started_at, handle));
        }

        let mut settled = Vec::with_capacity(in_flight.len());
        for (ctx, started_at, handle) in in_flight {
            let joined = handle.await;
            let result = settle(ctx.task_id(), started_at, joined)?;
            settled.push((ctx, result));
        }

        for (ctx, result) in settled {
            let flow = record(&ctx, result, log, job);
            if flow != Flow::Continue {
                return Ok(flow);
            }
        }

        Ok(Flow::Continue)
    }
}

/// Record `result` under the declared task id and decide whether the run
/// goes on.
fn record(ctx: &TaskContext, mut result: TaskResult, log: &mut ResultLog, job: &JobContext) -> Flow {
    if result.task_id != ctx.task_id() {
        debug!(
            task = %ctx.task_id(),
            reported = %result.task_id,
            "task returned a result under another id; recording under the declared id"
        );
        result.task_id = ctx.task_id().to_string();
    }
    ctx.mark_outcome(&result);
    let result = log.record(result);

    if !result.success {
        if ctx.is_critical() {
            let message = format!(
                "critical task '{}' failed: {}",
                result.task_id,
                result.error_text()
            );
            job.log(Severity::Error, &message, None);
            return Flow::Finish(JobStatus::Failed, Some(message));
        }
        debug!(task = %result.task_id, error = %result.error_text(), "non-critical task failed");
        return Flow::Continue;
    }

    if result.block_subsequent {
        job.log(
            Severity::Information,
            &format!(
                "task '{}' blocked subsequent tasks; finishing job early",
                result.task_id
            ),
            None,
        );
        return Flow::Finish(JobStatus::Success, None);
    }

    Flow::Continue
}

/// Post-run classification of recorded failures.
fn classify_failures(log: &ResultLog, critical: &HashMap<&str, bool>, job: &JobContext) -> Flow {
    let (critical_failures, tolerated): (Vec<&TaskResult>, Vec<&TaskResult>) = log
        .iter()
        .map(|r| r.as_ref())
        .filter(|r| !r.success)
        .partition(|r| critical.get(r.task_id.as_str()).copied().unwrap_or(false));

    if !critical_failures.is_empty() {
        let message = match critical_failures.as_slice() {
            [single] => single.error_text().to_string(),
            many => many
                .iter()
                .map(|r| format!("{}: {}", r.task_id, r.error_text()))
                .collect::<Vec<_>>()
                .join("\n"),
        };
        return Flow::Finish(JobStatus::Failed, Some(message));
    }

    for failure in tolerated {
        job.log(
            Severity::Warning,
            &format!(
                "non-critical task '{}' failed: {}",
                failure.task_id,
                failure.error_text()
            ),
            None,
        );
    }

    Flow::Finish(JobStatus::Success, None)
}

/// Turn the joined outcome of one invocation into the result to record.
///
/// Task failures and panics become failed results; only a join failure that
/// is not a panic is an error of the run itself.
fn settle(
    task_id: &str,
    started_at: DateTime<Utc>,
    joined: std::result::Result<std::result::Result<TaskResult, TaskError>, JoinError>,
) -> Result<TaskResult> {
    match joined {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(err)) => {
            debug!(task = %task_id, error = %err, "task invocation failed");
            Ok(err.into_result(started_at, Utc::now()))
        }
        Err(join_err) if join_err.is_panic() => {
            let message = panic_message(join_err.into_panic());
            error!(task = %task_id, panic = %message, "task panicked");
            Ok(TaskError::Panicked {
                task_id: task_id.to_string(),
                message,
            }
            .into_result(started_at, Utc::now()))
        }
        Err(join_err) => Err(JobkitError::Other(
            anyhow!(join_err).context(format!("task '{task_id}' did not complete")),
        )),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
