// src/job/runner.rs

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::dag::{JobResult, TaskGraphScheduler};
use crate::errors::Result;
use crate::job::Job;
use crate::task::{JobContext, LogSink, ServiceContainer};
use crate::types::JobState;

/// Run `job` once.
///
/// Graph construction errors propagate. Everything that happens while the
/// tasks run is reported through the returned [`JobResult`] instead. The job
/// is `Processing` for the duration of the run and `Active` afterwards; the
/// result is appended to the job's history.
pub async fn run_job(
    job: &dyn Job,
    services: Arc<ServiceContainer>,
    sink: Arc<dyn LogSink>,
    cancel: &CancellationToken,
) -> Result<JobResult> {
    let info = job.info();
    let graph = job.task_graph()?;

    let ctx = Arc::new(
        JobContext::new(info.id().to_string(), info.job_type(), services, sink)
            .with_configuration(info.configuration()),
    );
    debug!(
        job_type = %info.job_type(),
        execution_id = %ctx.execution_id(),
        tasks = graph.len(),
        "running job"
    );

    info.set_state(JobState::Processing);
    let result = TaskGraphScheduler::new()
        .run(graph.tasks(), ctx, cancel)
        .await;
    info.set_state(JobState::Active);

    info!(
        job_type = %info.job_type(),
        status = %result.status,
        "job run recorded"
    );
    info.history().record(result.clone());
    Ok(result)
}
