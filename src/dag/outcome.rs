// src/dag/outcome.rs

//! Job-level outcome of one scheduler run.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::dag::ResultLog;
use crate::task::TaskResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Success,
    Failed,
    Cancelled,
    CompletedWithWarnings,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::CompletedWithWarnings => "completed_with_warnings",
        })
    }
}

/// Outcome of a whole job run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub execution_id: Ulid,
    pub job_id: String,
    pub job_type: String,
    pub success: bool,
    pub status: JobStatus,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub task_results: BTreeMap<String, Arc<TaskResult>>,
    /// Task ids in the order their results were recorded.
    pub execution_order: Vec<String>,
    pub successful_tasks: usize,
    pub failed_tasks: usize,
    pub total_tasks: usize,
}

impl JobResult {
    /// A result in the `Running` state.
    pub fn running(
        execution_id: Ulid,
        job_id: impl Into<String>,
        job_type: impl Into<String>,
        total_tasks: usize,
    ) -> Self {
        Self {
            execution_id,
            job_id: job_id.into(),
            job_type: job_type.into(),
            success: false,
            status: JobStatus::Running,
            error_message: None,
            started_at: Utc::now(),
            finished_at: None,
            task_results: BTreeMap::new(),
            execution_order: Vec::new(),
            successful_tasks: 0,
            failed_tasks: 0,
            total_tasks,
        }
    }

    /// Seal the result. Only the scheduler's single return point calls this.
    pub(crate) fn finalize(
        mut self,
        status: JobStatus,
        error_message: Option<String>,
        log: &ResultLog,
    ) -> Self {
        for result in log.iter() {
            self.execution_order.push(result.task_id.clone());
            self.task_results
                .insert(result.task_id.clone(), Arc::clone(result));
        }
        self.successful_tasks = self.task_results.values().filter(|r| r.success).count();
        self.failed_tasks = self.task_results.len() - self.successful_tasks;
        self.success = matches!(status, JobStatus::Success | JobStatus::CompletedWithWarnings);
        self.status = status;
        self.error_message = error_message;
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn task(&self, task_id: &str) -> Option<&TaskResult> {
        self.task_results.get(task_id).map(|r| r.as_ref())
    }

    pub fn executed(&self, task_id: &str) -> bool {
        self.task_results.contains_key(task_id)
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }
}
