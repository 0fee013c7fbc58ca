// src/task/result.rs

//! Outcome of a single task attempt.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Output key used when a task body produces a bare value instead of a full
/// [`TaskResult`].
pub const DEFAULT_OUTPUT_KEY: &str = "result";

/// String-keyed heterogeneous output store of a task.
pub type OutputData = BTreeMap<String, serde_json::Value>;

/// Result of one task attempt.
///
/// Created fresh per attempt. Once the scheduler records it into the job's
/// result log it is shared behind an `Arc` and never mutated again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub success: bool,
    pub error_message: Option<String>,
    /// Root cause of the failure, when it differs from the message.
    pub error_cause: Option<String>,
    #[serde(default)]
    pub output: OutputData,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// A successful result with this flag set ends the job early (and
    /// successfully); later tasks are never invoked.
    #[serde(default)]
    pub block_subsequent: bool,
}

impl TaskResult {
    pub fn success(task_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            task_id: task_id.into(),
            success: true,
            error_message: None,
            error_cause: None,
            output: OutputData::new(),
            started_at: now,
            finished_at: now,
            block_subsequent: false,
        }
    }

    pub fn failure(task_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
            ..Self::success(task_id)
        }
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.error_cause = Some(cause.into());
        self
    }

    pub fn with_output(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.output.insert(key.into(), value.into());
        self
    }

    /// Mark this result as blocking: the job finishes successfully right after it.
    pub fn blocking(mut self) -> Self {
        self.block_subsequent = true;
        self
    }

    /// Overwrite the timing window of this result.
    pub fn timed(mut self, started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self.finished_at = finished_at;
        self
    }

    /// Human-readable error, falling back to a generic message.
    pub fn error_text(&self) -> &str {
        self.error_message.as_deref().unwrap_or("unknown error")
    }

    /// Look up a single output value.
    pub fn output_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.output.get(key)
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
