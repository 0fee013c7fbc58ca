// src/task/invoker.rs

//! Adapter from a task declaration + body to the uniform
//! `invoke(context) -> result` contract.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::task::{TaskContext, TaskDeclaration, TaskHandler, TaskOutput, TaskResult};

/// Failure signalled by [`TaskInvoker::invoke`].
///
/// The scheduler turns it into a failed [`TaskResult`]; that recorded failure
/// is what the cascade gate of every later invocation observes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    /// Refused to run because an earlier task failed.
    #[error("task '{task_id}' was not executed: previous task '{predecessor}' failed: {message}")]
    Cascade {
        task_id: String,
        predecessor: String,
        message: String,
    },

    /// The task body returned an error. `message` is the root cause.
    #[error("{message}")]
    Invocation {
        task_id: String,
        message: String,
        chain: String,
    },

    /// The task body panicked.
    #[error("task '{task_id}' panicked: {message}")]
    Panicked { task_id: String, message: String },
}

impl TaskError {
    pub fn task_id(&self) -> &str {
        match self {
            TaskError::Cascade { task_id, .. }
            | TaskError::Invocation { task_id, .. }
            | TaskError::Panicked { task_id, .. } => task_id,
        }
    }

    /// Convert into the failed result recorded for the task.
    pub fn into_result(self, started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> TaskResult {
        let message = self.to_string();
        let result = match self {
            TaskError::Cascade {
                task_id,
                predecessor,
                ..
            } => TaskResult::failure(task_id, message).with_cause(format!("upstream failure in '{predecessor}'")),
            TaskError::Invocation { task_id, chain, .. } => {
                let result = TaskResult::failure(task_id, message.clone());
                if chain != message {
                    result.with_cause(chain)
                } else {
                    result
                }
            }
            TaskError::Panicked { task_id, .. } => TaskResult::failure(task_id, message),
        };
        result.timed(started_at, finished_at)
    }
}

/// One declared task, ready to be invoked by the scheduler.
#[derive(Debug, Clone)]
pub struct TaskInvoker {
    declaration: TaskDeclaration,
    handler: TaskHandler,
}

impl TaskInvoker {
    pub fn new(declaration: TaskDeclaration, handler: TaskHandler) -> Self {
        Self {
            declaration,
            handler,
        }
    }

    pub fn id(&self) -> &str {
        self.declaration.id()
    }

    pub fn declaration(&self) -> &TaskDeclaration {
        &self.declaration
    }

    /// Run the task against `ctx`.
    ///
    /// Gates, in order:
    /// 1. any failed result visible in the context refuses the run with
    ///    [`TaskError::Cascade`], whether or not it is a declared dependency;
    /// 2. a declared dependency that is missing or failed yields a failed
    ///    `Ok` result citing it.
    ///
    /// The first gate cascades to independent tasks as well. That is existing
    /// observable behaviour and is kept as is until product confirms otherwise.
    pub async fn invoke(&self, ctx: TaskContext) -> Result<TaskResult, TaskError> {
        let task_id = self.declaration.id();

        if let Some(failed) = ctx.previous_results().first_failure() {
            warn!(
                task = %task_id,
                predecessor = %failed.task_id,
                "previous task failed; refusing to run"
            );
            return Err(TaskError::Cascade {
                task_id: task_id.to_string(),
                predecessor: failed.task_id.clone(),
                message: failed.error_text().to_string(),
            });
        }

        let started_at = Utc::now();

        for dep in self.declaration.dependencies() {
            match ctx.previous_result(dep) {
                None => {
                    debug!(task = %task_id, dependency = %dep, "dependency has not run");
                    return Ok(TaskResult::failure(
                        task_id,
                        format!("dependency '{dep}' of task '{task_id}' has not been executed"),
                    )
                    .timed(started_at, Utc::now()));
                }
                Some(result) if !result.success => {
                    return Ok(TaskResult::failure(
                        task_id,
                        format!("dependency '{dep}' of task '{task_id}' failed: {}", result.error_text()),
                    )
                    .timed(started_at, Utc::now()));
                }
                Some(_) => {}
            }
        }

        debug!(task = %task_id, handler = ?self.handler, "invoking task");

        let produced = self.handler.call(ctx).await;
        let finished_at = Utc::now();

        match produced {
            // A body-built result keeps its own window unless it never set one.
            Ok(TaskOutput::Result(result)) if result.started_at == result.finished_at => {
                Ok(result.timed(started_at, finished_at))
            }
            Ok(TaskOutput::Result(result)) => Ok(result),
            Ok(output) => Ok(output.into_result(task_id).timed(started_at, finished_at)),
            Err(err) => Err(TaskError::Invocation {
                task_id: task_id.to_string(),
                message: err.root_cause().to_string(),
                chain: format!("{err:#}"),
            }),
        }
    }
}
