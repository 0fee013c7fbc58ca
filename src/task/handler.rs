// src/task/handler.rs

//! Task bodies and the values they may produce.
//!
//! A task body is one of a fixed set of callable shapes; [`TaskHandler`] has
//! one variant per accepted shape, so any other signature is rejected at
//! compile time.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::task::{ServiceContainer, TaskContext, TaskResult, result::DEFAULT_OUTPUT_KEY};

/// Boxed future produced by asynchronous task bodies.
pub type TaskFuture = Pin<Box<dyn Future<Output = anyhow::Result<TaskOutput>> + Send + 'static>>;

type NoArgsFn = dyn Fn() -> TaskFuture + Send + Sync;
type ContextFn = dyn Fn(TaskContext) -> TaskFuture + Send + Sync;
type ServicesFn = dyn Fn(Arc<ServiceContainer>) -> TaskFuture + Send + Sync;
type ContextAndServicesFn = dyn Fn(TaskContext, Arc<ServiceContainer>) -> TaskFuture + Send + Sync;
type BlockingFn = dyn Fn(&TaskContext) -> anyhow::Result<TaskOutput> + Send + Sync;

/// Value produced by a task body.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutput {
    /// No value; a success result is synthesized.
    Empty,
    /// A bare value, stored under [`DEFAULT_OUTPUT_KEY`].
    Value(serde_json::Value),
    /// A complete result, returned as is.
    Result(TaskResult),
}

impl From<()> for TaskOutput {
    fn from(_: ()) -> Self {
        TaskOutput::Empty
    }
}

impl From<TaskResult> for TaskOutput {
    fn from(result: TaskResult) -> Self {
        TaskOutput::Result(result)
    }
}

impl From<serde_json::Value> for TaskOutput {
    fn from(value: serde_json::Value) -> Self {
        TaskOutput::Value(value)
    }
}

impl<T: Into<TaskOutput>> From<Option<T>> for TaskOutput {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(TaskOutput::Empty)
    }
}

impl TaskOutput {
    /// Turn the produced value into a [`TaskResult`] for `task_id`.
    pub fn into_result(self, task_id: &str) -> TaskResult {
        match self {
            TaskOutput::Result(result) => result,
            TaskOutput::Empty | TaskOutput::Value(serde_json::Value::Null) => {
                TaskResult::success(task_id)
            }
            TaskOutput::Value(value) => TaskResult::success(task_id).with_output(DEFAULT_OUTPUT_KEY, value),
        }
    }
}

/// Accepted shapes of a task body.
#[derive(Clone)]
pub enum TaskHandler {
    NoArgs(Arc<NoArgsFn>),
    Context(Arc<ContextFn>),
    Services(Arc<ServicesFn>),
    ContextAndServices(Arc<ContextAndServicesFn>),
    /// Synchronous body taking the task context.
    Blocking(Arc<BlockingFn>),
}

impl fmt::Debug for TaskHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskHandler::NoArgs(_) => "TaskHandler::NoArgs",
            TaskHandler::Context(_) => "TaskHandler::Context",
            TaskHandler::Services(_) => "TaskHandler::Services",
            TaskHandler::ContextAndServices(_) => "TaskHandler::ContextAndServices",
            TaskHandler::Blocking(_) => "TaskHandler::Blocking",
        })
    }
}

impl TaskHandler {
    pub fn no_args<F, Fut, O>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<O>> + Send + 'static,
        O: Into<TaskOutput>,
    {
        TaskHandler::NoArgs(Arc::new(move || {
            let fut = f();
            Box::pin(async move { fut.await.map(Into::into) })
        }))
    }

    pub fn with_context<F, Fut, O>(f: F) -> Self
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<O>> + Send + 'static,
        O: Into<TaskOutput>,
    {
        TaskHandler::Context(Arc::new(move |ctx| {
            let fut = f(ctx);
            Box::pin(async move { fut.await.map(Into::into) })
        }))
    }

    pub fn with_services<F, Fut, O>(f: F) -> Self
    where
        F: Fn(Arc<ServiceContainer>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<O>> + Send + 'static,
        O: Into<TaskOutput>,
    {
        TaskHandler::Services(Arc::new(move |services| {
            let fut = f(services);
            Box::pin(async move { fut.await.map(Into::into) })
        }))
    }

    pub fn with_context_and_services<F, Fut, O>(f: F) -> Self
    where
        F: Fn(TaskContext, Arc<ServiceContainer>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<O>> + Send + 'static,
        O: Into<TaskOutput>,
    {
        TaskHandler::ContextAndServices(Arc::new(move |ctx, services| {
            let fut = f(ctx, services);
            Box::pin(async move { fut.await.map(Into::into) })
        }))
    }

    pub fn blocking<F, O>(f: F) -> Self
    where
        F: Fn(&TaskContext) -> anyhow::Result<O> + Send + Sync + 'static,
        O: Into<TaskOutput>,
    {
        TaskHandler::Blocking(Arc::new(move |ctx| f(ctx).map(Into::into)))
    }

    /// Call the body with whatever arguments its shape asks for.
    pub(crate) fn call(&self, ctx: TaskContext) -> TaskFuture {
        match self {
            TaskHandler::NoArgs(f) => f(),
            TaskHandler::Context(f) => f(ctx),
            TaskHandler::Services(f) => f(ctx.job().shared_services()),
            TaskHandler::ContextAndServices(f) => {
                let services = ctx.job().shared_services();
                f(ctx, services)
            }
            TaskHandler::Blocking(f) => {
                let out = f(&ctx);
                Box::pin(async move { out })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn bare_values_are_wrapped_under_default_key() {
        let r = TaskOutput::from(json!({"rows": 3})).into_result("count");
        assert!(r.success);
        assert_eq!(r.output_value(DEFAULT_OUTPUT_KEY), Some(&json!({"rows": 3})));
    }

    #[test]
    fn null_and_empty_synthesize_success() {
        for out in [TaskOutput::Empty, TaskOutput::Value(serde_json::Value::Null)] {
            let r = out.into_result("noop");
            assert!(r.success);
            assert!(r.output.is_empty());
            assert_eq!(r.task_id, "noop");
        }
    }

    #[test]
    fn full_results_pass_through_verbatim() {
        let original = TaskResult::failure("other-id", "explicit failure").blocking();
        let r = TaskOutput::from(original.clone()).into_result("ignored");
        assert_eq!(r, original);
    }
}
