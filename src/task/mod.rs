// src/task/mod.rs

//! Task-level building blocks.
//!
//! - [`declaration`]: static metadata (id, stage, concurrency, criticality,
//!   dependencies).
//! - [`result`]: the outcome of a single task attempt.
//! - [`context`]: job and task contexts plus the log sink they report to.
//! - [`handler`]: the accepted task body shapes.
//! - [`invoker`]: gates and error translation around a task body.
//! - [`services`]: the shared service container.

pub mod context;
pub mod declaration;
pub mod handler;
pub mod invoker;
pub mod result;
pub mod services;

pub use context::{JobContext, LogSink, TaskContext, TracingLogSink};
pub use declaration::{StageKey, TaskDeclaration};
pub use handler::{TaskFuture, TaskHandler, TaskOutput};
pub use invoker::{TaskError, TaskInvoker};
pub use result::{DEFAULT_OUTPUT_KEY, OutputData, TaskResult};
pub use services::ServiceContainer;
