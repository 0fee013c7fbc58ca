// src/job/mod.rs

//! The registerable unit a host discovers and runs.
//!
//! - [`info`] holds a job's identity, lifecycle state and configuration.
//! - [`history`] keeps the most recent results of a loaded job in memory.
//! - [`runner`] drives one run of a job through the scheduler.

pub mod history;
pub mod info;
pub mod runner;

pub use history::ExecutionHistory;
pub use info::JobInfo;
pub use runner::run_job;

use crate::dag::TaskGraph;
use crate::errors::Result;
use crate::task::ServiceContainer;

/// Contract every job implementation satisfies.
///
/// Implementations are constructed without arguments by the registry
/// (see [`JobCatalog`](crate::registry::JobCatalog)), then asked to register
/// their services once before their first run.
pub trait Job: Send + Sync {
    fn info(&self) -> &JobInfo;

    /// Build the validated set of tasks for one run.
    fn task_graph(&self) -> Result<TaskGraph>;

    /// Register the services this job's tasks resolve at run time.
    fn register_services(&self, _services: &ServiceContainer) -> Result<()> {
        Ok(())
    }
}
