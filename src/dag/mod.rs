// src/dag/mod.rs

//! Task graph representation and scheduling.
//!
//! - [`graph`] validates a job's tasks and analyses their dependencies.
//! - [`stages`] groups tasks into ordered sequential / concurrent stages.
//! - [`results`] holds the append-only result log and its snapshots.
//! - [`scheduler`] runs the stages and aggregates the job outcome.
//! - [`outcome`] defines the job-level result.

pub mod graph;
pub mod outcome;
pub mod results;
pub mod scheduler;
pub mod stages;

pub use graph::{DependencyAnalysis, TaskGraph, TaskGraphBuilder, UnsatisfiableDependency, UnsatisfiableReason};
pub use outcome::{JobResult, JobStatus};
pub use results::{ResultLog, ResultSnapshot};
pub use scheduler::TaskGraphScheduler;
pub use stages::{Stage, StageMode, StagePlan};
