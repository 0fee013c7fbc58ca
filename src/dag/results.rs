// src/dag/results.rs

//! Append-only log of task results and the immutable snapshots handed to
//! task contexts.
//!
//! A result recorded into the [`ResultLog`] is visible to every snapshot taken
//! *after* the insertion and to none taken before. Sequential tasks therefore
//! observe their predecessors in the same stage, while concurrent siblings all
//! share one snapshot and never observe each other.

use std::sync::Arc;

use crate::task::TaskResult;

/// Append-only record of task results for one job run.
#[derive(Debug, Default)]
pub struct ResultLog {
    entries: Vec<Arc<TaskResult>>,
}

impl ResultLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a result. Results are written once per task; should the same id
    /// be recorded twice, lookups resolve to the latest entry.
    pub fn record(&mut self, result: TaskResult) -> Arc<TaskResult> {
        let result = Arc::new(result);
        self.entries.push(Arc::clone(&result));
        result
    }

    /// Immutable view of everything recorded so far.
    pub fn snapshot(&self) -> ResultSnapshot {
        ResultSnapshot {
            entries: Arc::from(self.entries.as_slice()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<TaskResult>> {
        self.entries.iter()
    }
}

/// Versioned, read-only view over a [`ResultLog`].
///
/// The version is the number of results visible through the snapshot.
#[derive(Debug, Clone)]
pub struct ResultSnapshot {
    entries: Arc<[Arc<TaskResult>]>,
}

impl Default for ResultSnapshot {
    fn default() -> Self {
        Self {
            entries: Arc::from(Vec::new()),
        }
    }
}

impl ResultSnapshot {
    pub fn version(&self) -> usize {
        self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, task_id: &str) -> Option<&TaskResult> {
        self.entries
            .iter()
            .rev()
            .find(|r| r.task_id == task_id)
            .map(|r| r.as_ref())
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.get(task_id).is_some()
    }

    /// Results in recording order.
    pub fn iter(&self) -> impl Iterator<Item = &TaskResult> {
        self.entries.iter().map(|r| r.as_ref())
    }

    /// First unsuccessful result, in recording order.
    pub fn first_failure(&self) -> Option<&TaskResult> {
        self.iter().find(|r| !r.success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshots_do_not_see_later_records() {
        let mut log = ResultLog::new();
        log.record(TaskResult::success("a"));
        let before = log.snapshot();
        log.record(TaskResult::failure("b", "boom"));
        let after = log.snapshot();

        assert_eq!(before.version(), 1);
        assert!(before.get("b").is_none());
        assert!(before.first_failure().is_none());

        assert_eq!(after.version(), 2);
        assert_eq!(after.first_failure().map(|r| r.task_id.as_str()), Some("b"));
    }

    #[test]
    fn latest_entry_wins_for_duplicate_ids() {
        let mut log = ResultLog::new();
        log.record(TaskResult::failure("a", "first"));
        log.record(TaskResult::success("a"));
        assert!(log.snapshot().get("a").is_some_and(|r| r.success));
    }
}
