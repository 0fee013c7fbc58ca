// src/job/history.rs

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::dag::JobResult;

/// Default number of results kept per job.
pub const DEFAULT_HISTORY_CAPACITY: usize = 32;

/// In-memory record of a job's most recent runs, oldest first.
#[derive(Debug)]
pub struct ExecutionHistory {
    capacity: usize,
    entries: Mutex<VecDeque<JobResult>>,
}

impl Default for ExecutionHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl ExecutionHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn record(&self, result: JobResult) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(result);
    }

    pub fn latest(&self) -> Option<JobResult> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.back().cloned()
    }

    pub fn snapshot(&self) -> Vec<JobResult> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use ulid::Ulid;

    use super::*;

    #[test]
    fn oldest_entries_are_evicted() {
        let history = ExecutionHistory::with_capacity(2);
        for job_id in ["first", "second", "third"] {
            history.record(JobResult::running(Ulid::new(), job_id, "demo", 0));
        }
        let ids: Vec<String> = history.snapshot().into_iter().map(|r| r.job_id).collect();
        assert_eq!(ids, vec!["second", "third"]);
        assert_eq!(history.latest().map(|r| r.job_id).as_deref(), Some("third"));
    }
}
