// src/job/info.rs

use std::sync::RwLock;

use ulid::Ulid;

use crate::job::ExecutionHistory;
use crate::types::JobState;

/// Identity, lifecycle state and configuration of a job instance.
#[derive(Debug)]
pub struct JobInfo {
    id: Ulid,
    name: String,
    job_type: String,
    version: String,
    state: RwLock<JobState>,
    configuration: RwLock<toml::Table>,
    history: ExecutionHistory,
}

impl JobInfo {
    /// New job info in the `Inactive` state.
    pub fn new(job_type: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: Ulid::new(),
            name: name.into(),
            job_type: job_type.into(),
            version: version.into(),
            state: RwLock::new(JobState::Inactive),
            configuration: RwLock::new(toml::Table::new()),
            history: ExecutionHistory::default(),
        }
    }

    pub fn id(&self) -> Ulid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn job_type(&self) -> &str {
        &self.job_type
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn state(&self) -> JobState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_state(&self, state: JobState) {
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Opaque configuration payload handed to every run.
    pub fn configuration(&self) -> toml::Table {
        self.configuration
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set_configuration(&self, configuration: toml::Table) {
        *self.configuration.write().unwrap_or_else(|e| e.into_inner()) = configuration;
    }

    pub fn history(&self) -> &ExecutionHistory {
        &self.history
    }
}
