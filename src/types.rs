use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Severity accepted by a [`LogSink`](crate::task::LogSink).
///
/// Ordered from least to most severe, so `Severity::Warning >= Severity::Debug`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Trace,
    Debug,
    Information,
    Warning,
    Error,
    Critical,
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Information
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Trace => "trace",
            Severity::Debug => "debug",
            Severity::Information => "information",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(Severity::Trace),
            "debug" => Ok(Severity::Debug),
            "info" | "information" => Ok(Severity::Information),
            "warn" | "warning" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "critical" | "fatal" => Ok(Severity::Critical),
            other => Err(format!("invalid severity: {other}")),
        }
    }
}

/// Lifecycle state of a loaded job.
///
/// Transitions are driven by the caller: a job is `Processing` while a run is
/// in flight and goes back to `Active` afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Inactive,
    Active,
    Processing,
    Unknown,
}

impl Default for JobState {
    fn default() -> Self {
        JobState::Inactive
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Inactive => "inactive",
            JobState::Active => "active",
            JobState::Processing => "processing",
            JobState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "inactive" => Ok(JobState::Inactive),
            "active" => Ok(JobState::Active),
            "processing" => Ok(JobState::Processing),
            "unknown" => Ok(JobState::Unknown),
            other => Err(format!(
                "invalid job state: {other} (expected inactive, active, processing or unknown)"
            )),
        }
    }
}
