use std::sync::{Arc, Mutex};

use jobkit::task::LogSink;
use jobkit::types::Severity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub severity: Severity,
    pub message: String,
    pub error: Option<String>,
}

/// Log sink that keeps every record for later assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingLogSink {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl RecordingLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Messages logged at exactly `severity`, in order.
    pub fn messages_at(&self, severity: Severity) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|r| r.severity == severity)
            .map(|r| r.message)
            .collect()
    }

    pub fn contains(&self, severity: Severity, needle: &str) -> bool {
        self.messages_at(severity).iter().any(|m| m.contains(needle))
    }
}

impl LogSink for RecordingLogSink {
    fn log(&self, severity: Severity, message: &str, error: Option<&anyhow::Error>) {
        self.records.lock().unwrap().push(LogRecord {
            severity,
            message: message.to_string(),
            error: error.map(|e| format!("{e:#}")),
        });
    }
}
