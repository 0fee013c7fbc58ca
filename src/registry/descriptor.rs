// src/registry/descriptor.rs

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;

use crate::registry::manifest::{ManifestJob, ModuleManifest};

pub const DEFAULT_JOB_VERSION: &str = "1.0.0";

static LOWER_UPPER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("static regex"));
static ACRONYM_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z]+)([A-Z][a-z])").expect("static regex"));

/// Metadata about one discoverable job, gathered without loading it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobDescriptor {
    pub job_type: String,
    pub display_name: String,
    pub description: String,
    pub version: String,
    pub binary_path: PathBuf,
    /// Fully-qualified implementation name.
    pub implementation: String,
    pub module_name: String,
    /// Library files the module needs at load time, relative to `binary_path`.
    pub requires: Vec<String>,
    /// blake3 hex digest of the binary when it was discovered.
    pub fingerprint: String,
    pub discovered_at: DateTime<Utc>,
}

impl JobDescriptor {
    /// Build a descriptor for `job`, filling unset fields with defaults.
    pub fn from_manifest(
        manifest: &ModuleManifest,
        job: &ManifestJob,
        binary_path: &Path,
        fingerprint: &str,
        discovered_at: DateTime<Utc>,
    ) -> Self {
        let type_name = type_name(&job.implementation);
        Self {
            job_type: non_blank(job.job_type.as_deref())
                .unwrap_or(type_name)
                .to_string(),
            display_name: non_blank(job.name.as_deref())
                .map(str::to_string)
                .unwrap_or_else(|| humanize(type_name)),
            description: job.description.clone().unwrap_or_default(),
            version: non_blank(job.version.as_deref())
                .unwrap_or(DEFAULT_JOB_VERSION)
                .to_string(),
            binary_path: binary_path.to_path_buf(),
            implementation: job.implementation.clone(),
            module_name: manifest.module.clone(),
            requires: manifest.requires.clone(),
            fingerprint: fingerprint.to_string(),
            discovered_at,
        }
    }
}

/// Content fingerprint of a module binary.
pub fn fingerprint(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Last path segment of a qualified implementation name.
///
/// Accepts both `::` and `.` separators.
pub fn type_name(implementation: &str) -> &str {
    let tail = implementation
        .rsplit("::")
        .next()
        .unwrap_or(implementation);
    tail.rsplit('.').next().unwrap_or(tail)
}

/// Turn a type name into a display name: `NightlyReportJob` becomes
/// `Nightly Report`, `HTTPPollerJob` becomes `HTTP Poller`.
pub fn humanize(type_name: &str) -> String {
    let spaced = ACRONYM_WORD.replace_all(type_name, "$1 $2");
    let spaced = LOWER_UPPER.replace_all(&spaced, "$1 $2");
    let spaced = spaced.replace('_', " ");
    let trimmed = spaced.trim();

    match trimmed.strip_suffix("Job").map(str::trim_end) {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn humanize_splits_words_and_drops_job_suffix() {
        assert_eq!(humanize("NightlyReportJob"), "Nightly Report");
        assert_eq!(humanize("HTTPPollerJob"), "HTTP Poller");
        assert_eq!(humanize("Cleanup"), "Cleanup");
        assert_eq!(humanize("Job"), "Job");
        assert_eq!(humanize("sync_v2Job"), "sync v2");
    }

    #[test]
    fn type_name_takes_last_segment() {
        assert_eq!(type_name("reports::jobs::NightlyReportJob"), "NightlyReportJob");
        assert_eq!(type_name("Reports.Jobs.Nightly"), "Nightly");
        assert_eq!(type_name("Bare"), "Bare");
    }

    #[test]
    fn descriptor_defaults_and_overrides() {
        let manifest = ModuleManifest {
            module: "reports".to_string(),
            requires: Vec::new(),
            jobs: Vec::new(),
        };
        let now = Utc::now();

        let plain = JobDescriptor::from_manifest(
            &manifest,
            &ManifestJob::new("reports::NightlyReportJob"),
            Path::new("/mods/libreports.so"),
            "abc",
            now,
        );
        assert_eq!(plain.job_type, "NightlyReportJob");
        assert_eq!(plain.display_name, "Nightly Report");
        assert_eq!(plain.description, "");
        assert_eq!(plain.version, DEFAULT_JOB_VERSION);
        assert_eq!(plain.module_name, "reports");

        let custom = JobDescriptor::from_manifest(
            &manifest,
            &ManifestJob {
                job_type: Some("nightly".to_string()),
                name: Some("Nightly".to_string()),
                version: Some("2.1.0".to_string()),
                ..ManifestJob::new("reports::NightlyReportJob")
            },
            Path::new("/mods/libreports.so"),
            "abc",
            now,
        );
        assert_eq!(custom.job_type, "nightly");
        assert_eq!(custom.display_name, "Nightly");
        assert_eq!(custom.version, "2.1.0");
    }
}
