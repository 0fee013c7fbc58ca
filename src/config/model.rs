// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::registry::RegistryOptions;

/// Configuration as read from TOML, before validation.
///
/// ```toml
/// [registry]
/// modules_dir = "modules"
/// extensions = ["so", "dylib", "dll"]
/// exclude = ["**/deps/**"]
///
/// [job.NightlyReportJob]
/// recipients = ["ops@example.com"]
/// ```
///
/// Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub registry: RegistrySection,

    /// Opaque per-job configuration, keyed by job type.
    #[serde(default)]
    pub job: BTreeMap<String, toml::Table>,
}

/// `[registry]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistrySection {
    /// Directory scanned for module binaries, relative to the config file.
    #[serde(default = "default_modules_dir")]
    pub modules_dir: PathBuf,

    /// Candidate file extensions, without the leading dot.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Extra globs (relative to `modules_dir`) never scanned.
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_modules_dir() -> PathBuf {
    PathBuf::from("modules")
}

fn default_extensions() -> Vec<String> {
    RegistryOptions::default().extensions
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            modules_dir: default_modules_dir(),
            extensions: default_extensions(),
            exclude: Vec::new(),
        }
    }
}

impl RegistrySection {
    pub fn options(&self) -> RegistryOptions {
        RegistryOptions {
            extensions: self.extensions.clone(),
            exclude: self.exclude.clone(),
        }
    }
}

/// Validated host configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>`, so holders know the
/// registry settings are usable.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    registry: RegistrySection,
    jobs: BTreeMap<String, toml::Table>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(registry: RegistrySection, jobs: BTreeMap<String, toml::Table>) -> Self {
        Self { registry, jobs }
    }

    pub fn registry(&self) -> &RegistrySection {
        &self.registry
    }

    /// Configuration table for `job_type`, empty when none is configured.
    pub fn job_config(&self, job_type: &str) -> toml::Table {
        self.jobs.get(job_type).cloned().unwrap_or_default()
    }

    pub fn configured_jobs(&self) -> impl Iterator<Item = &str> {
        self.jobs.keys().map(String::as_str)
    }

    /// Resolve `modules_dir` against the directory holding the config file.
    pub fn resolve_modules_dir(mut self, base: &std::path::Path) -> Self {
        if self.registry.modules_dir.is_relative() {
            self.registry.modules_dir = base.join(&self.registry.modules_dir);
        }
        self
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(RegistrySection::default(), BTreeMap::new())
    }
}
