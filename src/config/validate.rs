// src/config/validate.rs

use globset::Glob;

use crate::config::model::{ConfigFile, RawConfigFile, RegistrySection};
use crate::errors::{JobkitError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = JobkitError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_registry(&raw.registry)?;
        validate_job_tables(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.registry, raw.job))
    }
}

fn validate_registry(registry: &RegistrySection) -> Result<()> {
    if registry.modules_dir.as_os_str().is_empty() {
        return Err(JobkitError::ConfigError(
            "[registry].modules_dir must not be empty".to_string(),
        ));
    }

    if registry.extensions.is_empty() {
        return Err(JobkitError::ConfigError(
            "[registry].extensions must list at least one extension".to_string(),
        ));
    }
    for ext in &registry.extensions {
        if ext.trim().is_empty() {
            return Err(JobkitError::ConfigError(
                "[registry].extensions contains an empty entry".to_string(),
            ));
        }
        if ext.starts_with('.') {
            return Err(JobkitError::ConfigError(format!(
                "[registry].extensions entry '{ext}' must not start with a dot"
            )));
        }
    }

    for pattern in &registry.exclude {
        Glob::new(pattern).map_err(|e| {
            JobkitError::ConfigError(format!(
                "[registry].exclude has invalid glob '{pattern}': {e}"
            ))
        })?;
    }
    Ok(())
}

fn validate_job_tables(raw: &RawConfigFile) -> Result<()> {
    if let Some(name) = raw.job.keys().find(|name| name.trim().is_empty()) {
        return Err(JobkitError::ConfigError(format!(
            "[job.\"{name}\"] needs a non-empty job type"
        )));
    }
    Ok(())
}
