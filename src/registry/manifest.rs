// src/registry/manifest.rs

//! Metadata block embedded in job module binaries.
//!
//! A module binary carries a TOML document framed by [`MANIFEST_START`] and
//! [`MANIFEST_END`] somewhere in its bytes (typically a `static` byte array
//! in the module's data section). Discovery reads only this block, so a
//! binary can be catalogued without being loaded and without its `requires`
//! being present.
//!
//! ```toml
//! module = "reports"
//! requires = ["libreport_support.so"]
//!
//! [[job]]
//! implementation = "reports::jobs::NightlyReportJob"
//! description = "Builds the nightly report"
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::{JobkitError, Result};

pub const MANIFEST_START: &[u8] = b"\0JOBKIT:MANIFEST\0";
pub const MANIFEST_END: &[u8] = b"\0JOBKIT:END\0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleManifest {
    /// Logical module name.
    pub module: String,
    /// Library files, relative to the module binary, needed to load it.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
    #[serde(default, rename = "job", skip_serializing_if = "Vec::is_empty")]
    pub jobs: Vec<ManifestJob>,
}

/// One job implementation exported by a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestJob {
    /// Fully-qualified implementation name, looked up in the job catalog.
    pub implementation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ManifestJob {
    pub fn new(implementation: impl Into<String>) -> Self {
        Self {
            implementation: implementation.into(),
            job_type: None,
            name: None,
            description: None,
            version: None,
        }
    }
}

/// Serialize `manifest` into a framed block ready to embed in a binary.
pub fn encode(manifest: &ModuleManifest) -> Result<Vec<u8>> {
    let body = toml::to_string(manifest)
        .map_err(|e| JobkitError::ManifestError(format!("serializing manifest: {e}")))?;

    let mut out = Vec::with_capacity(MANIFEST_START.len() + body.len() + MANIFEST_END.len());
    out.extend_from_slice(MANIFEST_START);
    out.extend_from_slice(body.as_bytes());
    out.extend_from_slice(MANIFEST_END);
    Ok(out)
}

/// Find and parse the manifest block in `bytes`.
///
/// `Ok(None)` means the binary carries no manifest at all. A block that is
/// unterminated, not UTF-8, not valid TOML, or missing required names is a
/// [`JobkitError::ManifestError`].
pub fn scan(bytes: &[u8]) -> Result<Option<ModuleManifest>> {
    let Some(start) = find(bytes, MANIFEST_START) else {
        return Ok(None);
    };
    let body_start = start + MANIFEST_START.len();
    let Some(len) = find(&bytes[body_start..], MANIFEST_END) else {
        return Err(JobkitError::ManifestError(
            "manifest block is not terminated".to_string(),
        ));
    };

    let body = std::str::from_utf8(&bytes[body_start..body_start + len])
        .map_err(|e| JobkitError::ManifestError(format!("manifest is not UTF-8: {e}")))?;
    let manifest: ModuleManifest = toml::from_str(body)
        .map_err(|e| JobkitError::ManifestError(format!("manifest is not valid TOML: {e}")))?;

    if manifest.module.trim().is_empty() {
        return Err(JobkitError::ManifestError(
            "manifest has an empty module name".to_string(),
        ));
    }
    if let Some(job) = manifest.jobs.iter().find(|j| j.implementation.trim().is_empty()) {
        return Err(JobkitError::ManifestError(format!(
            "module '{}' declares a job without an implementation name{}",
            manifest.module,
            job.job_type
                .as_deref()
                .map(|t| format!(" (job type '{t}')"))
                .unwrap_or_default()
        )));
    }

    Ok(Some(manifest))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> ModuleManifest {
        ModuleManifest {
            module: "reports".to_string(),
            requires: vec!["libreport_support.so".to_string()],
            jobs: vec![ManifestJob {
                description: Some("Builds the nightly report".to_string()),
                ..ManifestJob::new("reports::jobs::NightlyReportJob")
            }],
        }
    }

    #[test]
    fn scan_finds_block_inside_surrounding_bytes() {
        let mut binary = b"\x7fELF\x02\x01\x01 some code".to_vec();
        binary.extend(encode(&manifest()).unwrap());
        binary.extend_from_slice(b"\0\0trailing symbols");

        assert_eq!(scan(&binary).unwrap(), Some(manifest()));
    }

    #[test]
    fn binary_without_block_has_no_manifest() {
        assert_eq!(scan(b"\x7fELF plain library").unwrap(), None);
        assert_eq!(scan(b"").unwrap(), None);
    }

    #[test]
    fn malformed_blocks_are_manifest_errors() {
        let mut unterminated = MANIFEST_START.to_vec();
        unterminated.extend_from_slice(b"module = \"x\"");
        assert!(matches!(scan(&unterminated), Err(JobkitError::ManifestError(m)) if m.contains("terminated")));

        let mut bad_toml = MANIFEST_START.to_vec();
        bad_toml.extend_from_slice(b"module = ");
        bad_toml.extend_from_slice(MANIFEST_END);
        assert!(matches!(scan(&bad_toml), Err(JobkitError::ManifestError(_))));

        let mut no_impl = MANIFEST_START.to_vec();
        no_impl.extend_from_slice(b"module = \"x\"\n[[job]]\nimplementation = \"\"\njob_type = \"t\"\n");
        no_impl.extend_from_slice(MANIFEST_END);
        assert!(matches!(scan(&no_impl), Err(JobkitError::ManifestError(m)) if m.contains("'t'")));
    }
}
