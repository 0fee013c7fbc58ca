// src/lib.rs

//! Job execution SDK.
//!
//! Jobs declare their tasks (stage, concurrency, criticality, dependencies)
//! in a [`TaskGraph`](dag::TaskGraph); the [`TaskGraphScheduler`](dag::TaskGraphScheduler)
//! runs them and folds the outcome into a [`JobResult`](dag::JobResult). The
//! [`ModuleRegistry`](registry::ModuleRegistry) discovers job modules from
//! their embedded metadata and instantiates each job type lazily, once.

pub mod cli;
pub mod config;
pub mod dag;
pub mod errors;
pub mod fs;
pub mod host;
pub mod job;
pub mod logging;
pub mod registry;
pub mod task;
pub mod types;

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Result, bail};
use chrono::Utc;
use tracing::debug;

use crate::cli::{CliArgs, Command};
use crate::config::load_or_default;
use crate::fs::{FileSystem, RealFileSystem};
use crate::host::Host;
use crate::registry::descriptor::fingerprint;
use crate::registry::{JobCatalog, JobDescriptor, ModuleManifest, manifest};

/// High-level entry point used by `main.rs`.
///
/// The command-line host links no job implementations, so it only works
/// with metadata: listing what discovery finds and inspecting single
/// binaries. Running jobs is done by applications embedding [`Host`].
pub async fn run(args: CliArgs) -> Result<()> {
    match args.command {
        Command::List { json } => {
            let cfg = load_or_default(&RealFileSystem, &args.config)?;
            debug!(modules_dir = ?cfg.registry().modules_dir, "listing jobs");
            let host = Host::from_config(cfg, JobCatalog::new())?;
            let jobs = host.available_jobs()?;
            print!("{}", render_descriptors(&jobs, json)?);
        }
        Command::Inspect { path } => {
            let bytes = RealFileSystem.read(&path)?;
            let Some(manifest) = manifest::scan(&bytes)? else {
                bail!("{:?} carries no job manifest", path);
            };
            print!("{}", render_manifest(&path, &manifest, &fingerprint(&bytes)));
        }
    }
    Ok(())
}

/// Text (or pretty JSON) listing of `jobs`.
pub fn render_descriptors(jobs: &[JobDescriptor], json: bool) -> Result<String> {
    if json {
        let mut out = serde_json::to_string_pretty(jobs)?;
        out.push('\n');
        return Ok(out);
    }

    let mut out = String::new();
    writeln!(out, "jobs ({}):", jobs.len())?;
    for job in jobs {
        writeln!(out, "  - {} ({}) v{}", job.job_type, job.display_name, job.version)?;
        writeln!(out, "      module: {} at {}", job.module_name, job.binary_path.display())?;
        writeln!(out, "      implementation: {}", job.implementation)?;
        if !job.description.is_empty() {
            writeln!(out, "      description: {}", job.description)?;
        }
        if !job.requires.is_empty() {
            writeln!(out, "      requires: {:?}", job.requires)?;
        }
    }
    Ok(out)
}

/// Human-readable dump of a module manifest, with descriptor defaults applied.
pub fn render_manifest(path: &Path, manifest: &ModuleManifest, digest: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "module: {}", manifest.module);
    let _ = writeln!(out, "  path: {}", path.display());
    let _ = writeln!(out, "  blake3: {digest}");
    if !manifest.requires.is_empty() {
        let _ = writeln!(out, "  requires: {:?}", manifest.requires);
    }
    let _ = writeln!(out, "  jobs ({}):", manifest.jobs.len());
    let now = Utc::now();
    for job in &manifest.jobs {
        let d = JobDescriptor::from_manifest(manifest, job, path, digest, now);
        let _ = writeln!(out, "    - {} ({}) v{}", d.job_type, d.display_name, d.version);
        let _ = writeln!(out, "        implementation: {}", d.implementation);
    }
    out
}
