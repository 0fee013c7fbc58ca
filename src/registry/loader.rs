// src/registry/loader.rs

//! Turning a [`JobDescriptor`] into a live job instance.
//!
//! Job implementations are linked into the host and registered by their
//! fully-qualified implementation name in a [`JobCatalog`]. The module binary
//! found on disk decides *which* implementations are available and what they
//! need next to them; the catalog supplies the constructor.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::errors::{JobkitError, Result};
use crate::fs::FileSystem;
use crate::job::Job;
use crate::registry::descriptor::{JobDescriptor, fingerprint};
use crate::registry::manifest;

/// Parameterless constructor of one job implementation.
pub type JobFactory = Arc<dyn Fn() -> Arc<dyn Job> + Send + Sync>;

/// Implementations linked into this host, keyed by implementation name.
#[derive(Clone, Default)]
pub struct JobCatalog {
    factories: BTreeMap<String, JobFactory>,
}

impl fmt::Debug for JobCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobCatalog")
            .field("implementations", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl JobCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under `implementation`, constructed with `T::default()`.
    pub fn register<T>(&mut self, implementation: impl Into<String>) -> &mut Self
    where
        T: Job + Default + 'static,
    {
        self.register_with(implementation, || Arc::new(T::default()) as Arc<dyn Job>)
    }

    pub fn register_with<F>(&mut self, implementation: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Arc<dyn Job> + Send + Sync + 'static,
    {
        let implementation = implementation.into();
        if self
            .factories
            .insert(implementation.clone(), Arc::new(factory))
            .is_some()
        {
            debug!(%implementation, "replacing catalog entry");
        }
        self
    }

    pub fn contains(&self, implementation: &str) -> bool {
        self.factories.contains_key(implementation)
    }

    pub fn implementations(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    fn instantiate(&self, implementation: &str) -> Option<Arc<dyn Job>> {
        self.factories.get(implementation).map(|factory| factory())
    }
}

/// Strategy that produces a job instance for a discovered descriptor.
pub trait ModuleLoader: Send + Sync + fmt::Debug {
    fn load(&self, descriptor: &JobDescriptor) -> Result<Arc<dyn Job>>;
}

/// Default loader: validates the module on disk, then constructs the
/// implementation from the [`JobCatalog`].
#[derive(Debug, Clone)]
pub struct CatalogLoader {
    fs: Arc<dyn FileSystem>,
    catalog: JobCatalog,
}

impl CatalogLoader {
    pub fn new(fs: Arc<dyn FileSystem>, catalog: JobCatalog) -> Self {
        Self { fs, catalog }
    }

    pub fn catalog(&self) -> &JobCatalog {
        &self.catalog
    }

    fn check_requirements(&self, descriptor: &JobDescriptor, requires: &[String]) -> Result<()> {
        let dir = descriptor.binary_path.parent().unwrap_or(Path::new("."));
        for requirement in requires {
            let path = dir.join(requirement);
            if !self.fs.is_file(&path) {
                return Err(JobkitError::LoadError(format!(
                    "module '{}' requires '{}', which was not found at {:?}",
                    descriptor.module_name, requirement, path
                )));
            }
        }
        Ok(())
    }
}

impl ModuleLoader for CatalogLoader {
    fn load(&self, descriptor: &JobDescriptor) -> Result<Arc<dyn Job>> {
        let path = &descriptor.binary_path;
        let bytes = self.fs.read(path).map_err(|e| {
            JobkitError::LoadError(format!("reading module binary {:?}: {e:#}", path))
        })?;

        let Some(manifest) = manifest::scan(&bytes)? else {
            return Err(JobkitError::LoadError(format!(
                "module binary {:?} no longer carries a manifest",
                path
            )));
        };
        if !manifest
            .jobs
            .iter()
            .any(|j| j.implementation == descriptor.implementation)
        {
            return Err(JobkitError::LoadError(format!(
                "module '{}' no longer exports '{}'",
                manifest.module, descriptor.implementation
            )));
        }

        if fingerprint(&bytes) != descriptor.fingerprint {
            warn!(
                job_type = %descriptor.job_type,
                path = ?path,
                "module binary changed since discovery"
            );
        }

        self.check_requirements(descriptor, &manifest.requires)?;

        let job = self
            .catalog
            .instantiate(&descriptor.implementation)
            .ok_or_else(|| {
                JobkitError::LoadError(format!(
                    "implementation '{}' of job type '{}' is not linked into this host",
                    descriptor.implementation, descriptor.job_type
                ))
            })?;

        if job.info().job_type() != descriptor.job_type {
            debug!(
                descriptor = %descriptor.job_type,
                instance = %job.info().job_type(),
                "job instance reports a different job type than its descriptor"
            );
        }
        Ok(job)
    }
}
