// src/host.rs

//! Embedding entry point: a registry over the configured modules directory,
//! the shared services and the log sink every run reports to.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ConfigFile;
use crate::dag::JobResult;
use crate::errors::{JobkitError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::job::run_job;
use crate::registry::{CatalogLoader, JobCatalog, JobDescriptor, ModuleRegistry};
use crate::task::{LogSink, ServiceContainer, TracingLogSink};

pub struct Host {
    config: ConfigFile,
    registry: ModuleRegistry,
    sink: Arc<dyn LogSink>,
    discovered: AtomicBool,
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Host {
    pub fn from_config(config: ConfigFile, catalog: JobCatalog) -> Result<Self> {
        Self::with_filesystem(config, catalog, Arc::new(RealFileSystem))
    }

    pub fn with_filesystem(
        config: ConfigFile,
        catalog: JobCatalog,
        fs: Arc<dyn FileSystem>,
    ) -> Result<Self> {
        let loader = Arc::new(CatalogLoader::new(Arc::clone(&fs), catalog));
        let registry = ModuleRegistry::new(
            &config.registry().options(),
            fs,
            loader,
            Arc::new(ServiceContainer::new()),
        )?;
        Ok(Self {
            config,
            registry,
            sink: Arc::new(TracingLogSink),
            discovered: AtomicBool::new(false),
        })
    }

    /// Route job and task log records to `sink` instead of `tracing`.
    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn services(&self) -> &Arc<ServiceContainer> {
        self.registry.services()
    }

    /// Scan the configured modules directory.
    pub fn discover(&self) -> Result<usize> {
        let registered = self.registry.discover(&self.config.registry().modules_dir)?;
        self.discovered.store(true, Ordering::Release);
        Ok(registered)
    }

    /// Descriptors of every available job, discovering on first use.
    pub fn available_jobs(&self) -> Result<Vec<JobDescriptor>> {
        self.ensure_discovered()?;
        Ok(self.registry.available_jobs())
    }

    /// Load `job_type` if needed, apply its configured table and run it once.
    pub async fn run(&self, job_type: &str, cancel: &CancellationToken) -> Result<JobResult> {
        if !self.registry.has_job(job_type) {
            self.ensure_discovered()?;
        }
        if !self.registry.has_job(job_type) {
            return Err(JobkitError::JobNotFound(job_type.to_string()));
        }

        let job = self.registry.get_job(job_type)?;
        job.info().set_configuration(self.config.job_config(job_type));
        debug!(job_type = %job_type, "dispatching job run");

        run_job(
            job.as_ref(),
            Arc::clone(self.registry.services()),
            Arc::clone(&self.sink),
            cancel,
        )
        .await
    }

    fn ensure_discovered(&self) -> Result<()> {
        if self.discovered.load(Ordering::Acquire) {
            return Ok(());
        }
        self.discover().map(|_| ())
    }
}
