// src/registry/registry.rs

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tracing::{debug, info, warn};

use crate::errors::{JobkitError, Result};
use crate::fs::{FileSystem, RealFileSystem, walk_files};
use crate::job::Job;
use crate::registry::descriptor::{JobDescriptor, fingerprint};
use crate::registry::loader::{CatalogLoader, JobCatalog, ModuleLoader};
use crate::registry::manifest;
use crate::task::ServiceContainer;
use crate::types::JobState;

/// File names never treated as job modules: the runtime, this crate and the
/// shared libraries every module links against.
pub const SHARED_LIBRARY_DENYLIST: &[&str] = &[
    "libstd-*",
    "libcore-*",
    "liballoc-*",
    "libtest-*",
    "libproc_macro-*",
    "libjobkit*",
    "jobkit*",
    "libtokio*",
    "libserde*",
    "libtracing*",
    "libanyhow*",
];

pub const DEFAULT_EXTENSIONS: &[&str] = &["so", "dylib", "dll"];

/// Discovery settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryOptions {
    /// File extensions (without the dot) of module candidates.
    pub extensions: Vec<String>,
    /// Extra globs, relative to the discovery root, to skip.
    pub exclude: Vec<String>,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            exclude: Vec::new(),
        }
    }
}

/// Where a job type stands in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Undiscovered,
    Discovered,
    Loaded,
}

type JobSlot = Arc<Mutex<Option<Arc<dyn Job>>>>;

/// Catalog of discoverable jobs with lazy, cached instantiation.
///
/// [`discover`](Self::discover) only reads the metadata block of each
/// candidate binary. Nothing is constructed until [`get_job`](Self::get_job)
/// asks for a job type, and each type is constructed at most once; later
/// calls return the same instance.
pub struct ModuleRegistry {
    fs: Arc<dyn FileSystem>,
    loader: Arc<dyn ModuleLoader>,
    services: Arc<ServiceContainer>,
    candidates: GlobSet,
    denylist: GlobSet,
    excluded: GlobSet,
    descriptors: RwLock<BTreeMap<String, JobDescriptor>>,
    slots: Mutex<HashMap<String, JobSlot>>,
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let descriptors = self.descriptors.read().unwrap_or_else(|e| e.into_inner());
        f.debug_struct("ModuleRegistry")
            .field("loader", &self.loader)
            .field("job_types", &descriptors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ModuleRegistry {
    pub fn new(
        options: &RegistryOptions,
        fs: Arc<dyn FileSystem>,
        loader: Arc<dyn ModuleLoader>,
        services: Arc<ServiceContainer>,
    ) -> Result<Self> {
        let extension_globs: Vec<String> = options
            .extensions
            .iter()
            .map(|ext| format!("*.{}", ext.trim_start_matches('.')))
            .collect();
        let denylist: Vec<String> = SHARED_LIBRARY_DENYLIST.iter().map(|s| s.to_string()).collect();

        Ok(Self {
            fs,
            loader,
            services,
            candidates: build_globset(&extension_globs, true)?,
            denylist: build_globset(&denylist, false)?,
            excluded: build_globset(&options.exclude, false)?,
            descriptors: RwLock::new(BTreeMap::new()),
            slots: Mutex::new(HashMap::new()),
        })
    }

    /// Registry over the real filesystem, loading through `catalog`.
    pub fn with_catalog(options: &RegistryOptions, catalog: JobCatalog) -> Result<Self> {
        let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
        let loader = Arc::new(CatalogLoader::new(Arc::clone(&fs), catalog));
        Self::new(options, fs, loader, Arc::new(ServiceContainer::new()))
    }

    pub fn services(&self) -> &Arc<ServiceContainer> {
        &self.services
    }

    /// Scan `root` recursively and register every job found.
    ///
    /// Returns how many job types were newly registered. Candidates that
    /// cannot be read or carry a broken manifest are logged and skipped; a
    /// job type that is already registered keeps its first descriptor.
    pub fn discover(&self, root: &Path) -> Result<usize> {
        if !self.fs.is_dir(root) {
            return Err(JobkitError::IoError(io::Error::new(
                io::ErrorKind::NotFound,
                format!("module directory {:?} does not exist", root),
            )));
        }

        let mut registered = 0;
        let mut scanned = 0;
        for path in walk_files(self.fs.as_ref(), root)? {
            if !self.is_candidate(root, &path) {
                continue;
            }
            scanned += 1;

            let found = match self.scan_candidate(&path) {
                Ok(found) => found,
                Err(err) => {
                    warn!(path = ?path, error = %err, "skipping module candidate");
                    continue;
                }
            };

            let mut descriptors = self.descriptors.write().unwrap_or_else(|e| e.into_inner());
            for descriptor in found {
                if let Some(existing) = descriptors.get(&descriptor.job_type) {
                    debug!(
                        job_type = %descriptor.job_type,
                        kept = ?existing.binary_path,
                        ignored = ?descriptor.binary_path,
                        "job type already registered"
                    );
                    continue;
                }
                debug!(
                    job_type = %descriptor.job_type,
                    module = %descriptor.module_name,
                    "discovered job"
                );
                descriptors.insert(descriptor.job_type.clone(), descriptor);
                registered += 1;
            }
        }

        info!(root = ?root, scanned, registered, "module discovery finished");
        Ok(registered)
    }

    fn is_candidate(&self, root: &Path, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if !self.candidates.is_match(name) {
            return false;
        }
        if self.denylist.is_match(name) {
            debug!(path = ?path, "skipping shared library");
            return false;
        }
        let rel = path.strip_prefix(root).unwrap_or(path);
        let rel = rel.to_string_lossy().replace('\\', "/");
        if self.excluded.is_match(&rel) {
            debug!(path = ?path, "skipping excluded candidate");
            return false;
        }
        true
    }

    fn scan_candidate(&self, path: &Path) -> Result<Vec<JobDescriptor>> {
        let bytes = self.fs.read(path)?;
        let Some(manifest) = manifest::scan(&bytes)? else {
            debug!(path = ?path, "no job manifest");
            return Ok(Vec::new());
        };

        let digest = fingerprint(&bytes);
        let now = Utc::now();
        Ok(manifest
            .jobs
            .iter()
            .map(|job| JobDescriptor::from_manifest(&manifest, job, path, &digest, now))
            .collect())
    }

    /// All registered descriptors, ordered by job type.
    pub fn available_jobs(&self) -> Vec<JobDescriptor> {
        self.descriptors
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    pub fn has_job(&self, job_type: &str) -> bool {
        self.descriptors
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(job_type)
    }

    pub fn descriptor(&self, job_type: &str) -> Option<JobDescriptor> {
        self.descriptors
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(job_type)
            .cloned()
    }

    /// The job instance for `job_type`, loading it on first use.
    ///
    /// Concurrent callers for the same type wait for a single load. A failed
    /// load is not cached; the next call tries again.
    pub fn get_job(&self, job_type: &str) -> Result<Arc<dyn Job>> {
        let descriptor = self
            .descriptor(job_type)
            .ok_or_else(|| JobkitError::JobNotFound(job_type.to_string()))?;

        let slot = self.slot(job_type);
        let mut cached = slot.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(job) = cached.as_ref() {
            return Ok(Arc::clone(job));
        }

        debug!(job_type = %job_type, path = ?descriptor.binary_path, "loading job");
        let job = self.loader.load(&descriptor)?;
        job.register_services(&self.services)?;
        job.info().set_state(JobState::Active);
        *cached = Some(Arc::clone(&job));

        info!(
            job_type = %job_type,
            module = %descriptor.module_name,
            version = %descriptor.version,
            "job loaded"
        );
        Ok(job)
    }

    pub fn lifecycle(&self, job_type: &str) -> Lifecycle {
        let slot = self
            .slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(job_type)
            .cloned();
        if let Some(slot) = slot {
            if slot.lock().unwrap_or_else(|e| e.into_inner()).is_some() {
                return Lifecycle::Loaded;
            }
        }
        if self.has_job(job_type) {
            Lifecycle::Discovered
        } else {
            Lifecycle::Undiscovered
        }
    }

    pub fn is_loaded(&self, job_type: &str) -> bool {
        self.lifecycle(job_type) == Lifecycle::Loaded
    }

    fn slot(&self, job_type: &str) -> JobSlot {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(slots.entry(job_type.to_string()).or_default())
    }
}

fn build_globset(patterns: &[String], case_insensitive: bool) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .literal_separator(true)
            .build()
            .map_err(|e| JobkitError::ConfigError(format!("invalid glob pattern '{pattern}': {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| JobkitError::ConfigError(format!("building glob set: {e}")))
}
