// src/registry/mod.rs

//! Discovery and lazy loading of job modules.
//!
//! - [`manifest`]: the metadata block embedded in module binaries.
//! - [`descriptor`]: what discovery records about each job.
//! - [`loader`]: the job catalog and the loader that instantiates from it.
//! - [`registry`]: the registry tying discovery and loading together.

pub mod descriptor;
pub mod loader;
pub mod manifest;
#[allow(clippy::module_inception)]
pub mod registry;

pub use descriptor::JobDescriptor;
pub use loader::{CatalogLoader, JobCatalog, JobFactory, ModuleLoader};
pub use manifest::{ManifestJob, ModuleManifest};
pub use registry::{Lifecycle, ModuleRegistry, RegistryOptions};
