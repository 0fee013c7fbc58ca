use std::path::{Path, PathBuf};

use jobkit::registry::manifest::{ManifestJob, ModuleManifest, encode};

/// Builder for fake module binaries carrying an embedded job manifest.
#[derive(Debug, Clone)]
pub struct ModuleFixture {
    manifest: ModuleManifest,
}

impl ModuleFixture {
    pub fn new(module: &str) -> Self {
        Self {
            manifest: ModuleManifest {
                module: module.to_string(),
                requires: Vec::new(),
                jobs: Vec::new(),
            },
        }
    }

    pub fn job(self, implementation: &str) -> Self {
        self.job_entry(ManifestJob::new(implementation))
    }

    pub fn job_entry(mut self, job: ManifestJob) -> Self {
        self.manifest.jobs.push(job);
        self
    }

    pub fn requires(mut self, library: &str) -> Self {
        self.manifest.requires.push(library.to_string());
        self
    }

    pub fn manifest(&self) -> &ModuleManifest {
        &self.manifest
    }

    /// Binary bytes: a fake object header, the manifest, then trailing data.
    pub fn bytes(&self) -> Vec<u8> {
        let mut bytes = b"\x7fELF\x02\x01\x01\0\0\0\0\0\0\0\0\0".to_vec();
        bytes.extend(encode(&self.manifest).expect("fixture manifest encodes"));
        bytes.extend_from_slice(b"\0.text\0.data\0");
        bytes
    }

    pub fn write_to(&self, dir: &Path, file_name: &str) -> PathBuf {
        write_file(dir, file_name, &self.bytes())
    }
}

/// A library without any job manifest.
pub fn write_plain_library(dir: &Path, file_name: &str) -> PathBuf {
    write_file(dir, file_name, b"\x7fELF\x02\x01\x01\0 plain shared object")
}

fn write_file(dir: &Path, file_name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(file_name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create fixture dir");
    }
    std::fs::write(&path, bytes).expect("write fixture module");
    path
}
