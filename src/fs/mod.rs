// src/fs/mod.rs

//! Filesystem access used by module discovery, module loading and the
//! configuration loader. Tests swap in [`mock::MockFileSystem`].

use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

pub mod mock;

pub trait FileSystem: Send + Sync + Debug {
    fn read(&self, path: &Path) -> Result<Vec<u8>>;
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn exists(&self, path: &Path) -> bool;
    fn is_file(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;

    /// Full paths of the entries directly inside `path`, sorted.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
}

/// `std::fs` backed implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).with_context(|| format!("reading file {:?}", path))
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("reading file {:?}", path))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).with_context(|| format!("reading dir {:?}", path))? {
            entries.push(entry?.path());
        }
        entries.sort();
        Ok(entries)
    }
}

/// Every file below `root`, depth first, in sorted order.
///
/// Only a failure to list `root` itself is an error. Subdirectories that
/// cannot be listed are logged and skipped.
pub fn walk_files(fs: &dyn FileSystem, root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = Vec::new();
    let mut listing = fs.read_dir(root)?;
    loop {
        let mut subdirs = Vec::new();
        for entry in listing {
            if fs.is_dir(&entry) {
                subdirs.push(entry);
            } else if fs.is_file(&entry) {
                files.push(entry);
            }
        }
        pending.extend(subdirs.into_iter().rev());

        let Some(dir) = pending.pop() else { break };
        listing = match fs.read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(dir = ?dir, error = %err, "skipping unreadable directory");
                Vec::new()
            }
        };
    }
    files.sort();
    Ok(files)
}
