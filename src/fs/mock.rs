// src/fs/mock.rs

//! In-memory [`FileSystem`] for tests.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Result, anyhow};

use super::FileSystem;

#[derive(Debug, Clone)]
enum Node {
    File(Vec<u8>),
    Dir(BTreeSet<PathBuf>),
}

/// Shared, cloneable in-memory tree. Parent directories are created
/// implicitly when files are added.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    nodes: Arc<Mutex<BTreeMap<PathBuf, Node>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref().to_path_buf();
        let mut nodes = self.lock();
        Self::link_parent(&mut nodes, &path);
        nodes.insert(path, Node::File(content.into()));
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        let mut nodes = self.lock();
        Self::ensure_dir(&mut nodes, &path);
    }

    pub fn remove_file(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut nodes = self.lock();
        if matches!(nodes.get(path), Some(Node::File(_))) {
            nodes.remove(path);
            if let Some(Node::Dir(children)) = path.parent().and_then(|p| nodes.get_mut(p)) {
                children.remove(path);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<PathBuf, Node>> {
        self.nodes.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn ensure_dir(nodes: &mut BTreeMap<PathBuf, Node>, path: &Path) {
        if nodes.contains_key(path) {
            return;
        }
        Self::link_parent(nodes, path);
        nodes.insert(path.to_path_buf(), Node::Dir(BTreeSet::new()));
    }

    fn link_parent(nodes: &mut BTreeMap<PathBuf, Node>, path: &Path) {
        let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return;
        };
        Self::ensure_dir(nodes, parent);
        if let Some(Node::Dir(children)) = nodes.get_mut(parent) {
            children.insert(path.to_path_buf());
        }
    }

    fn file(&self, path: &Path) -> Result<Vec<u8>> {
        match self.lock().get(path) {
            Some(Node::File(content)) => Ok(content.clone()),
            Some(Node::Dir(_)) => Err(anyhow!("is a directory: {:?}", path)),
            None => Err(anyhow!("file not found: {:?}", path)),
        }
    }
}

impl FileSystem for MockFileSystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.file(path)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        String::from_utf8(self.file(path)?).map_err(|e| anyhow!("invalid UTF-8 in {:?}: {}", path, e))
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock().contains_key(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.lock().get(path), Some(Node::File(_)))
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.lock().get(path), Some(Node::Dir(_)))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        match self.lock().get(path) {
            Some(Node::Dir(children)) => Ok(children.iter().cloned().collect()),
            _ => Err(anyhow!("not a directory or not found: {:?}", path)),
        }
    }
}
