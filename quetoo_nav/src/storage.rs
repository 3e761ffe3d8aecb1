// File access for `.nav` persistence.
//
// The engine exposes its own virtual filesystem (search paths, pak files,
// a writable user directory). The graph only needs whole-file reads and
// writes, so `NavStorage` is deliberately narrow. `DirStorage` maps paths
// onto a real directory; `MemoryStorage` keeps files in a `BTreeMap` for
// tests and tools.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Whole-file access relative to the game's data directory.
pub trait NavStorage {
    fn exists(&self, path: &str) -> bool;
    fn read(&self, path: &str) -> io::Result<Vec<u8>>;
    /// Replace the file's contents. Parent directories are created as needed.
    fn write(&self, path: &str, bytes: &[u8]) -> io::Result<()>;
}

/// Storage rooted at a directory on disk.
#[derive(Clone, Debug)]
pub struct DirStorage {
    root: PathBuf,
}

impl DirStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl NavStorage for DirStorage {
    fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_file()
    }

    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        fs::read(self.resolve(path))
    }

    fn write(&self, path: &str, bytes: &[u8]) -> io::Result<()> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        // Write next to the target and rename so readers never observe a
        // half-written file.
        let tmp = full.with_extension("nav.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &full)
    }
}

/// In-memory storage. Interior mutability keeps the trait `&self`.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: RefCell<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file, e.g. a hand-crafted corrupt `.nav` in a test.
    pub fn insert(&self, path: &str, bytes: Vec<u8>) {
        self.files.borrow_mut().insert(path.to_string(), bytes);
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.files.borrow().get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.files.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.borrow().is_empty()
    }
}

impl NavStorage for MemoryStorage {
    fn exists(&self, path: &str) -> bool {
        self.files.borrow().contains_key(path)
    }

    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        self.get(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{path} not found")))
    }

    fn write(&self, path: &str, bytes: &[u8]) -> io::Result<()> {
        self.insert(path, bytes.to_vec());
        Ok(())
    }
}
