//! Dictionary stores.

use crate::dictionary::{Dictionary, DictionaryStore, FrameDictionary};
use crate::error::CoreResult;
use ftlog_storage::{FileBackend, InMemoryBackend};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Dictionaries stored as files under a data directory. An `iname` is a
/// path relative to that directory.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Creates a store rooted at `root`, creating the directory if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(root: &Path) -> CoreResult<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Returns the data directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path of `iname`.
    #[must_use]
    pub fn path_of(&self, iname: &str) -> PathBuf {
        self.root.join(iname)
    }
}

impl DictionaryStore for DirectoryStore {
    fn open(&mut self, iname: &str, must_create: bool) -> CoreResult<Option<Box<dyn Dictionary>>> {
        let path = self.path_of(iname);
        let backend = if must_create {
            self.remove(iname)?;
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            debug!(file = %path.display(), "creating dictionary");
            FileBackend::create_new(&path)?
        } else if path.is_file() {
            FileBackend::open_existing(&path)?
        } else {
            return Ok(None);
        };
        Ok(Some(Box::new(FrameDictionary::open(iname, backend)?)))
    }

    fn exists(&self, iname: &str) -> bool {
        self.path_of(iname).is_file()
    }

    fn remove(&mut self, iname: &str) -> CoreResult<bool> {
        match fs::remove_file(self.path_of(iname)) {
            Ok(()) => {
                debug!(iname, "removed dictionary");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Dictionaries kept in memory. Reopening a name sees what was written
/// through earlier handles.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: HashMap<String, InMemoryBackend>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the stored dictionaries, sorted.
    #[must_use]
    pub fn inames(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files.keys().cloned().collect();
        names.sort();
        names
    }

    /// Opens `iname` as a concrete frame dictionary, for inspection.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored bytes are not a dictionary.
    pub fn open_frame(&self, iname: &str) -> CoreResult<Option<FrameDictionary<InMemoryBackend>>> {
        match self.files.get(iname) {
            Some(backend) => Ok(Some(FrameDictionary::open(iname, backend.share())?)),
            None => Ok(None),
        }
    }
}

impl DictionaryStore for MemoryStore {
    fn open(&mut self, iname: &str, must_create: bool) -> CoreResult<Option<Box<dyn Dictionary>>> {
        let backend = if must_create {
            let backend = InMemoryBackend::new();
            self.files.insert(iname.to_string(), backend.share());
            backend
        } else {
            match self.files.get(iname) {
                Some(backend) => backend.share(),
                None => return Ok(None),
            }
        };
        Ok(Some(Box::new(FrameDictionary::open(iname, backend)?)))
    }

    fn exists(&self, iname: &str) -> bool {
        self.files.contains_key(iname)
    }

    fn remove(&mut self, iname: &str) -> CoreResult<bool> {
        Ok(self.files.remove(iname).is_some())
    }
}
