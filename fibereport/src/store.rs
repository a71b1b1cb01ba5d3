//! Key/value persistence backends for named templates.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::fs::ensure_parent_path_exists;
use crate::Error;

/// A minimal string key/value store. The template store only needs these
/// four capabilities, so it can run against memory, a file or anything else
/// that provides them.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error>;

    fn set(&mut self, key: &str, value: String) -> Result<(), Error>;

    /// Removes the value stored under the given key. Removing an absent key
    /// is not an error.
    fn remove(&mut self, key: &str) -> Result<(), Error>;

    /// All keys currently present, in a stable order.
    fn keys(&self) -> Result<Vec<String>, Error>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), Error> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), Error> {
        (**self).remove(key)
    }

    fn keys(&self) -> Result<Vec<String>, Error> {
        (**self).keys()
    }
}

/// A store that lives only as long as the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore(BTreeMap<String, String>);

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.0.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), Error> {
        self.0.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), Error> {
        self.0.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, Error> {
        Ok(self.0.keys().cloned().collect())
    }
}

/// A store persisted as a single JSON object on disk. The whole file is
/// rewritten after every change.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Opens the store at the given path. A missing file is an empty store;
    /// it is only created on the first write.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.is_file() {
            let content = fs::read_to_string(&path)
                .map_err(|e| Error::Io(format!("while reading store {}", path.display()), e))?;
            serde_json::from_str(&content)?
        } else {
            debug!("No store at {}, starting empty", path.display());
            BTreeMap::new()
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the given entries and, only once they are on disk, makes them
    /// the store's contents.
    fn commit(&mut self, entries: BTreeMap<String, String>) -> Result<(), Error> {
        ensure_parent_path_exists(&self.path)?;
        let content = serde_json::to_string_pretty(&entries)?;
        fs::write(&self.path, content)
            .map_err(|e| Error::Io(format!("while writing store {}", self.path.display()), e))?;
        debug!("Wrote {} entries to {}", entries.len(), self.path.display());
        self.entries = entries;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), Error> {
        let mut entries = self.entries.clone();
        entries.insert(key.to_string(), value);
        self.commit(entries)
    }

    fn remove(&mut self, key: &str) -> Result<(), Error> {
        if !self.entries.contains_key(key) {
            return Ok(());
        }
        let mut entries = self.entries.clone();
        entries.remove(key);
        self.commit(entries)
    }

    fn keys(&self) -> Result<Vec<String>, Error> {
        Ok(self.entries.keys().cloned().collect())
    }
}
