//! Durable backend persisted as one JSON object on disk.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::StorageBackend;
use crate::error::BackendError;

// == File Backend ==
/// String map mirrored in memory and rewritten to disk after every mutation.
///
/// Writes go to a sibling temp file that is then renamed over the store, so a
/// crash leaves either the old or the new map, never a torn file.
///
/// Each `set_item`/`remove_item` rewrites the whole file with blocking I/O, so a
/// mutation costs O(store size). Bulk deletes go through `remove_items`, which
/// writes once per batch.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    items: Mutex<BTreeMap<String, String>>,
}

impl FileBackend {
    /// Opens the store at `path`, creating its parent directory if needed.
    ///
    /// A missing file yields an empty store. An unreadable or malformed file is
    /// logged and replaced by an empty store on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, BackendError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| io_error(&path, &e))?;
        }

        let items = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!("Discarding malformed store {}: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(io_error(&path, &e)),
        };
        debug!("Opened file store {} with {} keys", path.display(), items.len());

        Ok(Self {
            path,
            items: Mutex::new(items),
        })
    }

    /// Location of the store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, items: &BTreeMap<String, String>) -> Result<(), BackendError> {
        let text = serde_json::to_string(items)
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, text).map_err(|e| io_error(&tmp, &e))?;
        fs::rename(&tmp, &self.path).map_err(|e| io_error(&self.path, &e))
    }
}

fn io_error(path: &Path, err: &io::Error) -> BackendError {
    BackendError::Unavailable(format!("{}: {}", path.display(), err))
}

impl StorageBackend for FileBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>, BackendError> {
        Ok(self.items.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), BackendError> {
        let mut items = self.items.lock();
        let previous = items.insert(key.to_string(), value.to_string());
        if let Err(e) = self.persist(&items) {
            match previous {
                Some(old) => items.insert(key.to_string(), old),
                None => items.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), BackendError> {
        let mut items = self.items.lock();
        if let Some(old) = items.remove(key) {
            if let Err(e) = self.persist(&items) {
                items.insert(key.to_string(), old);
                return Err(e);
            }
        }
        Ok(())
    }

    fn remove_items(&self, keys: &[String]) -> Result<(), BackendError> {
        let mut items = self.items.lock();
        let removed: Vec<(String, String)> = keys
            .iter()
            .filter_map(|key| items.remove_entry(key))
            .collect();
        if removed.is_empty() {
            return Ok(());
        }
        if let Err(e) = self.persist(&items) {
            items.extend(removed);
            return Err(e);
        }
        debug!("Removed {} keys from {}", removed.len(), self.path.display());
        Ok(())
    }

    fn len(&self) -> usize {
        self.items.lock().len()
    }

    fn key(&self, index: usize) -> Option<String> {
        self.items.lock().keys().nth(index).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.items.lock().keys().cloned().collect()
    }
}
