//! In-process backend with a byte quota and failure injection.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{stored_size, StorageBackend};
use crate::error::BackendError;

#[derive(Debug, Default)]
struct MemoryInner {
    items: BTreeMap<String, String>,
    quota: Option<usize>,
    fail_writes: bool,
    unavailable: bool,
}

// == Memory Backend ==
/// Local-storage lookalike held in process memory.
///
/// Clones share the same underlying map, so a test can keep a handle and
/// inspect or tamper with what the cache persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryBackend {
    /// Unbounded backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that rejects writes pushing its total size past `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        let backend = Self::default();
        backend.inner.lock().quota = Some(bytes);
        backend
    }

    /// Backend on which every operation fails, like disabled browser storage.
    pub fn unavailable() -> Self {
        let backend = Self::default();
        backend.inner.lock().unavailable = true;
        backend
    }

    /// Makes subsequent writes fail with `Unavailable` (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.lock().fail_writes = fail;
    }

    /// Stores a raw value bypassing quota and failure injection.
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.inner.lock().items.insert(key.to_string(), value.to_string());
    }

    /// Total stored size in bytes.
    pub fn used_bytes(&self) -> usize {
        let inner = self.inner.lock();
        inner.items.iter().map(|(k, v)| stored_size(k, v)).sum()
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().items.contains_key(key)
    }
}

impl StorageBackend for MemoryBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>, BackendError> {
        let inner = self.inner.lock();
        if inner.unavailable {
            return Err(BackendError::Unavailable("storage disabled".to_string()));
        }
        Ok(inner.items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), BackendError> {
        let mut inner = self.inner.lock();
        if inner.unavailable || inner.fail_writes {
            return Err(BackendError::Unavailable("write rejected".to_string()));
        }

        if let Some(quota) = inner.quota {
            let used: usize = inner
                .items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| stored_size(k, v))
                .sum();
            if used + stored_size(key, value) > quota {
                return Err(BackendError::QuotaExceeded);
            }
        }

        inner.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), BackendError> {
        let mut inner = self.inner.lock();
        if inner.unavailable {
            return Err(BackendError::Unavailable("storage disabled".to_string()));
        }
        inner.items.remove(key);
        Ok(())
    }

    fn len(&self) -> usize {
        let inner = self.inner.lock();
        if inner.unavailable {
            0
        } else {
            inner.items.len()
        }
    }

    fn key(&self, index: usize) -> Option<String> {
        let inner = self.inner.lock();
        if inner.unavailable {
            return None;
        }
        inner.items.keys().nth(index).cloned()
    }

    fn keys(&self) -> Vec<String> {
        let inner = self.inner.lock();
        if inner.unavailable {
            return Vec::new();
        }
        inner.items.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_operations() {
        let backend = MemoryBackend::new();

        backend.set_item("b", "2").unwrap();
        backend.set_item("a", "1").unwrap();

        assert_eq!(backend.get_item("a").unwrap(), Some("1".to_string()));
        assert_eq!(backend.len(), 2);
        assert_eq!(backend.key(0), Some("a".to_string()));
        assert_eq!(backend.keys(), vec!["a".to_string(), "b".to_string()]);

        backend.remove_item("a").unwrap();
        backend.remove_item("missing").unwrap();
        assert_eq!(backend.get_item("a").unwrap(), None);
        assert_eq!(backend.len(), 1);
    }

    #[test]
    fn test_clones_share_state() {
        let backend = MemoryBackend::new();
        let handle = backend.clone();

        backend.set_item("k", "v").unwrap();
        assert!(handle.contains("k"));
    }

    #[test]
    fn test_quota() {
        // "k" + "v" = 4 bytes per record
        let backend = MemoryBackend::with_quota(8);

        backend.set_item("a", "1").unwrap();
        backend.set_item("b", "2").unwrap();
        assert_eq!(backend.set_item("c", "3"), Err(BackendError::QuotaExceeded));

        // overwriting an existing key does not count it twice
        backend.set_item("a", "9").unwrap();
        assert_eq!(backend.used_bytes(), 8);
    }

    #[test]
    fn test_fail_writes() {
        let backend = MemoryBackend::new();
        backend.set_fail_writes(true);
        assert!(matches!(
            backend.set_item("k", "v"),
            Err(BackendError::Unavailable(_))
        ));

        backend.set_fail_writes(false);
        assert!(backend.set_item("k", "v").is_ok());
    }

    #[test]
    fn test_unavailable() {
        let backend = MemoryBackend::unavailable();

        assert!(backend.set_item("k", "v").is_err());
        assert!(backend.get_item("k").is_err());
        assert!(backend.remove_item("k").is_err());
        assert!(backend.is_empty());
    }
}
