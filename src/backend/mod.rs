//! Storage Backend Module
//!
//! The durable key-value medium under the cache. Modeled on browser local
//! storage: synchronous string get/set/remove, indexed key enumeration, a finite
//! quota, and writes that may fail at any time.

mod file;
mod memory;

use std::fmt;

use crate::error::BackendError;

pub use file::FileBackend;
pub use memory::MemoryBackend;

// == Storage Backend ==
/// A durable string key-value store.
///
/// Implementations use interior mutability; the cache treats every call as
/// fallible and never assumes success.
pub trait StorageBackend: fmt::Debug + Send + Sync {
    /// Reads a value, `Ok(None)` when absent.
    fn get_item(&self, key: &str) -> Result<Option<String>, BackendError>;

    /// Writes a value, replacing any previous one.
    fn set_item(&self, key: &str, value: &str) -> Result<(), BackendError>;

    /// Deletes a value; deleting an absent key is not an error.
    fn remove_item(&self, key: &str) -> Result<(), BackendError>;

    /// Deletes several values in one call. Backends that persist on every
    /// mutation override this to write once per batch.
    fn remove_items(&self, keys: &[String]) -> Result<(), BackendError> {
        for key in keys {
            self.remove_item(key)?;
        }
        Ok(())
    }

    /// Number of stored keys.
    fn len(&self) -> usize;

    /// Key at `index` in enumeration order.
    fn key(&self, index: usize) -> Option<String>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stored keys.
    fn keys(&self) -> Vec<String> {
        (0..self.len()).filter_map(|i| self.key(i)).collect()
    }
}

/// Bytes a record occupies, counting UTF-16 code units at two bytes each.
pub fn stored_size(key: &str, value: &str) -> usize {
    (key.encode_utf16().count() + value.encode_utf16().count()) * 2
}
