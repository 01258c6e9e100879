//! Cache Storage Module
//!
//! Two-layer entry store: a bounded in-process map in front of a durable
//! [`StorageBackend`]. Owns key validation, defensive deserialization, durable
//! size accounting and eviction in both layers.

use std::collections::{BTreeSet, HashMap};

use serde_json::Value;
use tracing::{debug, warn};

use crate::backend::{stored_size, StorageBackend};
use crate::cache::eviction::{self, EvictionCandidate, EvictionPolicy, WeightedLru};
use crate::cache::key::validate_key;
use crate::cache::sanitize::parse_entry;
use crate::cache::{current_timestamp_ms, CacheEntry};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

/// Durable eviction stops once usage falls to this share of the budget.
pub const CLEANUP_THRESHOLD: f64 = 0.8;

// == Storage Config ==
/// Parameters of the storage layer.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStorageConfig {
    /// Namespace prefix for durable keys
    pub storage_prefix: String,
    /// Memory layer capacity in entries
    pub max_memory_entries: usize,
    /// Durable layer budget in bytes
    pub max_storage_size: usize,
    /// Fraction of the budget durable eviction shrinks usage to
    pub cleanup_threshold: f64,
}

impl From<&CacheConfig> for CacheStorageConfig {
    fn from(config: &CacheConfig) -> Self {
        Self {
            storage_prefix: config.storage_prefix.clone(),
            max_memory_entries: config.max_memory_entries,
            max_storage_size: config.max_storage_size,
            cleanup_threshold: CLEANUP_THRESHOLD,
        }
    }
}

#[derive(Debug)]
struct MemorySlot {
    entry: CacheEntry<Value>,
    sequence: u64,
}

// == Cache Storage ==
/// Memory-first, durable-second entry store.
#[derive(Debug)]
pub struct CacheStorage {
    /// Fast path
    memory: HashMap<String, MemorySlot>,
    /// Durable path
    backend: Box<dyn StorageBackend>,
    /// Eviction ranking shared by both layers
    policy: Box<dyn EvictionPolicy>,
    config: CacheStorageConfig,
    /// False once the startup probe failed; the instance then runs memory-only
    storage_available: bool,
    /// Tracked durable usage in bytes
    current_storage_size: usize,
    /// Monotonic touch counter, breaks eviction ties inside one millisecond
    sequence: u64,
}

impl CacheStorage {
    // == Constructor ==
    /// Creates a storage over `backend`, probing it once for writability.
    pub fn new(config: CacheStorageConfig, backend: impl StorageBackend + 'static) -> Self {
        let mut storage = Self {
            memory: HashMap::new(),
            backend: Box::new(backend),
            policy: Box::new(WeightedLru),
            config,
            storage_available: false,
            current_storage_size: 0,
            sequence: 0,
        };
        storage.storage_available = storage.check_storage_available();
        if storage.storage_available {
            storage.current_storage_size = storage.calculate_storage_size();
        }
        storage
    }

    /// Replaces the eviction policy.
    pub fn with_policy(mut self, policy: impl EvictionPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    fn check_storage_available(&self) -> bool {
        let probe = format!("{}:test", self.config.storage_prefix);
        let result = self
            .backend
            .set_item(&probe, "test")
            .and_then(|_| self.backend.remove_item(&probe));
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("Durable storage is not available, falling back to memory-only cache: {}", e);
                false
            }
        }
    }

    fn calculate_storage_size(&self) -> usize {
        let mut total = 0;
        for key in self.durable_keys() {
            match self.backend.get_item(&key) {
                Ok(Some(value)) => total += stored_size(&key, &value),
                Ok(None) => {}
                Err(e) => warn!("Failed to size durable entry {}: {}", key, e),
            }
        }
        total
    }

    fn durable_keys(&self) -> Vec<String> {
        if !self.storage_available {
            return Vec::new();
        }
        let namespace = format!("{}:", self.config.storage_prefix);
        self.backend
            .keys()
            .into_iter()
            .filter(|key| key.starts_with(&namespace))
            .collect()
    }

    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    // == Durable Layer ==
    /// Reads and validates one durable record. Corrupt records are deleted
    /// before the `DataCorrupted` error is returned.
    fn read_durable(&mut self, key: &str) -> Result<Option<CacheEntry<Value>>> {
        if !self.storage_available {
            return Ok(None);
        }

        let Some(text) = self.backend.get_item(key)? else {
            return Ok(None);
        };

        match parse_entry(key, &text) {
            Ok(entry) => Ok(Some(entry)),
            Err(err) => {
                warn!("Discarding corrupted cache entry {}: {}", key, err);
                self.discard_durable(key, &text);
                Err(err)
            }
        }
    }

    fn discard_durable(&mut self, key: &str, text: &str) {
        match self.backend.remove_item(key) {
            Ok(()) => {
                self.current_storage_size = self
                    .current_storage_size
                    .saturating_sub(stored_size(key, text));
            }
            Err(e) => warn!("Failed to remove cache item {}: {}", key, e),
        }
    }

    fn existing_durable_size(&self, key: &str) -> Result<usize> {
        Ok(self
            .backend
            .get_item(key)?
            .map(|text| stored_size(key, &text))
            .unwrap_or(0))
    }

    fn write_durable(&mut self, key: &str, entry: &CacheEntry<Value>) -> Result<()> {
        if !self.storage_available {
            return Ok(());
        }

        let serialized = serde_json::to_string(entry)
            .map_err(|e| CacheError::DataCorrupted(format!("{key}: {e}")))?;
        let item_size = stored_size(key, &serialized);
        let max = self.config.max_storage_size;

        let mut existing_size = self.existing_durable_size(key)?;
        if self.current_storage_size.saturating_sub(existing_size) + item_size > max {
            self.evict_from_storage(item_size.saturating_sub(existing_size));
            existing_size = self.existing_durable_size(key)?;
        }

        if self.current_storage_size.saturating_sub(existing_size) + item_size > max {
            return Err(CacheError::QuotaExceeded(format!(
                "{key}: {item_size} bytes do not fit in durable storage after cleanup"
            )));
        }

        self.backend.set_item(key, &serialized)?;
        self.current_storage_size =
            self.current_storage_size.saturating_sub(existing_size) + item_size;
        Ok(())
    }

    // == Eviction ==
    fn evict_from_memory(&mut self) {
        let max = self.config.max_memory_entries;
        if self.memory.len() <= max {
            return;
        }

        let mut candidates: Vec<EvictionCandidate> = self
            .memory
            .iter()
            .map(|(key, slot)| EvictionCandidate {
                key: key.clone(),
                access_count: slot.entry.access_count,
                last_accessed: slot.entry.last_accessed,
                sequence: slot.sequence,
            })
            .collect();
        eviction::rank(self.policy.as_ref(), &mut candidates);

        let count = eviction::memory_evict_count(max);
        for candidate in candidates.into_iter().take(count) {
            self.memory.remove(&candidate.key);
            debug!("Evicted {} from memory cache", candidate.key);
        }
    }

    /// Frees durable space until usage is at or under the cleanup target and
    /// `incoming` more bytes fit in the budget. Records that fail to parse are
    /// removed first, unconditionally.
    fn evict_from_storage(&mut self, incoming: usize) {
        if !self.storage_available {
            return;
        }

        let mut candidates = Vec::new();
        let mut sizes = HashMap::new();
        let mut doomed = Vec::new();
        let mut freed = 0;
        for key in self.durable_keys() {
            let text = match self.backend.get_item(&key) {
                Ok(Some(text)) => text,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Failed to read cache item {}: {}", key, e);
                    continue;
                }
            };
            let size = stored_size(&key, &text);
            match parse_entry(&key, &text) {
                Ok(entry) => {
                    sizes.insert(key.clone(), size);
                    candidates.push(EvictionCandidate {
                        sequence: self.memory.get(&key).map_or(0, |slot| slot.sequence),
                        key,
                        access_count: entry.access_count,
                        last_accessed: entry.last_accessed,
                    });
                }
                Err(_) => {
                    freed += size;
                    doomed.push(key);
                }
            }
        }
        let corrupt = doomed.len();
        eviction::rank(self.policy.as_ref(), &mut candidates);

        let max = self.config.max_storage_size;
        let target = (max as f64 * self.config.cleanup_threshold) as usize;
        for candidate in candidates {
            let remaining = self.current_storage_size.saturating_sub(freed);
            if remaining <= target && remaining + incoming <= max {
                break;
            }
            freed += sizes.get(&candidate.key).copied().unwrap_or(0);
            doomed.push(candidate.key);
        }
        if doomed.is_empty() {
            return;
        }

        match self.backend.remove_items(&doomed) {
            Ok(()) => {
                self.current_storage_size = self.current_storage_size.saturating_sub(freed);
            }
            Err(e) => {
                warn!("Failed to evict {} cache items: {}", doomed.len(), e);
                self.current_storage_size = self.calculate_storage_size();
            }
        }
        debug!(
            "Durable eviction removed {} entries ({} corrupt), {} bytes in use",
            doomed.len(),
            corrupt,
            self.current_storage_size
        );
    }

    // == Get Item ==
    /// Reads an entry, memory first, recording the access.
    ///
    /// A durable hit is promoted into the memory layer.
    pub fn get_item(&mut self, key: &str) -> Result<Option<CacheEntry<Value>>> {
        validate_key(&self.config.storage_prefix, key)?;

        let now = current_timestamp_ms();
        let sequence = self.next_sequence();

        if let Some(slot) = self.memory.get_mut(key) {
            slot.entry.touch(now);
            slot.sequence = sequence;
            return Ok(Some(slot.entry.clone()));
        }

        let Some(mut entry) = self.read_durable(key)? else {
            return Ok(None);
        };
        entry.touch(now);
        self.memory.insert(
            key.to_string(),
            MemorySlot {
                entry: entry.clone(),
                sequence,
            },
        );
        self.evict_from_memory();
        Ok(Some(entry))
    }

    // == Peek Item ==
    /// Reads an entry without recording an access or promoting it.
    pub fn peek_item(&mut self, key: &str) -> Result<Option<CacheEntry<Value>>> {
        validate_key(&self.config.storage_prefix, key)?;

        if let Some(slot) = self.memory.get(key) {
            return Ok(Some(slot.entry.clone()));
        }
        self.read_durable(key)
    }

    // == Set Item ==
    /// Stores an entry in both layers.
    ///
    /// `last_accessed` is stamped with the current time. The memory layer is
    /// updated even when the durable write then fails.
    pub fn set_item(&mut self, key: &str, mut entry: CacheEntry<Value>) -> Result<()> {
        validate_key(&self.config.storage_prefix, key)?;

        entry.last_accessed = current_timestamp_ms();
        let sequence = self.next_sequence();
        self.memory.insert(
            key.to_string(),
            MemorySlot {
                entry: entry.clone(),
                sequence,
            },
        );
        self.evict_from_memory();

        self.write_durable(key, &entry)
    }

    // == Remove Item ==
    /// Deletes an entry from both layers. Durable failures are logged only.
    pub fn remove_item(&mut self, key: &str) -> Result<()> {
        validate_key(&self.config.storage_prefix, key)?;

        self.memory.remove(key);

        if self.storage_available {
            match self.backend.get_item(key) {
                Ok(Some(text)) => self.discard_durable(key, &text),
                Ok(None) => {}
                Err(e) => warn!("Failed to remove item {} from durable storage: {}", key, e),
            }
        }
        Ok(())
    }

    // == Clear ==
    /// Empties the memory layer and deletes every durable key in the namespace.
    pub fn clear(&mut self) {
        self.memory.clear();

        if !self.storage_available {
            return;
        }
        let keys = self.durable_keys();
        if let Err(e) = self.backend.remove_items(&keys) {
            warn!("Failed to clear {} cache items: {}", keys.len(), e);
        }
        self.current_storage_size = self.calculate_storage_size();
    }

    // == Keys ==
    /// Union of memory and durable keys, sorted, without duplicates.
    pub fn keys(&self) -> Vec<String> {
        let mut all: BTreeSet<String> = self.memory.keys().cloned().collect();
        all.extend(self.durable_keys());
        all.into_iter().collect()
    }

    // == Size ==
    /// Estimated footprint in bytes: serialized memory entries plus tracked
    /// durable usage, both counted as UTF-16.
    pub fn size(&self) -> usize {
        let memory_size: usize = self
            .memory
            .iter()
            .filter_map(|(key, slot)| {
                serde_json::to_string(&slot.entry)
                    .ok()
                    .map(|text| stored_size(key, &text))
            })
            .sum();
        memory_size + self.current_storage_size
    }

    // == Introspection ==
    /// Entries resident in the memory layer.
    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    /// Namespace keys present in the durable layer.
    pub fn durable_len(&self) -> usize {
        self.durable_keys().len()
    }

    /// Whether `key` is resident in the memory layer.
    pub fn is_in_memory(&self, key: &str) -> bool {
        self.memory.contains_key(key)
    }

    /// Whether the durable layer passed the startup probe.
    pub fn is_storage_available(&self) -> bool {
        self.storage_available
    }

    /// Tracked durable usage in bytes.
    pub fn storage_size(&self) -> usize {
        self.current_storage_size
    }
}
