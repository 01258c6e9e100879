//! Cache Manager Module
//!
//! Policy layer over [`CacheStorage`]: derives keys and TTLs from AMeDAS URLs,
//! enforces expiry and keeps hit statistics. No method returns an error;
//! failures are logged and degrade to a miss or a no-op, so a broken cache can
//! only ever cost a redundant network fetch.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::backend::{MemoryBackend, StorageBackend};
use crate::cache::key::{self, CacheKind};
use crate::cache::{
    current_timestamp_ms, jst_now, CacheEntry, CacheStats, CacheStorage, CacheStorageConfig,
    RequestCounters, TimeSlotInfo, TtlPolicy,
};
use crate::config::CacheConfig;
use crate::error::Result;

#[derive(Debug)]
struct ManagerState {
    storage: CacheStorage,
    counters: RequestCounters,
}

// == Cache Manager ==
/// URL-aware cache with per-kind expiration.
///
/// Construct one per application and hand it (usually in an `Arc`) to every
/// fetch client.
#[derive(Debug)]
pub struct CacheManager {
    state: Mutex<ManagerState>,
    config: CacheConfig,
}

impl CacheManager {
    // == Constructors ==
    /// Creates a manager over a durable backend.
    pub fn new(config: CacheConfig, backend: impl StorageBackend + 'static) -> Self {
        let storage = CacheStorage::new(CacheStorageConfig::from(&config), backend);
        Self::with_storage(config, storage)
    }

    /// Creates a manager over an already configured storage.
    pub fn with_storage(config: CacheConfig, storage: CacheStorage) -> Self {
        Self {
            state: Mutex::new(ManagerState {
                storage,
                counters: RequestCounters::new(),
            }),
            config,
        }
    }

    /// Creates a manager whose durable layer lives in process memory.
    pub fn in_memory(config: CacheConfig) -> Self {
        Self::new(config, MemoryBackend::new())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // == Key And TTL Derivation ==
    /// Cache key for an AMeDAS data URL.
    ///
    /// Fails with `UnsupportedUrlFormat` for URLs that are neither map nor point data.
    pub fn cache_key_for_url(&self, url: &str) -> Result<String> {
        key::key_for_url(&self.config.storage_prefix, url)
    }

    /// Expiration policy for a key as of the JST wall clock.
    pub fn ttl_for_key(&self, key: &str) -> TtlPolicy {
        self.ttl_for_key_at(key, jst_now())
    }

    /// Expiration policy for a key as of `now` (JST).
    ///
    /// Point data for the slot containing `now` gets `point_current`, older or
    /// newer slots get `point_past`, and an unparseable slot falls back to
    /// `point_current`. Keys outside the namespace get the map policy.
    pub fn ttl_for_key_at(&self, key: &str, now: NaiveDateTime) -> TtlPolicy {
        let ttl = &self.config.default_ttl;
        match key::parse_key(&self.config.storage_prefix, key) {
            Some((CacheKind::Point, discriminator)) => {
                match key::point_slot(discriminator).and_then(|slot| TimeSlotInfo::parse(slot, now)) {
                    Some(slot) if !slot.is_current => ttl.point_past,
                    _ => ttl.point_current,
                }
            }
            Some((CacheKind::Map, _)) | None => ttl.map,
        }
    }

    // == Get ==
    /// Returns the cached value, or `None` on a miss, an expired entry, or any
    /// storage failure. Expired entries are removed.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut state = self.state.lock().await;
        state.counters.record_request();

        let entry = match state.storage.get_item(key) {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                warn!("Cache get failed for key {}: {}", key, e);
                return None;
            }
        };

        if entry.is_expired() {
            debug!("Cache entry {} expired", key);
            if let Err(e) = state.storage.remove_item(key) {
                warn!("Failed to remove expired entry {}: {}", key, e);
            }
            return None;
        }

        match serde_json::from_value(entry.data) {
            Ok(value) => {
                state.counters.record_hit();
                Some(value)
            }
            Err(e) => {
                warn!("Cached value for {} has an unexpected shape: {}", key, e);
                None
            }
        }
    }

    // == Set ==
    /// Stores a value. Without an explicit `ttl` the policy is derived from the
    /// key; `TtlPolicy::NoCache` makes this a no-op. Failures are logged only.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<TtlPolicy>) {
        let policy = ttl.unwrap_or_else(|| self.ttl_for_key(key));
        let Some(ttl_ms) = policy.entry_ttl() else {
            debug!("Caching disabled for {}", key);
            return;
        };

        let data = match serde_json::to_value(value) {
            Ok(Value::Null) => {
                debug!("Not caching null value for {}", key);
                return;
            }
            Ok(data) => data,
            Err(e) => {
                warn!("Cache set failed for key {}: {}", key, e);
                return;
            }
        };

        let mut state = self.state.lock().await;
        if let Err(e) = state.storage.set_item(key, CacheEntry::new(data, ttl_ms)) {
            warn!("Cache set failed for key {}: {}", key, e);
        }
    }

    // == Has ==
    /// True iff a non-expired entry exists.
    pub async fn has(&self, key: &str) -> bool {
        let mut state = self.state.lock().await;
        match state.storage.get_item(key) {
            Ok(Some(entry)) => !entry.is_expired(),
            Ok(None) => false,
            Err(e) => {
                debug!("Cache has failed for key {}: {}", key, e);
                false
            }
        }
    }

    // == Delete ==
    pub async fn delete(&self, key: &str) {
        let mut state = self.state.lock().await;
        if let Err(e) = state.storage.remove_item(key) {
            warn!("Cache delete failed for key {}: {}", key, e);
        }
    }

    // == Clear ==
    /// Drops every entry and resets the request counters.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.storage.clear();
        state.counters.reset();
        info!("Cache cleared");
    }

    // == Cleanup ==
    /// Removes expired and unreadable entries. Returns how many were removed.
    pub async fn cleanup(&self) -> usize {
        let now = current_timestamp_ms();
        let removed = self
            .sweep(|entry| entry.is_expired_at(now))
            .await;
        info!("Cache cleanup completed: removed {} expired entries", removed);
        removed
    }

    // == Clear Older Than ==
    /// Removes entries created before `cutoff`, plus unreadable ones.
    pub async fn clear_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let cutoff_ms = cutoff.timestamp_millis().max(0) as u64;
        let removed = self.sweep(|entry| entry.timestamp < cutoff_ms).await;
        info!("Cleared {} cache entries older than {}", removed, cutoff.to_rfc3339());
        removed
    }

    // == Clear Point Data ==
    /// Removes every point entry of one station.
    pub async fn clear_point_data(&self, station: &str) -> usize {
        let mut state = self.state.lock().await;
        let keys: Vec<String> = state
            .storage
            .keys()
            .into_iter()
            .filter(|k| key::is_station_key(&self.config.storage_prefix, k, station))
            .collect();
        let removed = remove_all(&mut state.storage, &keys);
        info!("Cleared {} cache entries for station {}", removed, station);
        removed
    }

    /// Best-effort sweep: every key whose entry matches `stale`, or cannot be
    /// read, is removed. One failing key never aborts the sweep.
    async fn sweep(&self, stale: impl Fn(&CacheEntry<Value>) -> bool) -> usize {
        let mut state = self.state.lock().await;
        let mut doomed = Vec::new();
        for key in state.storage.keys() {
            match state.storage.peek_item(&key) {
                Ok(Some(entry)) if stale(&entry) => doomed.push(key),
                Ok(_) => {}
                Err(e) => {
                    debug!("Sweeping unreadable entry {}: {}", key, e);
                    doomed.push(key);
                }
            }
        }
        remove_all(&mut state.storage, &doomed)
    }

    // == Stats ==
    pub async fn get_stats(&self) -> CacheStats {
        let state = self.state.lock().await;
        CacheStats {
            memory_entries: state.storage.memory_len(),
            storage_entries: state.storage.durable_len(),
            total_size: state.storage.size(),
            hit_rate: state.counters.hit_rate(),
            total_requests: state.counters.total_requests,
            cache_hits: state.counters.cache_hits,
        }
    }

    // == URL Convenience ==
    /// [`get`](Self::get) keyed by URL. Unsupported URLs are a miss.
    pub async fn get_by_url<T: DeserializeOwned>(&self, url: &str) -> Option<T> {
        match self.cache_key_for_url(url) {
            Ok(key) => self.get(&key).await,
            Err(e) => {
                warn!("Cache lookup skipped: {}", e);
                None
            }
        }
    }

    /// [`set`](Self::set) keyed by URL with the TTL derived from the URL shape.
    pub async fn set_by_url<T: Serialize + ?Sized>(&self, url: &str, value: &T) {
        match self.cache_key_for_url(url) {
            Ok(key) => self.set(&key, value, None).await,
            Err(e) => warn!("Cache store skipped: {}", e),
        }
    }

    /// [`has`](Self::has) keyed by URL.
    pub async fn has_by_url(&self, url: &str) -> bool {
        match self.cache_key_for_url(url) {
            Ok(key) => self.has(&key).await,
            Err(_) => false,
        }
    }
}

fn remove_all(storage: &mut CacheStorage, keys: &[String]) -> usize {
    let mut removed = 0;
    for key in keys {
        match storage.remove_item(key) {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to remove cache entry {}: {}", key, e),
        }
    }
    removed
}
