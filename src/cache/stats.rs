//! Cache Statistics Module
//!
//! Tracks request counters and reports a snapshot of both storage layers.

use serde::Serialize;

// == Cache Stats ==
/// Point-in-time view of the cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Entries resident in the memory layer
    pub memory_entries: usize,
    /// Namespace keys in the durable layer
    pub storage_entries: usize,
    /// Estimated footprint in bytes across both layers
    pub total_size: usize,
    /// cache_hits / total_requests, 0.0 before the first request
    pub hit_rate: f64,
    /// Number of `get` calls since creation or the last clear
    pub total_requests: u64,
    /// Number of `get` calls answered from the cache
    pub cache_hits: u64,
}

// == Request Counters ==
/// Running hit/request counters kept by the manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestCounters {
    pub total_requests: u64,
    pub cache_hits: u64,
}

impl RequestCounters {
    /// Creates counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / requests, or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total_requests as f64
        }
    }

    pub fn record_request(&mut self) {
        self.total_requests += 1;
    }

    pub fn record_hit(&mut self) {
        self.cache_hits += 1;
    }

    /// Back to zero.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
