//! Cache Module
//!
//! Two-layer cache for AMeDAS responses: a bounded in-memory map in front of a
//! size-budgeted durable store, with URL-derived keys and time-slot TTLs.

mod entry;
mod eviction;
mod key;
mod manager;
mod sanitize;
mod slot;
mod stats;
mod storage;
mod ttl;


// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry};
pub use eviction::{EvictionCandidate, EvictionPolicy, WeightedLru};
pub use key::{key_for_url, parse_key, CacheKind};
pub use manager::CacheManager;
pub use sanitize::{sanitize_value, FORBIDDEN_KEYS};
pub use slot::{current_slot_hour, jst_now, to_jst, TimeSlotInfo, JST_OFFSET_HOURS, SLOT_HOURS};
pub use stats::{CacheStats, RequestCounters};
pub use storage::{CacheStorage, CacheStorageConfig, CLEANUP_THRESHOLD};
pub use ttl::{TtlPolicy, CACHE_DISABLED};

// == Public Constants ==
/// Namespace prepended to every key the cache writes
pub const DEFAULT_STORAGE_PREFIX: &str = "enhanced_jma";
