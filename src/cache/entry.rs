//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// == Cache Entry ==
/// A single cached value plus the metadata used for expiry and eviction.
///
/// Serialized with camelCase field names; this is the record format written to
/// the durable medium.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    /// The stored value
    pub data: T,
    /// Creation timestamp (Unix milliseconds)
    pub timestamp: u64,
    /// Lifetime in milliseconds, 0 = never expires
    pub ttl: u64,
    /// Number of reads served from this entry
    #[serde(default)]
    pub access_count: u64,
    /// Last read or write (Unix milliseconds)
    #[serde(default)]
    pub last_accessed: u64,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    /// Creates a fresh entry stamped with the current time.
    ///
    /// # Arguments
    /// * `data` - The value to store
    /// * `ttl_ms` - Lifetime in milliseconds, 0 for an eternal entry
    pub fn new(data: T, ttl_ms: u64) -> Self {
        let now = current_timestamp_ms();
        Self {
            data,
            timestamp: now,
            ttl: ttl_ms,
            access_count: 0,
            last_accessed: now,
        }
    }

    // == Is Expired ==
    /// Checks expiry against an explicit clock reading.
    ///
    /// An entry with `ttl == 0` never expires. Otherwise it is valid while
    /// `now - timestamp < ttl`, so it expires exactly when the TTL has fully
    /// elapsed. A timestamp in the future counts as zero elapsed time.
    pub fn is_expired_at(&self, now: u64) -> bool {
        if self.ttl == 0 {
            return false;
        }
        now.saturating_sub(self.timestamp) >= self.ttl
    }

    /// Checks expiry against the wall clock.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    // == Touch ==
    /// Records a read: bumps the access count and refreshes `last_accessed`.
    pub fn touch(&mut self, now: u64) {
        self.access_count = self.access_count.saturating_add(1);
        self.last_accessed = now;
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_creation() {
        let entry = CacheEntry::new("test_value".to_string(), 60_000);

        assert_eq!(entry.data, "test_value");
        assert_eq!(entry.ttl, 60_000);
        assert_eq!(entry.access_count, 0);
        assert_eq!(entry.timestamp, entry.last_accessed);
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_zero_ttl_never_expires() {
        let mut entry = CacheEntry::new(1u32, 0);
        entry.timestamp = 0;

        assert!(!entry.is_expired());
        assert!(!entry.is_expired_at(u64::MAX));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let mut entry = CacheEntry::new("v", 1_000);
        entry.timestamp = 10_000;

        assert!(!entry.is_expired_at(10_999));
        assert!(entry.is_expired_at(11_000));
        assert!(entry.is_expired_at(11_001));
    }

    #[test]
    fn test_future_timestamp_is_not_expired() {
        let mut entry = CacheEntry::new("v", 1_000);
        entry.timestamp = 50_000;

        assert!(!entry.is_expired_at(10_000));
    }

    #[test]
    fn test_touch_updates_bookkeeping() {
        let mut entry = CacheEntry::new("v", 1_000);
        entry.touch(42);
        entry.touch(43);

        assert_eq!(entry.access_count, 2);
        assert_eq!(entry.last_accessed, 43);
    }

    #[test]
    fn test_serialized_field_names() {
        let entry = CacheEntry {
            data: 25,
            timestamp: 1,
            ttl: 2,
            access_count: 3,
            last_accessed: 4,
        };
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "data": 25,
                "timestamp": 1,
                "ttl": 2,
                "accessCount": 3,
                "lastAccessed": 4
            })
        );
    }

    #[test]
    fn test_missing_access_fields_default_to_zero() {
        let entry: CacheEntry<u8> =
            serde_json::from_str(r#"{"data":1,"timestamp":5,"ttl":0}"#).unwrap();

        assert_eq!(entry.access_count, 0);
        assert_eq!(entry.last_accessed, 0);
    }
}
