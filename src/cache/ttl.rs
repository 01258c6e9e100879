//! TTL Policy Module
//!
//! Explicit expiration policy, replacing the overloaded integer TTL.

/// Raw TTL value meaning "do not store this value at all".
pub const CACHE_DISABLED: i64 = -1;

// == TTL Policy ==
/// How long a value may be served from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlPolicy {
    /// Never expires (persisted as `ttl: 0`)
    Eternal,
    /// Expires after the given number of milliseconds
    Expires(u64),
    /// Not cached; `set` becomes a no-op
    NoCache,
}

impl TtlPolicy {
    /// Interprets a raw millisecond TTL.
    ///
    /// Negative values (including [`CACHE_DISABLED`]) map to `NoCache`,
    /// `0` maps to `Eternal`, anything else to `Expires`.
    pub fn from_millis(ms: i64) -> Self {
        match ms {
            ms if ms < 0 => TtlPolicy::NoCache,
            0 => TtlPolicy::Eternal,
            ms => TtlPolicy::Expires(ms as u64),
        }
    }

    /// The `ttl` field to persist, or `None` when nothing should be written.
    ///
    /// `Expires(0)` would be stale on arrival and is treated like `NoCache`.
    pub fn entry_ttl(self) -> Option<u64> {
        match self {
            TtlPolicy::Eternal => Some(0),
            TtlPolicy::Expires(0) | TtlPolicy::NoCache => None,
            TtlPolicy::Expires(ms) => Some(ms),
        }
    }
}
