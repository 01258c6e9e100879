//! Eviction Module
//!
//! Ranks cache entries for eviction. Both storage layers use the same policy;
//! the lowest score is evicted first.

use std::cmp::Ordering;
use std::fmt;

/// Weight of the access count in [`WeightedLru`].
pub const ACCESS_COUNT_WEIGHT: f64 = 0.3;

/// Weight of the last access time in [`WeightedLru`].
pub const RECENCY_WEIGHT: f64 = 0.7;

// == Eviction Policy ==
/// Scores an entry's claim to stay resident. Lower scores go first.
pub trait EvictionPolicy: fmt::Debug + Send + Sync {
    fn score(&self, access_count: u64, last_accessed: u64) -> f64;
}

/// Blend of access frequency and recency: `0.3 * accessCount + 0.7 * lastAccessed`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WeightedLru;

impl EvictionPolicy for WeightedLru {
    fn score(&self, access_count: u64, last_accessed: u64) -> f64 {
        access_count as f64 * ACCESS_COUNT_WEIGHT + last_accessed as f64 * RECENCY_WEIGHT
    }
}

// == Candidate ==
/// An entry considered for eviction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictionCandidate {
    pub key: String,
    pub access_count: u64,
    pub last_accessed: u64,
    /// Tie-breaker: monotonic touch sequence, higher = more recent
    pub sequence: u64,
}

/// Orders candidates from most to least evictable.
///
/// Equal scores fall back to `sequence`, then to the key, so the order is
/// deterministic even when many entries share a millisecond.
pub fn rank(policy: &dyn EvictionPolicy, candidates: &mut [EvictionCandidate]) {
    candidates.sort_by(|a, b| {
        let score_a = policy.score(a.access_count, a.last_accessed);
        let score_b = policy.score(b.access_count, b.last_accessed);
        score_a
            .partial_cmp(&score_b)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.sequence.cmp(&b.sequence))
            .then_with(|| a.key.cmp(&b.key))
    });
}

/// How many memory entries one eviction pass removes: 10% of capacity, at least one.
pub fn memory_evict_count(max_entries: usize) -> usize {
    max_entries.div_ceil(10).max(1)
}
