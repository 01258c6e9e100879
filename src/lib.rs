//! JMA Cache - two-layer cache for JMA AMeDAS observation data
//!
//! A bounded memory layer in front of a size-budgeted durable store, with keys
//! and expiration derived from AMeDAS URLs, plus the fetch clients that use it.

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod jma;

pub use backend::{FileBackend, MemoryBackend, StorageBackend};
pub use cache::{CacheManager, CacheStats, CacheStorage, TtlPolicy};
pub use config::CacheConfig;
pub use error::{BackendError, CacheError, FetchError};
