//! Error types for the cache subsystem
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Error kinds raised by the storage layer and key derivation.
///
/// `CacheStorage` returns these to its caller; `CacheManager` catches every one
/// of them and degrades to a miss or a no-op.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Durable medium inaccessible, or a write failed for a reason other than quota
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Durable medium rejected a write because of its size budget
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// A persisted entry failed structural validation or JSON parsing
    #[error("Data corrupted: {0}")]
    DataCorrupted(String),

    /// Key does not match `<prefix>:(map|point):`
    #[error("Invalid cache key format: {0}")]
    InvalidKey(String),

    /// Reserved; expiry is currently reported as a silent miss
    #[error("Entry expired: {0}")]
    Expired(String),

    /// URL is neither an AMeDAS map nor an AMeDAS point URL
    #[error("Unsupported URL format: {0}")]
    UnsupportedUrlFormat(String),
}

// == Backend Error ==
/// Failure reported by a [`StorageBackend`](crate::backend::StorageBackend).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The medium is full
    #[error("storage quota exceeded")]
    QuotaExceeded,

    /// Any other failure of the medium
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<BackendError> for CacheError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::QuotaExceeded => {
                CacheError::QuotaExceeded("durable storage rejected the write".to_string())
            }
            BackendError::Unavailable(msg) => CacheError::StorageUnavailable(msg),
        }
    }
}

// == Fetch Error ==
/// Errors raised by the AMeDAS fetch clients.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Transport-level failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Failed to fetch data from {url}: status {status}")]
    Status { url: String, status: u16 },

    /// Response body was not the expected JSON
    #[error("Invalid JSON from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// `latest_time.txt` did not look like `yyyy-mm-ddThh:mm:ss`
    #[error("Invalid latest time: {0}")]
    InvalidLatestTime(String),

    /// Requested time is not on a 10-minute boundary
    #[error("Time must be on a 10 minute boundary: {0}")]
    UnalignedTime(String),

    /// The payload has no observation for the requested timestamp
    #[error("No observation for {0}")]
    MissingObservation(String),

    /// `amdno=` absent from a page URL
    #[error("amdno not found in URL: {0}")]
    MissingStationCode(String),
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
