//! JMA AMeDAS Module
//!
//! URL helpers and fetch clients for the AMeDAS observation JSON. The clients
//! share one injected [`CacheManager`](crate::cache::CacheManager).

mod fetcher;
mod urls;

pub use fetcher::{
    fetch_latest_time, AmedasObservation, HttpTransport, MapFetcher, PointFetcher, Transport,
};
pub use urls::{
    amdno_from_page_url, latest_time_to_slot, map_url_at, point_url, point_url_at,
    AMEDAS_DATA_BASE, LATEST_TIME_URL,
};
