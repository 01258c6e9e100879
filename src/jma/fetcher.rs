//! AMeDAS fetch clients.
//!
//! Each client asks the shared [`CacheManager`] first and only goes to the
//! network on a miss, storing the raw payload under the URL's cache key.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::cache::CacheManager;
use crate::error::FetchError;
use crate::jma::urls::{map_url_at, point_url_at, LATEST_TIME_URL};

// == Transport ==
/// Source of response bodies.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Returns the body of a successful GET on `url`.
    async fn get_text(&self, url: &str) -> Result<String, FetchError>;
}

/// [`Transport`] over a shared `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

// == Observation Types ==
/// `[value, quality flag]` pair as published; either may be null.
type Measurement = Vec<Option<f64>>;

/// The elements of one station record this crate reads.
#[derive(Debug, Default, Deserialize)]
struct StationRecord {
    #[serde(default)]
    pressure: Option<Measurement>,
    #[serde(default)]
    temp: Option<Measurement>,
    #[serde(default)]
    humidity: Option<Measurement>,
}

fn first(measurement: &Option<Measurement>) -> Option<f64> {
    measurement.as_ref()?.first().copied().flatten()
}

/// One station's observation at a 10-minute timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmedasObservation {
    /// Station pressure (hPa)
    pub pressure: Option<f64>,
    /// Air temperature (°C)
    pub temperature: Option<f64>,
    /// Relative humidity (%)
    pub humidity: Option<f64>,
    pub time: NaiveDateTime,
}

impl AmedasObservation {
    fn from_record(record: &StationRecord, time: NaiveDateTime) -> Self {
        Self {
            pressure: first(&record.pressure),
            temperature: first(&record.temp),
            humidity: first(&record.humidity),
            time,
        }
    }
}

fn ensure_aligned(at: NaiveDateTime) -> Result<(), FetchError> {
    if at.minute() % 10 != 0 || at.second() != 0 {
        return Err(FetchError::UnalignedTime(at.to_string()));
    }
    Ok(())
}

fn decode<T: serde::de::DeserializeOwned>(url: &str, payload: Value) -> Result<T, FetchError> {
    serde_json::from_value(payload).map_err(|source| FetchError::Decode {
        url: url.to_string(),
        source,
    })
}

/// Cache-through JSON fetch.
async fn fetch_json(
    cache: &CacheManager,
    transport: &dyn Transport,
    url: &str,
) -> Result<Value, FetchError> {
    if let Some(cached) = cache.get_by_url::<Value>(url).await {
        debug!("Cache hit for {}", url);
        return Ok(cached);
    }

    let body = transport.get_text(url).await?;
    let payload: Value = serde_json::from_str(&body).map_err(|source| FetchError::Decode {
        url: url.to_string(),
        source,
    })?;
    cache.set_by_url(url, &payload).await;
    Ok(payload)
}

// == Latest Time ==
/// Reads the timestamp of the newest published observation.
pub async fn fetch_latest_time(
    transport: &dyn Transport,
) -> Result<DateTime<FixedOffset>, FetchError> {
    let text = transport.get_text(LATEST_TIME_URL).await?;
    let text = text.trim();
    DateTime::parse_from_rfc3339(text).map_err(|_| FetchError::InvalidLatestTime(text.to_string()))
}

// == Point Fetcher ==
/// Reads one station's 3-hour series.
pub struct PointFetcher {
    cache: Arc<CacheManager>,
    transport: Arc<dyn Transport>,
}

impl PointFetcher {
    pub fn new(cache: Arc<CacheManager>, transport: Arc<dyn Transport>) -> Self {
        Self { cache, transport }
    }

    /// Observation of station `code` at `at` (JST, on a 10-minute boundary).
    pub async fn fetch(&self, code: &str, at: NaiveDateTime) -> Result<AmedasObservation, FetchError> {
        ensure_aligned(at)?;
        let url = point_url_at(code, at);
        let payload = fetch_json(&self.cache, self.transport.as_ref(), &url).await?;

        let mut series: BTreeMap<String, StationRecord> = decode(&url, payload)?;
        let timestamp = at.format("%Y%m%d%H%M%S").to_string();
        let record = series
            .remove(&timestamp)
            .ok_or_else(|| FetchError::MissingObservation(format!("{code} at {timestamp}")))?;

        Ok(AmedasObservation::from_record(&record, at))
    }
}

// == Map Fetcher ==
/// Reads the whole-country snapshot.
pub struct MapFetcher {
    cache: Arc<CacheManager>,
    transport: Arc<dyn Transport>,
}

impl MapFetcher {
    pub fn new(cache: Arc<CacheManager>, transport: Arc<dyn Transport>) -> Self {
        Self { cache, transport }
    }

    /// Observations of every station at `at`, keyed by station code.
    ///
    /// Stations reporting neither temperature nor humidity elements are left out.
    pub async fn fetch(
        &self,
        at: NaiveDateTime,
    ) -> Result<BTreeMap<String, AmedasObservation>, FetchError> {
        ensure_aligned(at)?;
        let url = map_url_at(at);
        let payload = fetch_json(&self.cache, self.transport.as_ref(), &url).await?;

        let stations: BTreeMap<String, StationRecord> = decode(&url, payload)?;
        Ok(stations
            .into_iter()
            .filter(|(_, record)| record.temp.is_some() && record.humidity.is_some())
            .map(|(code, record)| {
                let observation = AmedasObservation::from_record(&record, at);
                (code, observation)
            })
            .collect())
    }
}
