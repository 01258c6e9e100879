//! Cache Key Module
//!
//! Derives `<prefix>:<kind>:<discriminator>` keys from AMeDAS URLs and
//! validates keys handed to the storage layer.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{CacheError, Result};

static MAP_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"/map/(\d{14})\.json$").unwrap());

static POINT_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/point/([^/]+)/(\d{8}_\d{2})\.json$").unwrap());

const MAP_SEGMENT: &str = "/amedas/data/map/";
const POINT_SEGMENT: &str = "/amedas/data/point/";

// == Cache Kind ==
/// Kind of observation data a key refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    /// Whole-country snapshot at one 10-minute timestamp
    Map,
    /// One station's 3-hour series
    Point,
}

impl CacheKind {
    /// Key segment for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            CacheKind::Map => "map",
            CacheKind::Point => "point",
        }
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Key Derivation ==
/// Builds the cache key for an AMeDAS data URL.
///
/// Map URLs key on their 14-digit timestamp and point URLs on
/// `<station>:<YYYYMMDD_HH>`. A URL of the right family whose tail does not
/// match falls back to the whole URL as discriminator.
pub fn key_for_url(prefix: &str, url: &str) -> Result<String> {
    if url.contains(MAP_SEGMENT) {
        return Ok(match MAP_URL.captures(url) {
            Some(caps) => format!("{prefix}:map:{}", &caps[1]),
            None => format!("{prefix}:map:{url}"),
        });
    }

    if url.contains(POINT_SEGMENT) {
        return Ok(match POINT_URL.captures(url) {
            Some(caps) => format!("{prefix}:point:{}:{}", &caps[1], &caps[2]),
            None => format!("{prefix}:point:{url}"),
        });
    }

    Err(CacheError::UnsupportedUrlFormat(url.to_string()))
}

/// Splits a key into its kind and discriminator, or `None` if the key is
/// outside the namespace.
pub fn parse_key<'a>(prefix: &str, key: &'a str) -> Option<(CacheKind, &'a str)> {
    let rest = key.strip_prefix(prefix)?.strip_prefix(':')?;
    if let Some(disc) = rest.strip_prefix("map:") {
        Some((CacheKind::Map, disc))
    } else if let Some(disc) = rest.strip_prefix("point:") {
        Some((CacheKind::Point, disc))
    } else {
        None
    }
}

/// Fails with `InvalidKey` unless `key` starts with `<prefix>:map:` or `<prefix>:point:`.
pub fn validate_key(prefix: &str, key: &str) -> Result<()> {
    match parse_key(prefix, key) {
        Some(_) => Ok(()),
        None => Err(CacheError::InvalidKey(key.to_string())),
    }
}

/// The `YYYYMMDD_HH` part of a point discriminator (`<station>:<YYYYMMDD_HH>`).
pub fn point_slot(discriminator: &str) -> Option<&str> {
    discriminator.rsplit_once(':').map(|(_, slot)| slot)
}

/// Whether a key holds point data for `station`.
pub fn is_station_key(prefix: &str, key: &str, station: &str) -> bool {
    match parse_key(prefix, key) {
        Some((CacheKind::Point, disc)) => disc
            .strip_prefix(station)
            .is_some_and(|rest| rest.starts_with(':')),
        _ => false,
    }
}
