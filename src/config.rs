//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;

use crate::cache::{TtlPolicy, DEFAULT_STORAGE_PREFIX};

/// Default expiration policies per kind of observation data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultTtl {
    /// Whole-country snapshot (`map`) data
    pub map: TtlPolicy,
    /// Station series data for the slot that is still being filled
    pub point_current: TtlPolicy,
    /// Station series data for slots that are complete
    pub point_past: TtlPolicy,
}

impl Default for DefaultTtl {
    fn default() -> Self {
        Self {
            map: TtlPolicy::Expires(60 * 60 * 1000),
            point_current: TtlPolicy::NoCache,
            point_past: TtlPolicy::Expires(3 * 24 * 60 * 60 * 1000),
        }
    }
}

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Namespace prefix for every key written to the durable medium
    pub storage_prefix: String,
    /// Maximum number of entries held in the memory layer
    pub max_memory_entries: usize,
    /// Durable layer budget in bytes (UTF-16 accounting)
    pub max_storage_size: usize,
    /// Expiration policies used when `set` gets no explicit TTL
    pub default_ttl: DefaultTtl,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `JMA_CACHE_PREFIX` - Storage key prefix (default: enhanced_jma)
    /// - `JMA_CACHE_MAX_MEMORY_ENTRIES` - Memory layer capacity (default: 100)
    /// - `JMA_CACHE_MAX_STORAGE_SIZE` - Durable budget in bytes (default: 5 MiB)
    /// - `JMA_CACHE_MAP_TTL_MS` - Map data TTL (default: 1 hour)
    /// - `JMA_CACHE_POINT_CURRENT_TTL_MS` - Current-slot point TTL (default: -1, disabled)
    /// - `JMA_CACHE_POINT_PAST_TTL_MS` - Past-slot point TTL (default: 3 days)
    ///
    /// TTL variables are raw milliseconds: `-1` disables caching, `0` never expires.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            storage_prefix: env::var("JMA_CACHE_PREFIX")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.storage_prefix),
            max_memory_entries: env_parse("JMA_CACHE_MAX_MEMORY_ENTRIES")
                .unwrap_or(defaults.max_memory_entries),
            max_storage_size: env_parse("JMA_CACHE_MAX_STORAGE_SIZE")
                .unwrap_or(defaults.max_storage_size),
            default_ttl: DefaultTtl {
                map: env_parse("JMA_CACHE_MAP_TTL_MS")
                    .map(TtlPolicy::from_millis)
                    .unwrap_or(defaults.default_ttl.map),
                point_current: env_parse("JMA_CACHE_POINT_CURRENT_TTL_MS")
                    .map(TtlPolicy::from_millis)
                    .unwrap_or(defaults.default_ttl.point_current),
                point_past: env_parse("JMA_CACHE_POINT_PAST_TTL_MS")
                    .map(TtlPolicy::from_millis)
                    .unwrap_or(defaults.default_ttl.point_past),
            },
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            storage_prefix: DEFAULT_STORAGE_PREFIX.to_string(),
            max_memory_entries: 100,
            max_storage_size: 5 * 1024 * 1024,
            default_ttl: DefaultTtl::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 6] = [
        "JMA_CACHE_PREFIX",
        "JMA_CACHE_MAX_MEMORY_ENTRIES",
        "JMA_CACHE_MAX_STORAGE_SIZE",
        "JMA_CACHE_MAP_TTL_MS",
        "JMA_CACHE_POINT_CURRENT_TTL_MS",
        "JMA_CACHE_POINT_PAST_TTL_MS",
    ];

    #[test]
    fn test_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.storage_prefix, "enhanced_jma");
        assert_eq!(config.max_memory_entries, 100);
        assert_eq!(config.max_storage_size, 5 * 1024 * 1024);
        assert_eq!(config.default_ttl.map, TtlPolicy::Expires(3_600_000));
        assert_eq!(config.default_ttl.point_current, TtlPolicy::NoCache);
        assert_eq!(config.default_ttl.point_past, TtlPolicy::Expires(259_200_000));
    }

    // Single test touching the environment so parallel tests cannot race on it.
    #[test]
    fn test_config_from_env() {
        for var in VARS {
            env::remove_var(var);
        }
        assert_eq!(CacheConfig::from_env(), CacheConfig::default());

        env::set_var("JMA_CACHE_PREFIX", "custom_prefix");
        env::set_var("JMA_CACHE_MAX_MEMORY_ENTRIES", "50");
        env::set_var("JMA_CACHE_MAX_STORAGE_SIZE", "not-a-number");
        env::set_var("JMA_CACHE_MAP_TTL_MS", "1800000");
        env::set_var("JMA_CACHE_POINT_CURRENT_TTL_MS", "0");
        env::set_var("JMA_CACHE_POINT_PAST_TTL_MS", "-1");

        let config = CacheConfig::from_env();
        assert_eq!(config.storage_prefix, "custom_prefix");
        assert_eq!(config.max_memory_entries, 50);
        assert_eq!(config.max_storage_size, 5 * 1024 * 1024);
        assert_eq!(config.default_ttl.map, TtlPolicy::Expires(1_800_000));
        assert_eq!(config.default_ttl.point_current, TtlPolicy::Eternal);
        assert_eq!(config.default_ttl.point_past, TtlPolicy::NoCache);

        for var in VARS {
            env::remove_var(var);
        }
    }
}
