//! Integration Tests for the file-backed cache
//!
//! Exercises the public API end to end: manager over a `FileBackend`,
//! persistence across reopen, and the fetch clients sharing one manager.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};

use jma_cache::jma::{map_url_at, point_url_at, MapFetcher, PointFetcher, Transport};
use jma_cache::{CacheConfig, CacheManager, FetchError, FileBackend, StorageBackend, TtlPolicy};

// == Helper Functions ==

const MAP_URL: &str = "https://www.jma.go.jp/bosai/amedas/data/map/20240101120000.json";
const PAST_POINT_URL: &str =
    "https://www.jma.go.jp/bosai/amedas/data/point/44132/20240101_12.json";

fn open_manager(path: &std::path::Path) -> CacheManager {
    let backend = FileBackend::open(path).unwrap();
    CacheManager::new(CacheConfig::default(), backend)
}

#[derive(Default)]
struct CountingTransport {
    bodies: HashMap<String, String>,
    calls: AtomicUsize,
}

#[async_trait]
impl Transport for CountingTransport {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.bodies.get(url).cloned().ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

// == Persistence Tests ==

#[tokio::test]
async fn test_entries_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");

    {
        let manager = open_manager(&path);
        manager.set_by_url(MAP_URL, &json!({ "44132": { "temp": [9.8, 0] } })).await;
        manager.set_by_url(PAST_POINT_URL, &json!({ "t": 1 })).await;
    }

    let manager = open_manager(&path);
    let map: Option<Value> = manager.get_by_url(MAP_URL).await;
    let point: Option<Value> = manager.get_by_url(PAST_POINT_URL).await;

    assert_eq!(map, Some(json!({ "44132": { "temp": [9.8, 0] } })));
    assert_eq!(point, Some(json!({ "t": 1 })));

    let stats = manager.get_stats().await;
    assert_eq!(stats.storage_entries, 2);
    assert_eq!(stats.cache_hits, 2);
}

#[tokio::test]
async fn test_clear_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");

    {
        let manager = open_manager(&path);
        manager.set_by_url(MAP_URL, &json!(1)).await;
        manager.clear().await;
    }

    let backend = FileBackend::open(&path).unwrap();
    assert!(backend.is_empty());
}

#[tokio::test]
async fn test_foreign_keys_left_alone() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    FileBackend::open(&path)
        .unwrap()
        .set_item("other_app:setting", "on")
        .unwrap();

    let manager = open_manager(&path);
    manager.set_by_url(MAP_URL, &json!(1)).await;
    manager.clear().await;

    let backend = FileBackend::open(&path).unwrap();
    assert_eq!(backend.keys(), vec!["other_app:setting".to_string()]);
}

#[tokio::test]
async fn test_expired_entry_dropped_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    let key = "enhanced_jma:map:20240101120000";

    FileBackend::open(&path)
        .unwrap()
        .set_item(
            key,
            &json!({ "data": 1, "timestamp": 1_000, "ttl": 60_000 }).to_string(),
        )
        .unwrap();

    let manager = open_manager(&path);
    assert!(!manager.has(key).await);
    assert_eq!(manager.cleanup().await, 1);

    let backend = FileBackend::open(&path).unwrap();
    assert!(backend.is_empty());
}

#[tokio::test]
async fn test_polluted_record_is_sanitized() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    let key = "enhanced_jma:map:polluted";
    let record = r#"{"data":{"ok":1,"__proto__":{"admin":true},"nested":{"constructor":{}}},"timestamp":1,"ttl":0}"#;
    FileBackend::open(&path).unwrap().set_item(key, record).unwrap();

    let manager = open_manager(&path);
    let value: Option<Value> = manager.get(key).await;

    assert_eq!(value, Some(json!({ "ok": 1, "nested": {} })));
}

#[tokio::test]
async fn test_disabled_policy_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");

    let manager = open_manager(&path);
    manager
        .set("enhanced_jma:map:skip", &json!(1), Some(TtlPolicy::NoCache))
        .await;

    let backend = FileBackend::open(&path).unwrap();
    assert!(backend.is_empty());
}

// == Fetch Client Tests ==

#[tokio::test]
async fn test_fetchers_share_one_manager() {
    let dir = tempfile::tempdir().unwrap();
    let at = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();

    let mut transport = CountingTransport::default();
    transport.bodies.insert(
        point_url_at("44132", at),
        json!({ "20240101120000": { "temp": [9.8, 0], "humidity": [41, 0] } }).to_string(),
    );
    transport.bodies.insert(
        map_url_at(at),
        json!({ "44132": { "temp": [9.8, 0], "humidity": [41, 0] } }).to_string(),
    );
    let transport = Arc::new(transport);

    let cache = Arc::new(open_manager(&dir.path().join("cache.json")));
    let points = PointFetcher::new(cache.clone(), transport.clone());
    let maps = MapFetcher::new(cache.clone(), transport.clone());

    let observation = points.fetch("44132", at).await.unwrap();
    let stations = maps.fetch(at).await.unwrap();
    points.fetch("44132", at).await.unwrap();
    maps.fetch(at).await.unwrap();

    assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    assert_eq!(observation.temperature, Some(9.8));
    assert_eq!(stations["44132"], observation);
    assert_eq!(cache.get_stats().await.storage_entries, 2);
}

#[tokio::test]
async fn test_cache_survives_process_restart_for_fetcher() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    let at = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(12, 10, 0)
        .unwrap();

    let mut transport = CountingTransport::default();
    transport.bodies.insert(
        point_url_at("44132", at),
        json!({ "20240101121000": { "temp": [9.5, 0], "humidity": [43, 0] } }).to_string(),
    );
    let transport = Arc::new(transport);

    {
        let cache = Arc::new(open_manager(&path));
        PointFetcher::new(cache, transport.clone())
            .fetch("44132", at)
            .await
            .unwrap();
    }

    let cache = Arc::new(open_manager(&path));
    let observation = PointFetcher::new(cache, transport.clone())
        .fetch("44132", at)
        .await
        .unwrap();

    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    assert_eq!(observation.humidity, Some(43.0));
}
