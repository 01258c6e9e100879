//! jma-cache - command-line driver for the AMeDAS cache
//!
//! Fetches observations through a file-backed cache and exposes the cache
//! maintenance operations.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jma_cache::jma::{fetch_latest_time, HttpTransport, MapFetcher, PointFetcher, Transport};
use jma_cache::{CacheConfig, CacheManager, FileBackend};

/// Fetch JMA AMeDAS observations through a persistent cache
#[derive(Debug, Parser)]
#[command(name = "jma-cache", version)]
struct Cli {
    /// Path of the durable cache file
    #[arg(long, env = "JMA_CACHE_FILE", default_value = "./jma_cache.json")]
    store: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Observation of one station
    Point {
        /// Station code (amdno), e.g. 44132
        code: String,
        /// JST time on a 10 minute boundary, e.g. 2024-01-01T12:30 (default: latest)
        #[arg(long, value_parser = parse_at)]
        at: Option<NaiveDateTime>,
    },
    /// Observations of every station
    Map {
        /// JST time on a 10 minute boundary (default: latest)
        #[arg(long, value_parser = parse_at)]
        at: Option<NaiveDateTime>,
    },
    /// Show cache statistics
    Stats,
    /// Remove expired and corrupted entries
    Cleanup,
    /// Remove every cache entry
    Clear,
    /// Remove every point entry of one station
    ClearStation {
        /// Station code (amdno)
        code: String,
    },
}

fn parse_at(value: &str) -> std::result::Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|e| format!("expected YYYY-MM-DDTHH:MM: {e}"))
}

async fn resolve_time(at: Option<NaiveDateTime>, transport: &dyn Transport) -> Result<NaiveDateTime> {
    match at {
        Some(at) => Ok(at),
        None => {
            let latest = fetch_latest_time(transport)
                .await
                .context("Failed to read the latest observation time")?;
            Ok(latest.naive_local())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Defaults to "info" for this crate, can be overridden with RUST_LOG
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jma_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = CacheConfig::from_env();
    info!(
        "Configuration loaded: prefix={}, max_memory_entries={}, max_storage_size={}",
        config.storage_prefix, config.max_memory_entries, config.max_storage_size
    );

    let backend = FileBackend::open(&cli.store)
        .with_context(|| format!("Failed to open cache store {}", cli.store.display()))?;
    let cache = Arc::new(CacheManager::new(config, backend));
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::default());

    match cli.command {
        Command::Point { code, at } => {
            let at = resolve_time(at, transport.as_ref()).await?;
            let fetcher = PointFetcher::new(cache.clone(), transport);
            let observation = fetcher
                .fetch(&code, at)
                .await
                .with_context(|| format!("Failed to fetch station {code}"))?;
            print_json(&observation)?;
        }
        Command::Map { at } => {
            let at = resolve_time(at, transport.as_ref()).await?;
            let fetcher = MapFetcher::new(cache.clone(), transport);
            let stations = fetcher.fetch(at).await.context("Failed to fetch map data")?;
            print_json(&stations)?;
        }
        Command::Stats => print_json(&cache.get_stats().await)?,
        Command::Cleanup => {
            let removed = cache.cleanup().await;
            println!("Removed {removed} entries");
        }
        Command::Clear => {
            cache.clear().await;
            println!("Cache cleared");
        }
        Command::ClearStation { code } => {
            let removed = cache.clear_point_data(&code).await;
            println!("Removed {removed} entries for station {code}");
        }
    }

    Ok(())
}
