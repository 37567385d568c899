//! On-disk cache of the relay list.
//!
//! The relay directory changes rarely, so the list is fetched at most once
//! every [DEFAULT_TTL] and otherwise read back from disk. A cache file that is
//! missing, stale or unreadable is simply replaced by a fresh download.

use std::{
    path::{Path, PathBuf},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

use crate::{
    api::{self, Relay},
    error::Result,
};

pub const DEFAULT_TTL: Duration = Duration::from_secs(12 * 60 * 60);

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize, Deserialize, Debug)]
struct CacheFile {
    /// Seconds since the unix epoch.
    fetched_at: u64,
    relays: Vec<serde_json::Value>,
}

pub fn default_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("mulping")
        .join("relays.json")
}

#[derive(Debug, Clone)]
pub struct RelayCache {
    pub url: String,
    pub path: PathBuf,
    pub ttl: Duration,
}

impl RelayCache {
    pub fn new(url: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            path: path.into(),
            ttl: DEFAULT_TTL,
        }
    }

    /// Get the relay list, from disk if the cache is fresh and from the API
    /// otherwise.
    pub async fn load(&self, refresh: bool) -> Result<Vec<Relay>> {
        if !refresh {
            if let Some(relays) = self.read_fresh(now()).await {
                return Ok(relays);
            }
        }

        eprint!("Fetching relays... ");
        let values = self.fetch().await?;
        eprintln!("done!");

        if let Err(e) = self.write(&values).await {
            tracing::warn!(path = %self.path.display(), "Failed to write relay cache: {e}");
        }

        Ok(api::relays_from_values(values))
    }

    async fn read_fresh(&self, now: u64) -> Option<Vec<Relay>> {
        let path = self.path.display();
        let data = tokio::fs::read(&self.path)
            .await
            .inspect_err(|e| tracing::debug!(%path, "No usable relay cache: {e}"))
            .ok()?;
        let cache: CacheFile = serde_json::from_slice(&data)
            .inspect_err(|e| tracing::warn!(%path, "Ignoring corrupt relay cache: {e}"))
            .ok()?;

        if now.saturating_sub(cache.fetched_at) >= self.ttl.as_secs() {
            tracing::debug!(%path, fetched_at = cache.fetched_at, "Relay cache is stale");
            return None;
        }

        Some(api::relays_from_values(cache.relays))
    }

    async fn fetch(&self) -> Result<Vec<serde_json::Value>> {
        tracing::info!(url = %self.url, "Fetching relay list");
        let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        let values = client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<serde_json::Value>>()
            .await?;
        Ok(values)
    }

    async fn write(&self, values: &[serde_json::Value]) -> Result<()> {
        let cache = CacheFile {
            fetched_at: now(),
            relays: values.to_vec(),
        };
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        write_atomic(&self.path, &serde_json::to_vec(&cache)?).await
    }
}

async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, data).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
