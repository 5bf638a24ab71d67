// Persistent store for cached post records.
// Self-describing JSON envelopes (schema version + timestamp) kept one file per key.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{FeedError, Result};

use super::paths::{entry_path, is_entry_file};

/// Wrapper written for every persisted value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Schema version the value was written under.
    pub version: String,
    /// Write time, epoch milliseconds.
    pub timestamp: i64,
    pub data: T,
}

impl<T> Envelope<T> {
    /// Create an envelope stamped with the current time.
    pub fn new(version: impl Into<String>, data: T) -> Self {
        Self {
            version: version.into(),
            timestamp: Utc::now().timestamp_millis(),
            data,
        }
    }

    pub fn age(&self) -> Duration {
        age_since(self.timestamp)
    }

    /// Check if this entry is at or past the freshness horizon.
    pub fn is_expired(&self, horizon: Duration) -> bool {
        self.age() >= horizon
    }

    /// Check if this entry can be served: same schema and still fresh.
    pub fn is_current(&self, version: &str, horizon: Duration) -> bool {
        self.version == version && !self.is_expired(horizon)
    }
}

/// Timestamp-only view of an envelope, readable whatever the payload type.
#[derive(Deserialize)]
struct EnvelopeHeader {
    timestamp: i64,
}

/// Age of a raw persisted envelope, or None if it is not one.
pub fn envelope_age(raw: &str) -> Option<Duration> {
    serde_json::from_str::<EnvelopeHeader>(raw)
        .ok()
        .map(|header| age_since(header.timestamp))
}

fn age_since(timestamp_ms: i64) -> Duration {
    let elapsed = Utc::now().timestamp_millis().saturating_sub(timestamp_ms);
    Duration::from_millis(elapsed.max(0) as u64)
}

/// Key-value store that survives restarts.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<String>>;

    async fn write(&self, key: &str, value: &str) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;

    /// Remove every entry for which `keep` returns false. Returns how many were removed.
    async fn retain(&self, keep: &(dyn for<'k> Fn(&'k str) -> bool + Send + Sync)) -> Result<usize>;
}

/// Filesystem-backed store: one JSON file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    prefix: String,
    /// Total bytes the store may hold (None = unlimited).
    quota: Option<u64>,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, quota: Option<u64>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            quota,
        }
    }

    fn path(&self, key: &str) -> PathBuf {
        entry_path(&self.dir, &self.prefix, key)
    }

    /// Entry files currently in the store.
    async fn entry_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut dir = match fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name();
            if name
                .to_str()
                .is_some_and(|name| is_entry_file(name, &self.prefix))
            {
                files.push(entry.path());
            }
        }
        Ok(files)
    }

    /// Bytes used by all entries except `skip`.
    async fn used_bytes(&self, skip: &Path) -> Result<u64> {
        let mut used = 0;
        for path in self.entry_files().await? {
            if path == skip {
                continue;
            }
            if let Ok(meta) = fs::metadata(&path).await {
                used += meta.len();
            }
        }
        Ok(used)
    }
}

#[async_trait]
impl PersistentStore for FileStore {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.path(key);

        if let Some(quota) = self.quota {
            let used = self.used_bytes(&path).await? + value.len() as u64;
            if used > quota {
                return Err(FeedError::QuotaExceeded { used, quota });
            }
        }

        // Write atomically via temp file
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, value.as_bytes()).await?;
        fs::rename(&temp_path, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn retain(&self, keep: &(dyn for<'k> Fn(&'k str) -> bool + Send + Sync)) -> Result<usize> {
        let mut removed = 0;
        for path in self.entry_files().await? {
            let keep_entry = match fs::read_to_string(&path).await {
                Ok(contents) => keep(&contents),
                Err(_) => false,
            };
            if !keep_entry && fs::remove_file(&path).await.is_ok() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
