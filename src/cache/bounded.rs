// Bounded post cache.
// LRU-evicting in-memory store, optionally backed by the persistent store.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::config::{
    Config, DEFAULT_CACHE_VERSION, DEFAULT_FRESHNESS_HORIZON, DEFAULT_STORAGE_PREFIX,
};
use crate::error::{FeedError, Result};

use super::paths::store_key;
use super::store::{Envelope, FileStore, PersistentStore, envelope_age};

/// Cache capabilities shared by every post cache.
///
/// Returned values are snapshots: a later eviction never reaches a copy already handed out.
#[async_trait]
pub trait PostCache<V>: Send + Sync {
    /// Look up `key`, refreshing its recency on a hit.
    async fn get(&self, key: &str) -> Option<V>;

    /// Insert `value`, evicting the least recently used entry when full.
    async fn set(&self, key: &str, value: V);

    /// Drop `key` everywhere it is stored.
    async fn invalidate(&self, key: &str);

    /// Empty the in-memory store.
    async fn clear(&self);

    /// Whether `key` is held in memory. Does not touch recency.
    fn contains(&self, key: &str) -> bool;

    /// Number of entries held in memory.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An in-memory entry.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub stored_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    /// Position in the recency order; strictly increasing across accesses.
    tick: u64,
}

/// Capacity-bounded map with least-recently-used eviction.
///
/// Recency is kept as an ordered index of access ticks, so finding the eviction
/// victim does not scan the whole map.
#[derive(Debug)]
pub struct LruMap<V> {
    capacity: usize,
    entries: HashMap<String, CacheEntry<V>>,
    order: BTreeMap<u64, String>,
    next_tick: u64,
}

impl<V> LruMap<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_tick: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Look up `key` and mark it most recently used.
    pub fn get(&mut self, key: &str) -> Option<&CacheEntry<V>> {
        let tick = self.bump();
        let entry = self.entries.get_mut(key)?;
        self.order.remove(&entry.tick);
        self.order.insert(tick, key.to_string());
        entry.tick = tick;
        entry.last_accessed_at = Utc::now();
        Some(entry)
    }

    /// Look up `key` without changing its recency.
    pub fn peek(&self, key: &str) -> Option<&CacheEntry<V>> {
        self.entries.get(key)
    }

    /// Insert or replace `key`. Returns the key evicted to make room, if any.
    pub fn insert(&mut self, key: &str, value: V) -> Option<String> {
        let now = Utc::now();
        let tick = self.bump();

        if let Some(entry) = self.entries.get_mut(key) {
            self.order.remove(&entry.tick);
            self.order.insert(tick, key.to_string());
            entry.value = value;
            entry.stored_at = now;
            entry.last_accessed_at = now;
            entry.tick = tick;
            return None;
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.evict_oldest()
        } else {
            None
        };

        self.order.insert(tick, key.to_string());
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                stored_at: now,
                last_accessed_at: now,
                tick,
            },
        );
        evicted
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.tick);
        Some(entry.value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    /// Keys from least to most recently used.
    pub fn keys_by_recency(&self) -> Vec<String> {
        self.order.values().cloned().collect()
    }

    fn evict_oldest(&mut self) -> Option<String> {
        let (_, key) = self.order.pop_first()?;
        self.entries.remove(&key);
        Some(key)
    }

    fn bump(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }
}

/// Memory-only post cache.
#[derive(Debug)]
pub struct MemoryCache<V> {
    entries: Mutex<LruMap<V>>,
}

impl<V> MemoryCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(LruMap::new(capacity)),
        }
    }

    /// Keys from least to most recently used.
    pub fn keys_by_recency(&self) -> Vec<String> {
        self.entries.lock().keys_by_recency()
    }
}

#[async_trait]
impl<V> PostCache<V> for MemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Option<V> {
        self.entries.lock().get(key).map(|entry| entry.value.clone())
    }

    async fn set(&self, key: &str, value: V) {
        if let Some(evicted) = self.entries.lock().insert(key, value) {
            debug!(url = %evicted, "evicted from memory cache");
        }
    }

    async fn invalidate(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    async fn clear(&self) {
        self.entries.lock().clear();
    }

    fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains(key)
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// In-memory LRU with load-through and write-through to a persistent store.
pub struct TieredCache<V> {
    memory: Mutex<LruMap<V>>,
    store: Arc<dyn PersistentStore>,
    prefix: String,
    version: String,
    horizon: Duration,
}

impl<V> TieredCache<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(
        store: Arc<dyn PersistentStore>,
        capacity: usize,
        prefix: impl Into<String>,
        version: impl Into<String>,
        horizon: Duration,
    ) -> Self {
        Self {
            memory: Mutex::new(LruMap::new(capacity)),
            store,
            prefix: prefix.into(),
            version: version.into(),
            horizon,
        }
    }

    /// Build from configuration over a file store, sweeping stale entries first.
    pub async fn open(config: &Config) -> Result<Self> {
        let dir = config
            .storage_dir()
            .ok_or_else(|| FeedError::Other("no cache directory available".to_string()))?;
        let store = FileStore::new(dir, &config.storage_prefix, config.storage_quota_bytes);
        let cache = Self::new(
            Arc::new(store),
            config.cache_capacity,
            &config.storage_prefix,
            &config.cache_version,
            config.freshness_horizon(),
        );
        cache.sweep_expired().await;
        Ok(cache)
    }

    /// Remove persisted entries past the freshness horizon or unreadable.
    pub async fn sweep_expired(&self) -> usize {
        let horizon = self.horizon;
        let keep = move |raw: &str| envelope_age(raw).is_some_and(|age| age < horizon);
        match self.store.retain(&keep).await {
            Ok(removed) => {
                if removed > 0 {
                    debug!(removed, "swept stale persisted entries");
                }
                removed
            }
            Err(e) => {
                warn!(error = %e, "persistent store sweep failed");
                0
            }
        }
    }

    /// Keys held in memory, from least to most recently used.
    pub fn keys_by_recency(&self) -> Vec<String> {
        self.memory.lock().keys_by_recency()
    }

    async fn load_persisted(&self, key: &str) -> Option<V> {
        let store_key = store_key(&self.prefix, key);
        let raw = match self.store.read(&store_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                debug!(url = %key, error = %e, "persistent read failed");
                return None;
            }
        };

        match serde_json::from_str::<Envelope<V>>(&raw) {
            Ok(envelope) if envelope.is_current(&self.version, self.horizon) => {
                Some(envelope.data)
            }
            _ => {
                debug!(url = %key, "dropping stale persisted entry");
                if let Err(e) = self.store.remove(&store_key).await {
                    debug!(url = %key, error = %e, "failed to remove stale entry");
                }
                None
            }
        }
    }

    async fn persist(&self, key: &str, value: &V) -> Result<()> {
        let envelope = Envelope::new(self.version.clone(), value);
        let json = serde_json::to_string(&envelope)?;
        self.store
            .write(&store_key(&self.prefix, key), &json)
            .await
    }
}

#[async_trait]
impl<V> PostCache<V> for TieredCache<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Option<V> {
        if let Some(entry) = self.memory.lock().get(key) {
            return Some(entry.value.clone());
        }

        let value = self.load_persisted(key).await?;
        debug!(url = %key, "promoted persisted entry");
        if let Some(evicted) = self.memory.lock().insert(key, value.clone()) {
            debug!(url = %evicted, "evicted from memory cache");
        }
        Some(value)
    }

    async fn set(&self, key: &str, value: V) {
        if let Some(evicted) = self.memory.lock().insert(key, value.clone()) {
            debug!(url = %evicted, "evicted from memory cache");
        }

        if let Err(e) = self.persist(key, &value).await {
            warn!(url = %key, error = %e, "persistent write failed, sweeping stale entries");
            self.sweep_expired().await;
        }
    }

    async fn invalidate(&self, key: &str) {
        self.memory.lock().remove(key);
        if let Err(e) = self.store.remove(&store_key(&self.prefix, key)).await {
            debug!(url = %key, error = %e, "failed to remove persisted entry");
        }
    }

    /// Persisted entries are left to expire on their own.
    async fn clear(&self) {
        self.memory.lock().clear();
    }

    fn contains(&self, key: &str) -> bool {
        self.memory.lock().contains(key)
    }

    fn len(&self) -> usize {
        self.memory.lock().len()
    }
}

/// Default horizon and version, for callers building a cache without a Config.
pub fn tiered_with_defaults<V>(store: Arc<dyn PersistentStore>, capacity: usize) -> TieredCache<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    TieredCache::new(
        store,
        capacity,
        DEFAULT_STORAGE_PREFIX,
        DEFAULT_CACHE_VERSION,
        DEFAULT_FRESHNESS_HORIZON,
    )
}
