// Post content fetcher.
// Cache-first retrieval of post records, with concurrent requests for one URL coalesced.

use std::collections::HashMap;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tracing::{debug, warn};
use url::Url;

use crate::blog::{ContentExtractor, PostRecord, Transport};
use crate::cache::PostCache;

type PendingFetch = Shared<BoxFuture<'static, Option<PostRecord>>>;

/// Fetches post pages and turns them into cached records.
pub struct ContentFetcher {
    transport: Arc<dyn Transport>,
    cache: Arc<dyn PostCache<PostRecord>>,
    extractor: Arc<ContentExtractor>,
    pending: Arc<Mutex<HashMap<String, PendingFetch>>>,
}

impl ContentFetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        cache: Arc<dyn PostCache<PostRecord>>,
        extractor: ContentExtractor,
    ) -> Self {
        Self {
            transport,
            cache,
            extractor: Arc::new(extractor),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn cache(&self) -> &Arc<dyn PostCache<PostRecord>> {
        &self.cache
    }

    /// Whether `id` can be served from memory without I/O.
    pub fn is_cached(&self, id: &str) -> bool {
        self.cache.contains(id)
    }

    /// Fetch the record for `id`. Failures yield the empty record and are not cached.
    pub async fn fetch(&self, id: &str) -> PostRecord {
        self.try_fetch(id).await.unwrap_or_else(PostRecord::empty)
    }

    /// Fetch the record for `id`, or None if the page could not be retrieved.
    pub async fn try_fetch(&self, id: &str) -> Option<PostRecord> {
        if let Some(record) = self.cache.get(id).await {
            debug!(url = %id, "post data from cache");
            return Some(record);
        }
        self.join_or_start(id).await
    }

    /// Drop any cached copy of `id` and fetch it again.
    pub async fn reload(&self, id: &str) -> PostRecord {
        self.cache.invalidate(id).await;
        self.fetch(id).await
    }

    /// Number of network fetches currently in flight.
    pub fn in_flight(&self) -> usize {
        self.pending.lock().len()
    }

    fn join_or_start(&self, id: &str) -> PendingFetch {
        let mut pending = self.pending.lock();
        if let Some(existing) = pending.get(id) {
            debug!(url = %id, "joining in-flight fetch");
            return existing.clone();
        }

        // The load runs as its own task so it completes even if every caller goes away.
        let load = tokio::spawn(load(
            self.transport.clone(),
            self.cache.clone(),
            self.extractor.clone(),
            self.pending.clone(),
            id.to_string(),
        ));
        let shared = async move { load.await.ok().flatten() }.boxed().shared();
        pending.insert(id.to_string(), shared.clone());
        shared
    }
}

async fn load(
    transport: Arc<dyn Transport>,
    cache: Arc<dyn PostCache<PostRecord>>,
    extractor: Arc<ContentExtractor>,
    pending: Arc<Mutex<HashMap<String, PendingFetch>>>,
    id: String,
) -> Option<PostRecord> {
    debug!(url = %id, "fetching post data");
    let result = match transport.fetch_text(&id).await {
        Ok(html) => {
            let base = Url::parse(&id).ok();
            let record = extractor.extract(&html, base.as_ref());
            cache.set(&id, record.clone()).await;
            debug!(url = %id, images = record.images.len(), "post data fetched");
            Some(record)
        }
        Err(e) => {
            warn!(url = %id, error = %e, "fetch post data failed");
            None
        }
    };
    pending.lock().remove(&id);
    result
}
