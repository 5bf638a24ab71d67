// Image warming.
// Requests images ahead of display and tracks their load status by URL.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::blog::Transport;
use crate::cache::LruMap;

use super::task::{TaskHandle, spawn_best_effort};

/// Load status of a warmed image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStatus {
    Loading,
    Loaded,
    Failed,
}

/// Image URLs whose status is remembered before the least recently touched is forgotten.
pub const DEFAULT_IMAGE_STATUS_CAPACITY: usize = 200;

/// Fires image requests so the platform cache holds them before they are shown.
pub struct ImageWarmer {
    transport: Arc<dyn Transport>,
    status: Arc<Mutex<LruMap<ImageStatus>>>,
}

impl ImageWarmer {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_capacity(transport, DEFAULT_IMAGE_STATUS_CAPACITY)
    }

    /// Warmer remembering at most `capacity` image statuses.
    pub fn with_capacity(transport: Arc<dyn Transport>, capacity: usize) -> Self {
        Self {
            transport,
            status: Arc::new(Mutex::new(LruMap::new(capacity))),
        }
    }

    /// Start warming `url`. Returns None when it is already loading or loaded.
    /// Failed images are retried.
    pub fn warm(&self, url: &str) -> Option<TaskHandle> {
        if url.is_empty() {
            return None;
        }
        {
            let mut status = self.status.lock();
            if matches!(
                status.peek(url).map(|entry| entry.value),
                Some(ImageStatus::Loading | ImageStatus::Loaded)
            ) {
                return None;
            }
            if let Some(forgotten) = status.insert(url, ImageStatus::Loading) {
                debug!(url = %forgotten, "image status evicted");
            }
        }

        let transport = self.transport.clone();
        let status = self.status.clone();
        let url = url.to_string();
        Some(spawn_best_effort(format!("warm {url}"), async move {
            let result = transport.fetch_bytes(&url).await;
            let outcome = if result.is_ok() {
                ImageStatus::Loaded
            } else {
                ImageStatus::Failed
            };
            debug!(url = %url, status = ?outcome, "image warmed");
            status.lock().insert(&url, outcome);
            result.map(|_| ())
        }))
    }

    /// Warm every URL in `urls`.
    pub fn warm_all<'a>(&self, urls: impl IntoIterator<Item = &'a str>) -> Vec<TaskHandle> {
        urls.into_iter().filter_map(|url| self.warm(url)).collect()
    }

    pub fn status(&self, url: &str) -> Option<ImageStatus> {
        self.status.lock().peek(url).map(|entry| entry.value)
    }

    /// Whether `url` finished loading and can be shown without a spinner.
    pub fn is_cached(&self, url: &str) -> bool {
        self.status(url) == Some(ImageStatus::Loaded)
    }
}
