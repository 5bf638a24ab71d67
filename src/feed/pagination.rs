// Pagination loader.
// Follows the listing's "older posts" cursor and merges new entries into the feed index.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::blog::{Transport, parse_listing};
use crate::config::Config;

use super::index::FeedIndex;

/// Result of one `load_more` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Nothing to do: no cursor, or a load is already running.
    Skipped,
    Loaded {
        added: usize,
        next_page_url: Option<String>,
    },
    /// The fetch failed; the cursor is unchanged.
    Failed(String),
}

#[derive(Debug, Default)]
struct PagerState {
    next_page_url: Option<String>,
    busy: bool,
}

/// Clears the busy flag however the load ends.
struct BusyGuard<'a>(&'a Mutex<PagerState>);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.lock().busy = false;
    }
}

pub struct PaginationLoader {
    transport: Arc<dyn Transport>,
    index: Arc<FeedIndex>,
    state: Mutex<PagerState>,
    scroll_trigger_px: f64,
}

impl PaginationLoader {
    pub fn new(transport: Arc<dyn Transport>, index: Arc<FeedIndex>, config: &Config) -> Self {
        Self {
            transport,
            index,
            state: Mutex::new(PagerState::default()),
            scroll_trigger_px: config.scroll_trigger_px,
        }
    }

    /// Load the first listing page at `url`.
    pub async fn bootstrap(&self, url: &str) -> LoadOutcome {
        {
            let mut state = self.state.lock();
            if state.busy {
                return LoadOutcome::Skipped;
            }
            state.next_page_url = Some(url.to_string());
        }
        self.load_more().await
    }

    /// Point the cursor at a page the host has already discovered.
    pub fn set_next_page_url(&self, url: Option<String>) {
        self.state.lock().next_page_url = url;
    }

    pub fn next_page_url(&self) -> Option<String> {
        self.state.lock().next_page_url.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.state.lock().busy
    }

    pub fn has_more(&self) -> bool {
        self.state.lock().next_page_url.is_some()
    }

    /// Fetch the next listing page. At most one fetch runs at a time.
    pub async fn load_more(&self) -> LoadOutcome {
        let url = {
            let mut state = self.state.lock();
            if state.busy {
                debug!("pagination already running");
                return LoadOutcome::Skipped;
            }
            let Some(url) = state.next_page_url.clone() else {
                return LoadOutcome::Skipped;
            };
            state.busy = true;
            url
        };
        let _busy = BusyGuard(&self.state);

        info!(url = %url, "loading next listing page");
        match self.transport.fetch_text(&url).await {
            Ok(html) => {
                let base = Url::parse(&url).ok();
                let page = parse_listing(&html, base.as_ref());
                let added = self.index.append(page.entries);
                self.state.lock().next_page_url = page.next_page_url.clone();
                info!(
                    added = added.len(),
                    next = page.next_page_url.as_deref().unwrap_or("none"),
                    "listing page loaded"
                );
                LoadOutcome::Loaded {
                    added: added.len(),
                    next_page_url: page.next_page_url,
                }
            }
            Err(e) => {
                warn!(url = %url, error = %e, "loading listing page failed");
                LoadOutcome::Failed(e.to_string())
            }
        }
    }

    /// Whether the scroll position is within the trigger distance of the document bottom.
    pub fn near_bottom(&self, scroll_y: f64, viewport_height: f64, document_height: f64) -> bool {
        scroll_y + viewport_height >= document_height - self.scroll_trigger_px
    }
}
