// Viewer state machine.
// Tracks the open item and image, drives fetches and preloads, and reports to the presenter.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::blog::{FeedItem, PostRecord};
use crate::config::Config;
use crate::feed::{FeedIndex, LoadOutcome, PaginationLoader, PreloadScheduler};
use crate::fetch::{ContentFetcher, ImageWarmer, TaskHandle, spawn_best_effort};

use super::history::DrawerContent;

/// Lifecycle of the viewer overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Closed,
    Opening { id: String },
    /// `loading` is set while a neighboring item is being fetched.
    Open { loading: bool },
    Closing,
}

/// The item and image currently shown. Reset on close.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerSession {
    pub active_item_id: Option<String>,
    pub active_image_index: usize,
    pub open: bool,
}

/// The presentation layer's side of the viewer. Every call is a notification.
pub trait Presenter: Send + Sync {
    fn show_loading(&self) {}
    fn hide_loading(&self) {}
    fn render(&self, _item: &FeedItem, _record: &PostRecord, _image_index: usize) {}
    fn show_image(&self, _index: usize, _url: &str) {}
    fn notify_no_images(&self, _item: &FeedItem) {}
    fn closed(&self) {}
    fn open_drawer(&self, _content: &DrawerContent) {}
    fn close_drawer(&self) {}
}

/// Presenter that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPresenter;

impl Presenter for NullPresenter {}

/// Result of a viewer operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Not legal in the current phase, or nothing to move to.
    Ignored,
    Opened { id: String, images: usize },
    /// Opened, but the post has no images.
    NoImages { id: String },
    /// The data arrived after the viewer moved on or closed.
    Discarded,
    ImageChanged { index: usize },
    Closed,
}

struct Inner {
    phase: Phase,
    session: ViewerSession,
    item: Option<FeedItem>,
    record: Option<PostRecord>,
    /// Target of an item navigation that has not settled yet.
    pending: Option<String>,
    /// Bumped by every transition that supersedes pending loads.
    generation: u64,
    tasks: Vec<TaskHandle>,
}

pub struct ViewerState {
    fetcher: Arc<ContentFetcher>,
    warmer: Arc<ImageWarmer>,
    preload: Arc<PreloadScheduler>,
    pager: Arc<PaginationLoader>,
    index: Arc<FeedIndex>,
    presenter: Arc<dyn Presenter>,
    load_more_threshold: usize,
    wraparound: bool,
    inner: Mutex<Inner>,
}

impl ViewerState {
    pub fn new(
        fetcher: Arc<ContentFetcher>,
        warmer: Arc<ImageWarmer>,
        preload: Arc<PreloadScheduler>,
        pager: Arc<PaginationLoader>,
        index: Arc<FeedIndex>,
        presenter: Arc<dyn Presenter>,
        config: &Config,
    ) -> Self {
        Self {
            fetcher,
            warmer,
            preload,
            pager,
            index,
            presenter,
            load_more_threshold: config.load_more_threshold,
            wraparound: config.image_wraparound,
            inner: Mutex::new(Inner {
                phase: Phase::Closed,
                session: ViewerSession::default(),
                item: None,
                record: None,
                pending: None,
                generation: 0,
                tasks: Vec::new(),
            }),
        }
    }

    pub fn phase(&self) -> Phase {
        self.inner.lock().phase.clone()
    }

    pub fn is_open(&self) -> bool {
        matches!(self.inner.lock().phase, Phase::Open { .. })
    }

    pub fn snapshot(&self) -> ViewerSession {
        self.inner.lock().session.clone()
    }

    pub fn active_item(&self) -> Option<FeedItem> {
        self.inner.lock().item.clone()
    }

    pub fn active_record(&self) -> Option<PostRecord> {
        self.inner.lock().record.clone()
    }

    /// Background work started by transitions so far. Unclaimed handles are detached on close.
    pub fn take_tasks(&self) -> Vec<TaskHandle> {
        std::mem::take(&mut self.inner.lock().tasks)
    }

    /// Open the viewer on `id`. Only legal while closed.
    pub async fn open(&self, id: &str) -> Transition {
        let (item, generation) = {
            let mut inner = self.inner.lock();
            if inner.phase != Phase::Closed {
                debug!(url = %id, phase = ?inner.phase, "open ignored");
                return Transition::Ignored;
            }
            let Some(item) = self.index.get(id) else {
                warn!(url = %id, "open requested for unknown item");
                return Transition::Ignored;
            };
            inner.generation += 1;
            inner.pending = None;
            inner.phase = Phase::Opening { id: id.to_string() };
            (item, inner.generation)
        };
        info!(url = %id, "opening viewer");
        self.load_item(item, generation).await
    }

    /// Move to the item `delta` positions away.
    ///
    /// Counts from the target of a navigation still in flight, so repeated swipes
    /// each advance one item.
    pub async fn navigate_item(&self, delta: isize) -> Transition {
        let (item, generation) = {
            let mut inner = self.inner.lock();
            if !matches!(inner.phase, Phase::Open { .. }) {
                return Transition::Ignored;
            }
            let current = inner
                .pending
                .clone()
                .or_else(|| inner.session.active_item_id.clone());
            let Some(current) = current else {
                return Transition::Ignored;
            };
            let Some(target) = self.index.neighbor(&current, delta) else {
                debug!(url = %current, delta, "no item to navigate to");
                return Transition::Ignored;
            };
            inner.generation += 1;
            inner.pending = Some(target.id.clone());
            inner.phase = Phase::Open {
                loading: !self.fetcher.is_cached(&target.id),
            };
            (target, inner.generation)
        };
        self.load_item(item, generation).await
    }

    /// Move `delta` images within the active item.
    pub fn navigate_image(&self, delta: isize) -> Transition {
        let (index, images) = {
            let mut inner = self.inner.lock();
            if !matches!(inner.phase, Phase::Open { .. }) {
                return Transition::Ignored;
            }
            let Some(images) = inner.record.as_ref().map(|r| r.images.clone()) else {
                return Transition::Ignored;
            };
            if images.is_empty() {
                return Transition::Ignored;
            }
            let current = inner.session.active_image_index;
            let next = step(current, delta, images.len(), self.wraps(images.len()));
            if next == current {
                return Transition::Ignored;
            }
            inner.session.active_image_index = next;
            (next, images)
        };

        self.presenter.show_image(index, &images[index]);
        let tasks = self.warm_around(&images, index);
        self.track(tasks);
        Transition::ImageChanged { index }
    }

    /// Close the overlay. In-flight loads run to completion and their results are dropped.
    pub fn close(&self) -> Transition {
        let detached = {
            let mut inner = self.inner.lock();
            if !matches!(inner.phase, Phase::Opening { .. } | Phase::Open { .. }) {
                return Transition::Ignored;
            }
            inner.phase = Phase::Closing;
            inner.generation += 1;
            inner.session = ViewerSession::default();
            inner.item = None;
            inner.record = None;
            inner.pending = None;
            let detached = std::mem::take(&mut inner.tasks);
            inner.phase = Phase::Closed;
            detached
        };
        debug!(detached = detached.len(), "viewer closed");
        drop(detached);

        self.preload.clear_window();
        self.presenter.closed();
        Transition::Closed
    }

    /// Drop the active item's cached record and show it again from the network.
    pub async fn reload_active(&self) -> Transition {
        let (item, generation) = {
            let mut inner = self.inner.lock();
            if !matches!(inner.phase, Phase::Open { .. }) {
                return Transition::Ignored;
            }
            let Some(item) = inner.item.clone() else {
                return Transition::Ignored;
            };
            inner.generation += 1;
            inner.pending = None;
            inner.phase = Phase::Open { loading: true };
            (item, inner.generation)
        };
        info!(url = %item.id, "reloading post");
        self.presenter.show_loading();
        let record = self.fetcher.reload(&item.id).await;
        self.presenter.hide_loading();
        self.settle(item, record, generation)
    }

    async fn load_item(&self, item: FeedItem, generation: u64) -> Transition {
        let cached = self.fetcher.is_cached(&item.id);
        if !cached {
            self.presenter.show_loading();
        }
        let record = self.fetcher.fetch(&item.id).await;
        if !cached {
            self.presenter.hide_loading();
        }
        self.settle(item, record, generation)
    }

    fn settle(&self, item: FeedItem, record: PostRecord, generation: u64) -> Transition {
        {
            let mut inner = self.inner.lock();
            let live = inner.generation == generation
                && matches!(inner.phase, Phase::Opening { .. } | Phase::Open { .. });
            if !live {
                debug!(url = %item.id, "discarding superseded post data");
                return Transition::Discarded;
            }
            inner.phase = Phase::Open { loading: false };
            inner.pending = None;
            inner.session = ViewerSession {
                active_item_id: Some(item.id.clone()),
                active_image_index: 0,
                open: true,
            };
            inner.item = Some(item.clone());
            inner.record = Some(record.clone());
        }

        let mut tasks = self.preload.preload_neighbors(&item);
        tasks.extend(self.maybe_load_more(&item));
        tasks.extend(self.warm_around(&record.images, 0));
        self.track(tasks);

        if record.has_images() {
            info!(url = %item.id, images = record.images.len(), "viewer showing post");
            self.presenter.render(&item, &record, 0);
            Transition::Opened {
                id: item.id,
                images: record.images.len(),
            }
        } else {
            warn!(url = %item.id, "no images found");
            self.presenter.notify_no_images(&item);
            Transition::NoImages { id: item.id }
        }
    }

    /// Ask for the next listing page when `item` is near the end of the known feed.
    fn maybe_load_more(&self, item: &FeedItem) -> Option<TaskHandle> {
        let remaining = self.index.len().saturating_sub(item.position + 1);
        if remaining > self.load_more_threshold || !self.pager.has_more() || self.pager.is_busy() {
            return None;
        }
        debug!(url = %item.id, remaining, "near end of feed, loading more");
        let pager = self.pager.clone();
        Some(spawn_best_effort("load more", async move {
            match pager.load_more().await {
                LoadOutcome::Failed(e) => Err(e),
                _ => Ok(()),
            }
        }))
    }

    /// Warm the image at `index` and the ones either side of it.
    fn warm_around(&self, images: &[String], index: usize) -> Vec<TaskHandle> {
        let len = images.len();
        if index >= len {
            return Vec::new();
        }
        let wraps = self.wraps(len);
        let mut targets = vec![index];
        if index + 1 < len {
            targets.push(index + 1);
        } else if wraps {
            targets.push(0);
        }
        if index > 0 {
            targets.push(index - 1);
        } else if wraps {
            targets.push(len - 1);
        }
        targets
            .into_iter()
            .filter_map(|i| self.warmer.warm(&images[i]))
            .collect()
    }

    fn wraps(&self, len: usize) -> bool {
        self.wraparound && len > 1
    }

    fn track(&self, tasks: Vec<TaskHandle>) {
        if tasks.is_empty() {
            return;
        }
        let mut inner = self.inner.lock();
        inner.tasks.retain(|task| !task.is_finished());
        inner.tasks.extend(tasks);
    }
}

/// Image index after moving `delta` from `current` among `len` images.
fn step(current: usize, delta: isize, len: usize, wrap: bool) -> usize {
    let target = current as isize + delta;
    let len = len as isize;
    if wrap {
        target.rem_euclid(len) as usize
    } else {
        target.clamp(0, len - 1) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blog::{ContentExtractor, ListingEntry};
    use crate::cache::{MemoryCache, PostCache};
    use crate::fetch::join_all;
    use crate::test_helpers::{RecordingPresenter, ScriptedTransport, listing_html, post_html};
    use std::time::Duration;

    fn url(n: usize) -> String {
        format!("https://blog.example/p{n}")
    }

    struct Fixture {
        viewer: ViewerState,
        transport: Arc<ScriptedTransport>,
        presenter: Arc<RecordingPresenter>,
        index: Arc<FeedIndex>,
        pager: Arc<PaginationLoader>,
    }

    fn fixture(count: usize, config: Config) -> Fixture {
        let transport = Arc::new(ScriptedTransport::new());
        for n in 0..count {
            let images: Vec<String> = (0..3).map(|i| format!("https://img.example/{n}-{i}.jpg")).collect();
            let refs: Vec<&str> = images.iter().map(String::as_str).collect();
            transport.set_page(&url(n), post_html(&refs));
        }
        let index = Arc::new(FeedIndex::new());
        index.append(
            (0..count)
                .map(|n| ListingEntry {
                    id: url(n),
                    fragment: String::new(),
                })
                .collect(),
        );
        let cache: Arc<dyn PostCache<PostRecord>> = Arc::new(MemoryCache::new(20));
        let fetcher = Arc::new(ContentFetcher::new(transport.clone(), cache, ContentExtractor::new()));
        let warmer = Arc::new(ImageWarmer::new(transport.clone()));
        let preload = Arc::new(PreloadScheduler::new(fetcher.clone(), warmer.clone(), index.clone(), &config));
        let pager = Arc::new(PaginationLoader::new(transport.clone(), index.clone(), &config));
        let presenter = Arc::new(RecordingPresenter::default());
        let viewer = ViewerState::new(
            fetcher,
            warmer,
            preload,
            pager.clone(),
            index.clone(),
            presenter.clone(),
            &config,
        );
        Fixture {
            viewer,
            transport,
            presenter,
            index,
            pager,
        }
    }

    #[tokio::test]
    async fn open_shows_loading_only_when_uncached() {
        let f = fixture(3, Config::default());

        let opened = f.viewer.open(&url(0)).await;
        assert_eq!(opened, Transition::Opened { id: url(0), images: 3 });
        assert_eq!(f.presenter.events(), vec!["loading", "loaded", "render 0"]);
        assert_eq!(
            f.viewer.snapshot(),
            ViewerSession {
                active_item_id: Some(url(0)),
                active_image_index: 0,
                open: true
            }
        );

        join_all(f.viewer.take_tasks()).await;
        f.presenter.clear();

        // p1 was preloaded, so no loading indicator this time.
        let moved = f.viewer.navigate_item(1).await;
        assert_eq!(moved, Transition::Opened { id: url(1), images: 3 });
        assert_eq!(f.presenter.events(), vec!["render 0"]);
        assert_eq!(f.transport.hits(&url(1)), 1);
    }

    #[tokio::test]
    async fn illegal_transitions_are_ignored() {
        let f = fixture(2, Config::default());

        assert_eq!(f.viewer.navigate_item(1).await, Transition::Ignored);
        assert_eq!(f.viewer.navigate_image(1), Transition::Ignored);
        assert_eq!(f.viewer.close(), Transition::Ignored);

        f.viewer.open(&url(0)).await;
        assert_eq!(f.viewer.open(&url(1)).await, Transition::Ignored);
        assert_eq!(f.viewer.navigate_item(-1).await, Transition::Ignored);
        assert_eq!(f.viewer.snapshot().active_item_id, Some(url(0)));
    }

    #[tokio::test]
    async fn image_navigation_wraps_when_enabled() {
        let f = fixture(1, Config::default());
        f.viewer.open(&url(0)).await;

        assert_eq!(f.viewer.navigate_image(-1), Transition::ImageChanged { index: 2 });
        assert_eq!(f.viewer.navigate_image(1), Transition::ImageChanged { index: 0 });
        assert!(f.presenter.events().contains(&"image 2".to_string()));
    }

    #[tokio::test]
    async fn image_navigation_clamps_without_wraparound() {
        let config = Config {
            image_wraparound: false,
            ..Config::default()
        };
        let f = fixture(1, config);
        f.viewer.open(&url(0)).await;

        assert_eq!(f.viewer.navigate_image(-1), Transition::Ignored);
        assert_eq!(f.viewer.navigate_image(5), Transition::ImageChanged { index: 2 });
        assert_eq!(f.viewer.navigate_image(1), Transition::Ignored);
        assert_eq!(f.viewer.snapshot().active_image_index, 2);
    }

    #[test]
    fn step_clamps_or_wraps() {
        assert_eq!(step(0, 1, 1, false), 0);
        assert_eq!(step(0, -1, 3, true), 2);
        assert_eq!(step(2, 1, 3, false), 2);
    }

    #[tokio::test]
    async fn no_images_still_opens() {
        let f = fixture(1, Config::default());
        f.transport.set_page(&url(0), "<html><body><div class=\"post-body\">text</div></body></html>");

        assert_eq!(f.viewer.open(&url(0)).await, Transition::NoImages { id: url(0) });
        assert!(f.viewer.is_open());
        assert!(f.presenter.events().contains(&"no images".to_string()));
    }

    #[tokio::test]
    async fn close_during_open_discards_result() {
        let f = fixture(2, Config::default());
        f.transport.set_delay(Duration::from_millis(50));

        let id = url(0);
        let (opened, closed) = tokio::join!(f.viewer.open(&id), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            f.viewer.close()
        });
        assert_eq!(closed, Transition::Closed);
        assert_eq!(opened, Transition::Discarded);
        assert_eq!(f.viewer.phase(), Phase::Closed);
        assert_eq!(f.viewer.snapshot(), ViewerSession::default());
    }

    #[tokio::test]
    async fn repeated_swipes_advance_from_pending_target() {
        let f = fixture(9, Config::default());
        f.viewer.open(&url(5)).await;
        f.transport.set_delay(Duration::from_millis(100));

        let (first, second) = tokio::join!(f.viewer.navigate_item(1), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            f.viewer.navigate_item(1).await
        });
        assert_eq!(first, Transition::Discarded);
        assert_eq!(second, Transition::Opened { id: url(7), images: 3 });
        assert_eq!(f.viewer.snapshot().active_item_id, Some(url(7)));
    }

    #[tokio::test]
    async fn uncached_neighbor_sets_loading_phase() {
        let f = fixture(6, Config::default());
        f.viewer.open(&url(0)).await;
        f.transport.set_delay(Duration::from_millis(50));
        f.presenter.clear();

        let (moved, during) = tokio::join!(f.viewer.navigate_item(1), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            f.viewer.phase()
        });
        assert_eq!(during, Phase::Open { loading: true });
        assert_eq!(moved, Transition::Opened { id: url(1), images: 3 });
        assert_eq!(f.viewer.phase(), Phase::Open { loading: false });
        assert_eq!(f.presenter.events()[..2], ["loading", "loaded"]);
    }

    #[tokio::test]
    async fn nearing_the_end_loads_more() {
        let f = fixture(4, Config::default());
        let next = "https://blog.example/page2";
        f.pager.set_next_page_url(Some(next.to_string()));
        f.transport.set_page(next, listing_html(&["https://blog.example/p9"], None));

        f.viewer.open(&url(0)).await;
        join_all(f.viewer.take_tasks()).await;
        assert_eq!(f.transport.hits(next), 0);

        f.viewer.navigate_item(1).await;
        join_all(f.viewer.take_tasks()).await;
        assert_eq!(f.transport.hits(next), 1);
        assert_eq!(f.index.len(), 5);
    }
}
