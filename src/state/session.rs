// Feed session.
// Owns the cache, fetcher, pagination, preloading and viewer for one feed.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::blog::markup::text_content;
use crate::blog::{ContentExtractor, FeedItem, ListingPage, PostRecord, Transport};
use crate::cache::{PostCache, TieredCache};
use crate::config::Config;
use crate::error::Result;
use crate::feed::{FeedIndex, ItemBounds, LoadOutcome, PaginationLoader, PreloadScheduler, Viewport};
use crate::fetch::{ContentFetcher, ImageWarmer, TaskHandle};

use super::history::{BackStack, DrawerContent, DrawerKind, Layer};
use super::viewer::{Phase, Presenter, Transition, ViewerSession, ViewerState};

pub struct FeedSession {
    config: Config,
    index: Arc<FeedIndex>,
    fetcher: Arc<ContentFetcher>,
    warmer: Arc<ImageWarmer>,
    preload: Arc<PreloadScheduler>,
    pager: Arc<PaginationLoader>,
    viewer: ViewerState,
    presenter: Arc<dyn Presenter>,
    history: Mutex<BackStack>,
    tasks: Mutex<Vec<TaskHandle>>,
}

impl FeedSession {
    /// Build a session over the persistent file-backed cache described by `config`.
    pub async fn new(
        config: Config,
        transport: Arc<dyn Transport>,
        presenter: Arc<dyn Presenter>,
    ) -> Result<Self> {
        let cache = TieredCache::<PostRecord>::open(&config).await?;
        Ok(Self::with_cache(config, transport, Arc::new(cache), presenter))
    }

    /// Build a session over a caller-supplied cache.
    pub fn with_cache(
        config: Config,
        transport: Arc<dyn Transport>,
        cache: Arc<dyn PostCache<PostRecord>>,
        presenter: Arc<dyn Presenter>,
    ) -> Self {
        let index = Arc::new(FeedIndex::new());
        let fetcher = Arc::new(ContentFetcher::new(
            transport.clone(),
            cache,
            ContentExtractor::from_config(&config),
        ));
        let warmer = Arc::new(ImageWarmer::new(transport.clone()));
        let preload = Arc::new(PreloadScheduler::new(
            fetcher.clone(),
            warmer.clone(),
            index.clone(),
            &config,
        ));
        let pager = Arc::new(PaginationLoader::new(transport, index.clone(), &config));
        let viewer = ViewerState::new(
            fetcher.clone(),
            warmer.clone(),
            preload.clone(),
            pager.clone(),
            index.clone(),
            presenter.clone(),
            &config,
        );
        Self {
            config,
            index,
            fetcher,
            warmer,
            preload,
            pager,
            viewer,
            presenter,
            history: Mutex::new(BackStack::new()),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Load the first listing page and warm the leading items.
    pub async fn start(&self, listing_url: &str) -> LoadOutcome {
        let outcome = self.pager.bootstrap(listing_url).await;
        self.warm_start();
        outcome
    }

    /// Adopt a listing page the host already rendered, then warm the leading items.
    pub fn seed(&self, page: ListingPage) -> Vec<FeedItem> {
        let added = self.index.append(page.entries);
        self.pager.set_next_page_url(page.next_page_url);
        self.warm_start();
        added
    }

    fn warm_start(&self) {
        let tasks = self.preload.preload_initial();
        self.track(tasks);
    }

    pub async fn open(&self, id: &str) -> Transition {
        let transition = self.viewer.open(id).await;
        if matches!(transition, Transition::Opened { .. } | Transition::NoImages { .. }) {
            self.history.lock().push_viewer();
        }
        transition
    }

    pub async fn navigate_item(&self, delta: isize) -> Transition {
        self.viewer.navigate_item(delta).await
    }

    pub fn navigate_image(&self, delta: isize) -> Transition {
        self.viewer.navigate_image(delta)
    }

    pub async fn reload_active(&self) -> Transition {
        self.viewer.reload_active().await
    }

    /// Close the top overlay layer: the drawer if one is open, otherwise the viewer.
    pub fn back(&self) -> Option<Layer> {
        let layer = self.history.lock().pop();
        match layer {
            Some(Layer::Drawer(kind)) => {
                debug!(?kind, "back closes drawer");
                self.presenter.close_drawer();
            }
            Some(Layer::Viewer) => {
                debug!("back closes viewer");
                self.viewer.close();
            }
            None => {}
        }
        layer
    }

    /// Close every overlay layer.
    pub fn close(&self) -> Transition {
        let drawer = {
            let mut history = self.history.lock();
            let drawer = history.drop_drawer();
            history.reset();
            drawer
        };
        if drawer.is_some() {
            self.presenter.close_drawer();
        }
        self.viewer.close()
    }

    /// Open a drawer for the active item. Returns None when the viewer is not showing a post.
    pub fn show_drawer(&self, kind: DrawerKind) -> Option<DrawerContent> {
        if !self.viewer.is_open() {
            return None;
        }
        let item = self.viewer.active_item()?;
        let record = self.viewer.active_record()?;
        let content = match kind {
            DrawerKind::Content => {
                let html = record.body_html.trim().to_string();
                let blank = text_content(&html).is_empty();
                DrawerContent::Content { html, blank }
            }
            DrawerKind::Comments => DrawerContent::Comments {
                url: record
                    .comments_url
                    .unwrap_or_else(|| format!("{}#comments", item.id)),
            },
        };
        self.history.lock().push_drawer(kind);
        self.presenter.open_drawer(&content);
        Some(content)
    }

    /// Close the drawer only. Returns whether one was open.
    pub fn close_drawer(&self) -> bool {
        let closed = self.history.lock().drop_drawer().is_some();
        if closed {
            self.presenter.close_drawer();
        }
        closed
    }

    /// Host scroll notification. Loads the next page when close to the bottom.
    pub async fn on_scroll(&self, scroll_y: f64, viewport_height: f64, document_height: f64) -> LoadOutcome {
        if !self.pager.near_bottom(scroll_y, viewport_height, document_height) {
            return LoadOutcome::Skipped;
        }
        self.pager.load_more().await
    }

    /// Host viewport notification. Prefetches items near the visible area.
    pub fn on_viewport(&self, viewport: Viewport, items: &[ItemBounds]) {
        let tasks = self.preload.on_viewport(viewport, items);
        self.track(tasks);
    }

    /// Background work started so far, including the viewer's.
    pub fn take_tasks(&self) -> Vec<TaskHandle> {
        let mut tasks = std::mem::take(&mut *self.tasks.lock());
        tasks.extend(self.viewer.take_tasks());
        tasks
    }

    fn track(&self, tasks: Vec<TaskHandle>) {
        if tasks.is_empty() {
            return;
        }
        let mut pending = self.tasks.lock();
        pending.retain(|task| !task.is_finished());
        pending.extend(tasks);
        debug!(pending = pending.len(), "background tasks scheduled");
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn index(&self) -> &Arc<FeedIndex> {
        &self.index
    }

    pub fn fetcher(&self) -> &Arc<ContentFetcher> {
        &self.fetcher
    }

    pub fn warmer(&self) -> &Arc<ImageWarmer> {
        &self.warmer
    }

    pub fn pager(&self) -> &Arc<PaginationLoader> {
        &self.pager
    }

    pub fn phase(&self) -> Phase {
        self.viewer.phase()
    }

    pub fn is_open(&self) -> bool {
        self.viewer.is_open()
    }

    pub fn active_item(&self) -> Option<FeedItem> {
        self.viewer.active_item()
    }

    pub fn active_record(&self) -> Option<PostRecord> {
        self.viewer.active_record()
    }

    pub fn snapshot(&self) -> ViewerSession {
        self.viewer.snapshot()
    }

    pub fn top_layer(&self) -> Option<Layer> {
        self.history.lock().current()
    }
}
