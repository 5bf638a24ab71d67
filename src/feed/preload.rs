// Preload scheduling.
// Speculative fetches around the active item, for items near the viewport, and at startup.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use crate::blog::FeedItem;
use crate::config::Config;
use crate::fetch::{ContentFetcher, ImageWarmer, TaskHandle, spawn_best_effort};

use super::index::FeedIndex;

/// Inclusive range of feed positions around an active item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreloadWindow {
    pub center: usize,
    pub start: usize,
    pub end: usize,
}

impl PreloadWindow {
    /// Window of `range` items either side of `center`, clamped to a feed of `len` items.
    pub fn around(center: usize, range: usize, len: usize) -> Self {
        let last = len.saturating_sub(1);
        Self {
            center,
            start: center.saturating_sub(range),
            end: center.saturating_add(range).min(last.max(center)),
        }
    }

    pub fn contains(&self, position: usize) -> bool {
        (self.start..=self.end).contains(&position)
    }

    /// Neighbor positions nearest first, next before previous: +1, -1, +2, -2, ...
    pub fn neighbors(&self) -> Vec<usize> {
        let reach = (self.end - self.center).max(self.center - self.start);
        let mut order = Vec::new();
        for distance in 1..=reach {
            let next = self.center + distance;
            if next <= self.end {
                order.push(next);
            }
            if let Some(prev) = self.center.checked_sub(distance) {
                if prev >= self.start {
                    order.push(prev);
                }
            }
        }
        order
    }
}

/// Visible region of the host's scroll container.
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub top: f64,
    pub height: f64,
}

/// Vertical extent of a rendered feed item.
#[derive(Debug, Clone)]
pub struct ItemBounds {
    pub id: String,
    pub top: f64,
    pub bottom: f64,
}

/// Issues best-effort prefetches. Only the first image of each prefetched post is warmed.
pub struct PreloadScheduler {
    fetcher: Arc<ContentFetcher>,
    warmer: Arc<ImageWarmer>,
    index: Arc<FeedIndex>,
    range: usize,
    initial_count: usize,
    margin: f64,
    initial_started: AtomicBool,
    window: Mutex<Option<PreloadWindow>>,
}

impl PreloadScheduler {
    pub fn new(
        fetcher: Arc<ContentFetcher>,
        warmer: Arc<ImageWarmer>,
        index: Arc<FeedIndex>,
        config: &Config,
    ) -> Self {
        Self {
            fetcher,
            warmer,
            index,
            range: config.preload_range.max(1),
            initial_count: config.initial_preload_count,
            margin: config.viewport_margin_px,
            initial_started: AtomicBool::new(false),
            window: Mutex::new(None),
        }
    }

    pub fn active_window(&self) -> Option<PreloadWindow> {
        *self.window.lock()
    }

    pub fn clear_window(&self) {
        *self.window.lock() = None;
    }

    /// Prefetch the neighbors of `item` and make their window the active one.
    pub fn preload_neighbors(&self, item: &FeedItem) -> Vec<TaskHandle> {
        let window = PreloadWindow::around(item.position, self.range, self.index.len());
        *self.window.lock() = Some(window);

        let handles: Vec<TaskHandle> = window
            .neighbors()
            .into_iter()
            .filter_map(|pos| self.index.at(pos))
            .filter_map(|neighbor| self.prefetch(&neighbor.id))
            .collect();
        debug!(
            url = %item.id,
            start = window.start,
            end = window.end,
            scheduled = handles.len(),
            "preloading neighbors"
        );
        handles
    }

    /// Prefetch items that come within the margin of the viewport.
    pub fn on_viewport(&self, viewport: Viewport, items: &[ItemBounds]) -> Vec<TaskHandle> {
        let top = viewport.top - self.margin;
        let bottom = viewport.top + viewport.height + self.margin;
        items
            .iter()
            .filter(|bounds| bounds.bottom >= top && bounds.top <= bottom)
            .filter_map(|bounds| self.prefetch(&bounds.id))
            .collect()
    }

    /// Prefetch the leading items of the feed. Runs once per scheduler.
    pub fn preload_initial(&self) -> Vec<TaskHandle> {
        if self.initial_started.swap(true, Ordering::SeqCst) {
            return Vec::new();
        }
        let handles: Vec<TaskHandle> = self
            .index
            .range(0, self.initial_count)
            .into_iter()
            .filter_map(|item| self.prefetch(&item.id))
            .collect();
        debug!(scheduled = handles.len(), "initial preload");
        handles
    }

    /// Fetch `id` in the background and warm its first image. Cached items are skipped.
    fn prefetch(&self, id: &str) -> Option<TaskHandle> {
        if self.fetcher.is_cached(id) {
            return None;
        }
        let fetcher = self.fetcher.clone();
        let warmer = self.warmer.clone();
        let id = id.to_string();
        Some(spawn_best_effort(format!("preload {id}"), async move {
            let record = fetcher
                .try_fetch(&id)
                .await
                .ok_or_else(|| format!("prefetch of {id} failed"))?;
            if let Some(image) = record.first_image() {
                warmer.warm(image);
            }
            Ok::<_, String>(())
        }))
    }
}
