// Test helpers.
// Scripted in-memory transport and HTML builders shared by unit tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::blog::{FeedItem, PostRecord, Transport};
use crate::error::{FeedError, Result};
use crate::state::{DrawerContent, DrawerKind, Presenter};

/// Transport serving canned responses and counting requests per URL.
#[derive(Default)]
pub struct ScriptedTransport {
    pages: Mutex<HashMap<String, String>>,
    hits: Mutex<HashMap<String, usize>>,
    delay: Mutex<Option<Duration>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, body: impl Into<String>) -> Self {
        self.set_page(url, body);
        self
    }

    pub fn set_page(&self, url: &str, body: impl Into<String>) {
        self.pages.lock().insert(url.to_string(), body.into());
    }

    pub fn remove_page(&self, url: &str) {
        self.pages.lock().remove(url);
    }

    /// Delay every response, leaving room for concurrent callers to overlap.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn hits(&self, url: &str) -> usize {
        self.hits.lock().get(url).copied().unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.hits.lock().values().sum()
    }

    async fn respond(&self, url: &str) -> Result<String> {
        *self.hits.lock().entry(url.to_string()).or_default() += 1;
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let body = self.pages.lock().get(url).cloned();
        body.ok_or_else(|| FeedError::Status {
            status: 404,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        self.respond(url).await
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        self.respond(url).await.map(String::into_bytes)
    }
}

/// Presenter that records each notification as a short string.
#[derive(Default)]
pub struct RecordingPresenter {
    events: Mutex<Vec<String>>,
}

impl RecordingPresenter {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    fn push(&self, event: impl Into<String>) {
        self.events.lock().push(event.into());
    }
}

impl Presenter for RecordingPresenter {
    fn show_loading(&self) {
        self.push("loading");
    }

    fn hide_loading(&self) {
        self.push("loaded");
    }

    fn render(&self, _item: &FeedItem, _record: &PostRecord, image_index: usize) {
        self.push(format!("render {image_index}"));
    }

    fn show_image(&self, index: usize, _url: &str) {
        self.push(format!("image {index}"));
    }

    fn notify_no_images(&self, _item: &FeedItem) {
        self.push("no images");
    }

    fn closed(&self) {
        self.push("closed");
    }

    fn open_drawer(&self, content: &DrawerContent) {
        match content.kind() {
            DrawerKind::Content => self.push("drawer content"),
            DrawerKind::Comments => self.push("drawer comments"),
        }
    }

    fn close_drawer(&self) {
        self.push("drawer closed");
    }
}

/// A post page with one separator anchor per image.
pub fn post_html(images: &[&str]) -> String {
    let separators: String = images
        .iter()
        .map(|url| format!(r#"<div class="separator"><a href="{url}"><img src="{url}"></a></div>"#))
        .collect();
    format!(r#"<html><body><div class="post-body"><p>text</p>{separators}</div></body></html>"#)
}

/// A listing page with one list item per post URL and an optional pager link.
pub fn listing_html(posts: &[&str], next: Option<&str>) -> String {
    let items: String = posts
        .iter()
        .map(|url| {
            format!(
                r#"<article class="post-outer-container"><a data-post-url="{url}" href="{url}">post</a></article>"#
            )
        })
        .collect();
    let pager = next
        .map(|href| format!(r#"<a class="blog-pager-older-link" href="{href}">Older</a>"#))
        .unwrap_or_default();
    format!(r#"<div class="blog-posts">{items}</div>{pager}"#)
}
