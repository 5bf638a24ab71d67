// Blog content types.
// Feed entries discovered on listing pages and records extracted from post pages.

use serde::{Deserialize, Serialize};

/// Opaque reference back to the presentation context of a feed entry.
/// Holds the list-item markup the entry was discovered in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceHandle(pub String);

impl SourceHandle {
    pub fn markup(&self) -> &str {
        &self.0
    }
}

/// One entry in the paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    /// Canonical post URL, unique within a feed.
    pub id: String,
    /// Ordinal in the feed, assigned on append.
    pub position: usize,
    pub source_handle: SourceHandle,
}

/// Structured content extracted from a post page.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    /// Image URLs in document order. Duplicates are kept.
    pub images: Vec<String>,
    /// Post body markup with images and separators stripped.
    pub body_html: String,
    pub comments_url: Option<String>,
}

impl PostRecord {
    /// The record returned when a post cannot be fetched or parsed.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.body_html.is_empty() && self.comments_url.is_none()
    }

    pub fn has_images(&self) -> bool {
        !self.images.is_empty()
    }

    pub fn first_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

/// A list-item fragment found on a listing page, before it is placed in the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub id: String,
    pub fragment: String,
}

/// Parsed listing page.
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub entries: Vec<ListingEntry>,
    /// URL of the "older posts" page, if any.
    pub next_page_url: Option<String>,
}
