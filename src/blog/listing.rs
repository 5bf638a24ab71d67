// Listing page parsing.
// Finds post list-item fragments and the "older posts" pager link.

use std::ops::Range;

use url::Url;

use super::extract::resolve;
use super::markup::Document;
use super::types::{ListingEntry, ListingPage};

const ITEM_CLASS: &str = "post-outer-container";
const SKELETON_CLASS: &str = "skeleton";
const PAGER_CLASS: &str = "blog-pager-older-link";
const POST_URL_ATTR: &str = "data-post-url";

/// Parse a listing page. Relative URLs are resolved against `base`.
pub fn parse_listing(html: &str, base: Option<&Url>) -> ListingPage {
    let doc = Document::parse(html);

    let mut entries: Vec<ListingEntry> = Vec::new();
    let mut taken: Vec<Range<usize>> = Vec::new();
    for item in doc.select(|t| t.has_class(ITEM_CLASS) && !t.has_class(SKELETON_CLASS)) {
        if taken.iter().any(|outer| outer.contains(&item.outer.start)) {
            continue;
        }
        taken.push(item.outer.clone());

        let id = doc
            .select_within(&item, |t| t.name == "a" && t.attr(POST_URL_ATTR).is_some())
            .into_iter()
            .find_map(|anchor| anchor.attr(POST_URL_ATTR))
            .map(|href| resolve(base, &href))
            .filter(|id| !id.is_empty());

        match id {
            Some(id) => entries.push(ListingEntry {
                id,
                fragment: item.outer_html().to_string(),
            }),
            None => tracing::debug!("listing item without post url skipped"),
        }
    }

    let next_page_url = doc
        .first(|t| t.name == "a" && t.has_class(PAGER_CLASS))
        .and_then(|pager| pager.attr("href"))
        .map(|href| resolve(base, &href))
        .filter(|href| !href.is_empty());

    ListingPage {
        entries,
        next_page_url,
    }
}
