// Blog access module.
// HTTP transport, HTML scanning and the parsers for listing and post pages.

pub mod client;
pub mod extract;
pub mod listing;
pub mod markup;
pub mod types;

pub use client::{BlogClient, Transport};
pub use extract::ContentExtractor;
pub use listing::parse_listing;
pub use types::{FeedItem, ListingEntry, ListingPage, PostRecord, SourceHandle};
