//! Content cache and prefetch pipeline for an infinite-scroll blog photo viewer.
//!
//! A [`FeedSession`] follows a blog's paginated listing, extracts images and text from
//! post pages, keeps the results in a bounded cache with a persistent fallback, and
//! preloads neighboring posts so that swiping through the viewer does not wait on the network.
//! Rendering is left to the host through the [`Presenter`] trait.

pub mod blog;
pub mod cache;
pub mod config;
pub mod error;
pub mod feed;
pub mod fetch;
pub mod state;

#[cfg(test)]
mod test_helpers;

pub use blog::{BlogClient, ContentExtractor, FeedItem, PostRecord, Transport};
pub use cache::{MemoryCache, PostCache, TieredCache};
pub use config::Config;
pub use error::{FeedError, Result};
pub use feed::{FeedIndex, LoadOutcome, PaginationLoader, PreloadScheduler};
pub use fetch::{ContentFetcher, ImageWarmer, TaskHandle, TaskStatus};
pub use state::{FeedSession, NullPresenter, Presenter, Transition, ViewerState};
