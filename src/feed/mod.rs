// Feed module.
// The item index, listing pagination and speculative preloading.

pub mod index;
pub mod pagination;
pub mod preload;

pub use index::FeedIndex;
pub use pagination::{LoadOutcome, PaginationLoader};
pub use preload::{ItemBounds, PreloadScheduler, PreloadWindow, Viewport};
