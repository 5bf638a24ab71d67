// Fetch module.
// Post retrieval, image warming and the best-effort task primitive they run on.

pub mod fetcher;
pub mod task;
pub mod warm;

pub use fetcher::ContentFetcher;
pub use task::{TaskHandle, TaskStatus, join_all, spawn_best_effort};
pub use warm::{ImageStatus, ImageWarmer};
