// Cache module.
// Bounded in-memory post cache with a persistent, self-expiring backing store.

pub mod bounded;
pub mod paths;
pub mod store;

pub use bounded::{CacheEntry, LruMap, MemoryCache, PostCache, TieredCache, tiered_with_defaults};
pub use paths::cache_dir;
pub use store::{Envelope, FileStore, PersistentStore};
