// Feed index.
// Append-only list of feed items with change listeners.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::blog::{FeedItem, ListingEntry, SourceHandle};

type Listener = Arc<dyn Fn(&[FeedItem]) + Send + Sync>;

#[derive(Default)]
struct Items {
    items: Vec<FeedItem>,
    positions: HashMap<String, usize>,
}

/// Ordered, de-duplicated feed items. Positions grow monotonically and items are never removed.
#[derive(Default)]
pub struct FeedIndex {
    inner: RwLock<Items>,
    listeners: Mutex<Vec<Listener>>,
}

impl FeedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append entries whose id is not yet known. Returns the items actually added
    /// and notifies listeners when there are any.
    pub fn append(&self, entries: Vec<ListingEntry>) -> Vec<FeedItem> {
        let added: Vec<FeedItem> = {
            let mut inner = self.inner.write();
            let mut added = Vec::new();
            for entry in entries {
                if inner.positions.contains_key(&entry.id) {
                    continue;
                }
                let item = FeedItem {
                    position: inner.items.len(),
                    id: entry.id,
                    source_handle: SourceHandle(entry.fragment),
                };
                inner.positions.insert(item.id.clone(), item.position);
                inner.items.push(item.clone());
                added.push(item);
            }
            added
        };

        if !added.is_empty() {
            debug!(added = added.len(), total = self.len(), "feed index grew");
            // Listeners may subscribe or append, so none are called under the lock.
            let listeners = self.listeners.lock().clone();
            for listener in listeners {
                listener(&added);
            }
        }
        added
    }

    /// Register a listener called with each batch of newly appended items.
    pub fn subscribe(&self, listener: impl Fn(&[FeedItem]) + Send + Sync + 'static) {
        self.listeners.lock().push(Arc::new(listener));
    }

    pub fn get(&self, id: &str) -> Option<FeedItem> {
        let inner = self.inner.read();
        inner.positions.get(id).map(|&pos| inner.items[pos].clone())
    }

    pub fn at(&self, position: usize) -> Option<FeedItem> {
        self.inner.read().items.get(position).cloned()
    }

    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.inner.read().positions.get(id).copied()
    }

    /// The item `delta` positions away from `id`, if both exist.
    pub fn neighbor(&self, id: &str, delta: isize) -> Option<FeedItem> {
        let inner = self.inner.read();
        let pos = *inner.positions.get(id)?;
        let target = pos.checked_add_signed(delta)?;
        inner.items.get(target).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all items in feed order.
    pub fn items(&self) -> Vec<FeedItem> {
        self.inner.read().items.clone()
    }

    /// Snapshot of the items in `[start, end)`, clamped to the feed.
    pub fn range(&self, start: usize, end: usize) -> Vec<FeedItem> {
        let inner = self.inner.read();
        let end = end.min(inner.items.len());
        let start = start.min(end);
        inner.items[start..end].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn entry(id: &str) -> ListingEntry {
        ListingEntry {
            id: id.to_string(),
            fragment: format!("<article>{id}</article>"),
        }
    }

    #[test]
    fn append_assigns_positions_and_skips_known_ids() {
        let index = FeedIndex::new();
        let added = index.append(vec![entry("a"), entry("b")]);
        assert_eq!(added.len(), 2);
        assert_eq!(added[1].position, 1);

        let added = index.append(vec![entry("b"), entry("c"), entry("c")]);
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].id, "c");
        assert_eq!(added[0].position, 2);
        assert_eq!(index.len(), 3);
        assert_eq!(index.get("a").unwrap().source_handle.markup(), "<article>a</article>");
    }

    #[test]
    fn neighbor_lookup() {
        let index = FeedIndex::new();
        index.append(vec![entry("a"), entry("b"), entry("c")]);

        assert_eq!(index.neighbor("b", 1).unwrap().id, "c");
        assert_eq!(index.neighbor("b", -1).unwrap().id, "a");
        assert!(index.neighbor("a", -1).is_none());
        assert!(index.neighbor("c", 1).is_none());
        assert!(index.neighbor("missing", 1).is_none());
        assert_eq!(index.position_of("c"), Some(2));
        assert_eq!(index.at(0).unwrap().id, "a");
    }

    #[test]
    fn range_is_clamped() {
        let index = FeedIndex::new();
        index.append(vec![entry("a"), entry("b")]);
        assert_eq!(index.range(0, 10).len(), 2);
        assert!(index.range(5, 10).is_empty());
    }

    #[test]
    fn listeners_see_only_new_batches() {
        let index = FeedIndex::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        index.subscribe(move |items| {
            counter.fetch_add(items.len(), Ordering::SeqCst);
        });

        index.append(vec![entry("a"), entry("b")]);
        index.append(vec![entry("a")]);
        index.append(vec![entry("c")]);
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn listeners_may_reenter_the_index() {
        let index = Arc::new(FeedIndex::new());
        let seen = Arc::new(AtomicUsize::new(0));
        let weak = Arc::downgrade(&index);
        let counter = seen.clone();
        index.subscribe(move |items| {
            let Some(index) = weak.upgrade() else { return };
            counter.store(index.len(), Ordering::SeqCst);
            if items.iter().any(|item| item.id == "a") {
                index.subscribe(|_| {});
                index.append(vec![entry("from-listener")]);
            }
        });

        index.append(vec![entry("a")]);
        assert_eq!(index.len(), 2);
        assert_eq!(index.at(1).unwrap().id, "from-listener");
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(index.listeners.lock().len(), 2);
    }
}
