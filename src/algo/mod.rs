//! Clustering algorithms and the per-zoom caching decorator.

pub mod cluster;
pub mod distance;
pub mod grid;
pub mod precache;

pub use cluster::{Cluster, ClusterSet};
pub use distance::NonHierarchicalDistanceBasedAlgorithm;
pub use grid::GridBasedAlgorithm;
pub use precache::PreCachingAlgorithm;

use rustc_hash::FxHashSet;

/// Highest zoom level the algorithms are asked to cluster at.
pub const MAX_ZOOM: i32 = 25;

/// Truncate a continuous zoom to the integer level used as a cache key.
///
/// Zooms that truncate to the same level share results; negative zooms clamp
/// to level 0.
#[inline]
pub fn discrete_zoom(zoom: f64) -> i32 {
    if zoom.is_nan() {
        return 0;
    }
    (zoom as i32).clamp(0, MAX_ZOOM)
}

/// A strategy that groups items into clusters for a zoom level.
///
/// Implementations own their item collection. Swapping algorithms is done by
/// moving `items()` from the old one into the new one.
pub trait Algorithm<T>: Send + Sync {
    fn add_item(&mut self, item: T);

    fn add_items(&mut self, items: Vec<T>) {
        for item in items {
            self.add_item(item);
        }
    }

    /// Remove an item, returning whether it was present.
    fn remove_item(&mut self, item: &T) -> bool;

    fn clear_items(&mut self);

    /// All items in insertion order.
    fn items(&self) -> Vec<T>;

    fn clusters(&self, zoom: f64) -> ClusterSet<T>;
}

/// Insertion-ordered, de-duplicated item storage shared by the algorithms.
#[derive(Debug, Clone)]
pub(crate) struct ItemStore<T> {
    ordered: Vec<T>,
    present: FxHashSet<T>,
}

impl<T: Clone + Eq + std::hash::Hash> ItemStore<T> {
    pub(crate) fn new() -> Self {
        Self {
            ordered: Vec::new(),
            present: FxHashSet::default(),
        }
    }

    /// Returns false when the item was already stored.
    pub(crate) fn insert(&mut self, item: T) -> bool {
        if !self.present.insert(item.clone()) {
            return false;
        }
        self.ordered.push(item);
        true
    }

    pub(crate) fn remove(&mut self, item: &T) -> bool {
        if !self.present.remove(item) {
            return false;
        }
        if let Some(index) = self.ordered.iter().position(|stored| stored == item) {
            self.ordered.remove(index);
        }
        true
    }

    pub(crate) fn clear(&mut self) {
        self.ordered.clear();
        self.present.clear();
    }

    pub(crate) fn as_slice(&self) -> &[T] {
        &self.ordered
    }

    pub(crate) fn len(&self) -> usize {
        self.ordered.len()
    }
}
