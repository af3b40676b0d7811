use geo::Point;
use geocluster_types::item::ClusterItem;
use rustc_hash::FxHashSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A group of items drawn as one marker, positioned when it is created.
///
/// Equality and hashing cover both the position and the members, so a cluster
/// found again at the next zoom level with the same members and centre maps
/// back to the same marker.
#[derive(Debug, Clone)]
pub struct Cluster<T> {
    position: Point<f64>,
    items: Vec<T>,
}

impl<T: ClusterItem> Cluster<T> {
    pub fn new(position: Point<f64>, items: Vec<T>) -> Self {
        debug_assert!(!items.is_empty(), "clusters hold at least one item");
        Self { position, items }
    }

    /// A cluster holding a single item at the item's own position.
    pub fn singleton(item: T) -> Self {
        Self {
            position: item.position(),
            items: vec![item],
        }
    }

    pub fn position(&self) -> Point<f64> {
        self.position
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn size(&self) -> usize {
        self.items.len()
    }

    pub fn is_singleton(&self) -> bool {
        self.items.len() == 1
    }
}

impl<T: PartialEq> PartialEq for Cluster<T> {
    fn eq(&self, other: &Self) -> bool {
        self.position.x().to_bits() == other.position.x().to_bits()
            && self.position.y().to_bits() == other.position.y().to_bits()
            && self.items == other.items
    }
}

impl<T: Eq> Eq for Cluster<T> {}

impl<T: Hash> Hash for Cluster<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.position.x().to_bits().hash(state);
        self.position.y().to_bits().hash(state);
        self.items.hash(state);
    }
}

/// An immutable, cheaply cloneable result of one clustering pass.
///
/// Two sets are equal when they hold the same clusters, in any order.
#[derive(Debug)]
pub struct ClusterSet<T> {
    clusters: Arc<[Arc<Cluster<T>>]>,
}

impl<T> Clone for ClusterSet<T> {
    fn clone(&self) -> Self {
        Self {
            clusters: Arc::clone(&self.clusters),
        }
    }
}

impl<T: ClusterItem> ClusterSet<T> {
    pub fn new(clusters: Vec<Cluster<T>>) -> Self {
        Self {
            clusters: clusters.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Cluster<T>>> {
        self.clusters.iter()
    }

    /// Total number of items across every cluster.
    pub fn item_count(&self) -> usize {
        self.clusters.iter().map(|cluster| cluster.size()).sum()
    }

    /// Whether both handles point at the same allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.clusters, &other.clusters)
    }
}

impl<T: ClusterItem> PartialEq for ClusterSet<T> {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        if self.len() != other.len() {
            return false;
        }
        let mine: FxHashSet<&Cluster<T>> = self.clusters.iter().map(|c| c.as_ref()).collect();
        other.clusters.iter().all(|c| mine.contains(c.as_ref()))
    }
}

impl<T: ClusterItem> Eq for ClusterSet<T> {}

impl<T: ClusterItem> From<Vec<Cluster<T>>> for ClusterSet<T> {
    fn from(clusters: Vec<Cluster<T>>) -> Self {
        Self::new(clusters)
    }
}
