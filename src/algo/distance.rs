//! Greedy distance-based clustering.
//!
//! Each pass projects every item at the requested zoom, indexes the projected
//! points in a fresh quadtree, then walks the items in insertion order. An
//! unvisited item claims every unvisited neighbour inside a square window of
//! `max_distance_px` pixels around it. Membership at the margins depends on
//! insertion order.

use super::{Algorithm, Cluster, ClusterSet, ItemStore, discrete_zoom};
use crate::projection::SphericalMercatorProjection;
use crate::quadtree::{PointQuadTree, QuadItem};
use geocluster_types::bounds::Bounds;
use geocluster_types::item::ClusterItem;
use geocluster_types::point::ProjectedPoint;

/// Default clustering window in screen pixels.
pub const DEFAULT_MAX_DISTANCE_PX: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct IndexedPoint {
    index: usize,
    point: ProjectedPoint,
}

impl QuadItem for IndexedPoint {
    fn point(&self) -> ProjectedPoint {
        self.point
    }
}

/// The default algorithm: non-hierarchical, distance based.
///
/// # Examples
///
/// ```
/// use geocluster::algo::{Algorithm, NonHierarchicalDistanceBasedAlgorithm};
/// use geocluster_types::item::GeoItem;
///
/// let mut algorithm = NonHierarchicalDistanceBasedAlgorithm::new();
/// algorithm.add_item(GeoItem::new(1, 0.0, 0.0));
/// algorithm.add_item(GeoItem::new(2, 0.0001, 0.0001));
/// algorithm.add_item(GeoItem::new(3, 50.0, 50.0));
///
/// let clusters = algorithm.clusters(14.0);
/// assert_eq!(clusters.len(), 2);
/// assert_eq!(clusters.item_count(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct NonHierarchicalDistanceBasedAlgorithm<T> {
    items: ItemStore<T>,
    max_distance_px: f64,
}

impl<T: ClusterItem> NonHierarchicalDistanceBasedAlgorithm<T> {
    pub fn new() -> Self {
        Self::with_max_distance(DEFAULT_MAX_DISTANCE_PX)
    }

    /// Use a clustering window of `max_distance_px` screen pixels.
    pub fn with_max_distance(max_distance_px: f64) -> Self {
        Self {
            items: ItemStore::new(),
            max_distance_px,
        }
    }

    pub fn max_distance_px(&self) -> f64 {
        self.max_distance_px
    }
}

impl<T: ClusterItem> Default for NonHierarchicalDistanceBasedAlgorithm<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ClusterItem> Algorithm<T> for NonHierarchicalDistanceBasedAlgorithm<T> {
    fn add_item(&mut self, item: T) {
        self.items.insert(item);
    }

    fn remove_item(&mut self, item: &T) -> bool {
        self.items.remove(item)
    }

    fn clear_items(&mut self) {
        self.items.clear();
    }

    fn items(&self) -> Vec<T> {
        self.items.as_slice().to_vec()
    }

    fn clusters(&self, zoom: f64) -> ClusterSet<T> {
        let zoom = discrete_zoom(zoom);
        let projection = SphericalMercatorProjection::for_zoom(zoom as f64);
        let width = projection.world_width();
        let items = self.items.as_slice();

        let points: Vec<IndexedPoint> = items
            .iter()
            .enumerate()
            .map(|(index, item)| IndexedPoint {
                index,
                point: projection.to_point(&item.position()),
            })
            .collect();

        // Projected coordinates move with scale, so the index is per pass.
        let mut tree = PointQuadTree::new(Bounds::new(0.0, width, 0.0, width));
        for point in &points {
            tree.add(*point);
        }

        let mut visited = vec![false; items.len()];
        let mut clusters = Vec::new();
        let mut neighbours = Vec::new();

        for candidate in &points {
            if visited[candidate.index] {
                continue;
            }
            visited[candidate.index] = true;

            neighbours.clear();
            let window = Bounds::from_span(&candidate.point, self.max_distance_px);
            tree.for_each_in(&window, &mut |found: &IndexedPoint| {
                if !visited[found.index] {
                    neighbours.push(found.index);
                }
            });

            let item = &items[candidate.index];
            if neighbours.is_empty() {
                // Also covers items the tree dropped for lying outside the world.
                clusters.push(Cluster::singleton(item.clone()));
                continue;
            }

            let mut members = Vec::with_capacity(neighbours.len() + 1);
            members.push(item.clone());
            for &index in &neighbours {
                visited[index] = true;
                members.push(items[index].clone());
            }
            clusters.push(Cluster::new(item.position(), members));
        }

        log::debug!(
            "Clustered {} items into {} clusters at zoom {}",
            items.len(),
            clusters.len(),
            zoom
        );
        ClusterSet::new(clusters)
    }
}
