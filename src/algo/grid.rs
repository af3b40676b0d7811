//! Grid-based clustering.
//!
//! Every item falls into one square cell of `grid_size_px` screen pixels. Each
//! non-empty cell becomes a cluster positioned at the cell centre.

use super::{Algorithm, Cluster, ClusterSet, ItemStore, discrete_zoom};
use crate::projection::{SphericalMercatorProjection, world_width};
use geocluster_types::item::ClusterItem;
use geocluster_types::point::ProjectedPoint;
use rustc_hash::FxHashMap;

/// Default cell size in screen pixels.
pub const DEFAULT_GRID_SIZE_PX: f64 = 100.0;

#[derive(Debug, Clone)]
pub struct GridBasedAlgorithm<T> {
    items: ItemStore<T>,
    grid_size_px: f64,
}

impl<T: ClusterItem> GridBasedAlgorithm<T> {
    pub fn new() -> Self {
        Self::with_grid_size(DEFAULT_GRID_SIZE_PX)
    }

    pub fn with_grid_size(grid_size_px: f64) -> Self {
        Self {
            items: ItemStore::new(),
            grid_size_px,
        }
    }

    pub fn grid_size_px(&self) -> f64 {
        self.grid_size_px
    }

    /// Number of cells along each side of the world at `zoom`.
    pub fn cells_per_side(&self, zoom: i32) -> f64 {
        (world_width(zoom as f64) / self.grid_size_px).ceil()
    }
}

impl<T: ClusterItem> Default for GridBasedAlgorithm<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ClusterItem> Algorithm<T> for GridBasedAlgorithm<T> {
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
        let projection = SphericalMercatorProjection::new(self.cells_per_side(zoom));

        let mut cells: FxHashMap<(i64, i64), usize> = FxHashMap::default();
        let mut buckets: Vec<(ProjectedPoint, Vec<T>)> = Vec::new();

        for item in self.items.as_slice() {
            let point = projection.to_point(&item.position());
            let (cell_x, cell_y) = (point.x.floor(), point.y.floor());
            // Non-finite coordinates saturate, so polar items share an edge cell.
            let key = (cell_x as i64, cell_y as i64);

            let index = *cells.entry(key).or_insert_with(|| {
                let centre = ProjectedPoint::new(cell_x + 0.5, cell_y + 0.5);
                buckets.push((centre, Vec::new()));
                buckets.len() - 1
            });
            buckets[index].1.push(item.clone());
        }

        let clusters: Vec<Cluster<T>> = buckets
            .into_iter()
            .map(|(centre, members)| {
                let position = if centre.is_finite() {
                    projection.to_lat_lng(&centre)
                } else {
                    members[0].position()
                };
                Cluster::new(position, members)
            })
            .collect();

        log::debug!(
            "Bucketed {} items into {} cells at zoom {}",
            self.items.len(),
            clusters.len(),
            zoom
        );
        ClusterSet::new(clusters)
    }
}
