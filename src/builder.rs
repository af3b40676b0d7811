//! Builder for cluster managers
//!
//! This module provides a builder pattern for assembling a [`ClusterManager`]
//! from a configuration, an optional algorithm and an optional renderer.

use crate::algo::{Algorithm, GridBasedAlgorithm, NonHierarchicalDistanceBasedAlgorithm};
use crate::config::{AlgorithmKind, Config};
use crate::error::{ClusterError, Result};
use crate::manager::ClusterManager;
use crate::markers::MarkerManager;
use crate::render::{
    ClusterRenderer, DefaultClusterRenderer, RenderContext, RenderingSurface, SurfaceHandle,
};
use geocluster_types::item::ClusterItem;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

type RendererFactory<T, S> =
    Box<dyn FnOnce(RenderContext<S>, &Config) -> Result<Arc<dyn ClusterRenderer<T>>>>;

/// Builder for a [`ClusterManager`] with custom configuration, algorithm and
/// renderer.
pub struct ClusterManagerBuilder<T: ClusterItem, S: RenderingSurface> {
    config: Config,
    algorithm: Option<Box<dyn Algorithm<T>>>,
    renderer: Option<RendererFactory<T, S>>,
    markers: Option<Arc<Mutex<MarkerManager>>>,
}

impl<T: ClusterItem, S: RenderingSurface> ClusterManagerBuilder<T, S> {
    /// Create a new builder with the default configuration.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            algorithm: None,
            renderer: None,
            markers: None,
        }
    }

    /// Set the configuration (distances, cache, rendering, workers).
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Cluster with `algorithm` instead of the one named by the config.
    /// Items already held by it are kept.
    pub fn algorithm(mut self, algorithm: Box<dyn Algorithm<T>>) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    /// Build the renderer with `factory` instead of using
    /// [`DefaultClusterRenderer`]. The factory receives the context the
    /// manager draws into.
    pub fn renderer<F>(mut self, factory: F) -> Self
    where
        F: FnOnce(RenderContext<S>, &Config) -> Result<Arc<dyn ClusterRenderer<T>>> + 'static,
    {
        self.renderer = Some(Box::new(factory));
        self
    }

    /// Share a marker manager with other map layers. The manager's two
    /// collections are added to it.
    pub fn marker_manager(mut self, markers: Arc<Mutex<MarkerManager>>) -> Self {
        self.markers = Some(markers);
        self
    }

    /// Build the manager. Fails when the configuration is invalid or a
    /// thread cannot be spawned.
    pub fn build(self, surface: SurfaceHandle<S>) -> Result<ClusterManager<T, S>> {
        self.config.validate().map_err(ClusterError::InvalidConfig)?;

        let markers = self
            .markers
            .unwrap_or_else(|| Arc::new(Mutex::new(MarkerManager::new())));
        let (item_collection, cluster_collection) = {
            let mut markers = markers.lock();
            (markers.new_collection(), markers.new_collection())
        };
        let context = RenderContext {
            surface,
            markers,
            item_collection,
            cluster_collection,
        };

        let algorithm = match self.algorithm {
            Some(algorithm) => algorithm,
            None => configured_algorithm(&self.config),
        };
        let renderer: Arc<dyn ClusterRenderer<T>> = match self.renderer {
            Some(factory) => factory(context.clone(), &self.config)?,
            None => Arc::new(DefaultClusterRenderer::new(context.clone(), &self.config)?),
        };

        log::debug!(
            "Building cluster manager with {} workers, cache of {} zooms",
            self.config.worker_threads,
            self.config.cache.capacity
        );
        ClusterManager::from_parts(self.config, context, algorithm, renderer)
    }
}

fn configured_algorithm<T: ClusterItem>(config: &Config) -> Box<dyn Algorithm<T>> {
    match config.algorithm {
        AlgorithmKind::Distance => Box::new(NonHierarchicalDistanceBasedAlgorithm::with_max_distance(
            config.max_distance_px,
        )),
        AlgorithmKind::Grid => Box::new(GridBasedAlgorithm::with_grid_size(config.grid_size_px)),
    }
}

impl<T: ClusterItem, S: RenderingSurface> Default for ClusterManagerBuilder<T, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ClusterItem, S: RenderingSurface> fmt::Debug for ClusterManagerBuilder<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterManagerBuilder")
            .field("config", &self.config)
            .field("custom_algorithm", &self.algorithm.is_some())
            .field("custom_renderer", &self.renderer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::render::{RecordingSurface, SurfaceExecutor};
    use geocluster_types::item::GeoItem;

    type Builder = ClusterManagerBuilder<GeoItem, RecordingSurface>;

    #[test]
    fn test_builder_default() {
        let executor = SurfaceExecutor::spawn(RecordingSurface::default()).unwrap();
        let manager = Builder::new().build(executor.handle()).unwrap();
        assert_eq!(manager.config(), &Config::default());
        assert_ne!(manager.item_collection(), manager.cluster_collection());
    }

    #[test]
    fn test_builder_with_config() {
        let executor = SurfaceExecutor::spawn(RecordingSurface::default()).unwrap();
        let config = Config::default()
            .with_max_distance_px(40.0)
            .with_cache(CacheConfig::default().with_capacity(2));
        let manager = Builder::new()
            .config(config.clone())
            .build(executor.handle())
            .unwrap();
        assert_eq!(manager.config(), &config);
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let executor = SurfaceExecutor::spawn(RecordingSurface::default()).unwrap();
        let mut config = Config::default();
        config.max_distance_px = -1.0;
        let err = Builder::new()
            .config(config)
            .build(executor.handle())
            .err()
            .unwrap();
        assert!(matches!(err, ClusterError::InvalidConfig(_)));
    }

    #[test]
    fn test_builder_keeps_algorithm_items() {
        let executor = SurfaceExecutor::spawn(RecordingSurface::default()).unwrap();
        let mut algorithm = GridBasedAlgorithm::new();
        algorithm.add_item(GeoItem::new(1, 10.0, 10.0));
        let manager = Builder::new()
            .algorithm(Box::new(algorithm))
            .build(executor.handle())
            .unwrap();
        assert_eq!(manager.items().len(), 1);
    }

    #[test]
    fn test_builder_grid_uses_configured_cell_size() {
        let executor = SurfaceExecutor::spawn(RecordingSurface::default()).unwrap();
        // About 90 px apart at zoom 8, straddling a 100 px cell boundary.
        let items = vec![GeoItem::new(1, 0.1, 0.0), GeoItem::new(2, 0.6, 0.0)];
        let grid = Config::default()
            .with_algorithm(AlgorithmKind::Grid)
            .with_cache(CacheConfig::default().with_precache(false));

        let fine = Builder::new()
            .config(grid.clone())
            .build(executor.handle())
            .unwrap();
        fine.add_items(items.clone());
        assert_eq!(fine.clusters(8.0).len(), 2);

        let coarse = Builder::new()
            .config(grid.with_grid_size_px(1000.0))
            .build(executor.handle())
            .unwrap();
        coarse.add_items(items);
        assert_eq!(coarse.clusters(8.0).len(), 1);
    }

    #[test]
    fn test_builder_shares_marker_manager() {
        let executor = SurfaceExecutor::spawn(RecordingSurface::default()).unwrap();
        let markers = Arc::new(Mutex::new(MarkerManager::new()));
        let layer = markers.lock().new_named_collection("layer").unwrap();
        let manager = Builder::new()
            .marker_manager(Arc::clone(&markers))
            .build(executor.handle())
            .unwrap();
        assert!(Arc::ptr_eq(&manager.marker_manager(), &markers));
        assert_ne!(manager.item_collection(), layer);
        assert_eq!(markers.lock().collection("layer").unwrap(), layer);
    }
}
