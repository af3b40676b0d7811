//! Zoom-aware point clustering with a quadtree index, per-zoom caching, and
//! animated marker reconciliation.
//!
//! ```rust
//! use geocluster::prelude::*;
//!
//! let executor = SurfaceExecutor::spawn(RecordingSurface::default())?;
//! let manager = ClusterManager::<GeoItem, RecordingSurface>::new(executor.handle())?;
//!
//! manager.add_items(vec![
//!     GeoItem::new(1, -74.0060, 40.7128).with_title("NYC"),
//!     GeoItem::new(2, -74.0059, 40.7129),
//!     GeoItem::new(3, 2.3522, 48.8566).with_title("Paris"),
//! ]);
//!
//! let clusters = manager.clusters(10.0);
//! assert_eq!(clusters.item_count(), 3);
//! manager.on_camera_idle(&CameraPosition::new(Point::new(0.0, 0.0), 10.0))?;
//! # Ok::<(), geocluster::ClusterError>(())
//! ```

pub mod algo;
pub mod builder;
pub mod config;
pub mod error;
pub mod manager;
pub mod markers;
pub mod projection;
pub mod quadtree;
pub mod render;
pub mod worker;

pub use algo::{
    Algorithm, Cluster, ClusterSet, GridBasedAlgorithm, NonHierarchicalDistanceBasedAlgorithm,
    PreCachingAlgorithm,
};
pub use builder::ClusterManagerBuilder;
pub use config::{AlgorithmKind, CacheConfig, Config, RenderConfig};
pub use error::{ClusterError, Result};
pub use manager::ClusterManager;
pub use markers::{CollectionId, MarkerManager};
pub use projection::SphericalMercatorProjection;
pub use quadtree::PointQuadTree;
pub use render::{
    CameraPosition, ClusterRenderer, DefaultClusterRenderer, MarkerId, MarkerOptions,
    RecordingSurface, RenderingSurface, SurfaceExecutor, SurfaceHandle,
};

pub use geo::{Point, Rect};

pub use geocluster_types::bounds::Bounds;
pub use geocluster_types::item::{ClusterItem, GeoItem};
pub use geocluster_types::point::ProjectedPoint;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{ClusterError, ClusterManager, ClusterManagerBuilder, Result};

    pub use geo::{Point, Rect};

    pub use crate::{Algorithm, Cluster, ClusterSet};

    pub use crate::{GridBasedAlgorithm, NonHierarchicalDistanceBasedAlgorithm};

    pub use crate::{AlgorithmKind, CacheConfig, Config, RenderConfig};

    pub use crate::{CameraPosition, ClusterRenderer, MarkerId, MarkerOptions, RenderingSurface};

    pub use crate::{RecordingSurface, SurfaceExecutor, SurfaceHandle};

    pub use crate::{ClusterItem, GeoItem};
}
