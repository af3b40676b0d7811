//! Turning cluster sets into markers on a map.
//!
//! [`DefaultClusterRenderer`] diffs each new [`ClusterSet`] against what is
//! already drawn and hands the resulting plan to a [`MarkerModifier`], which
//! applies it in batches on the thread that owns the [`RenderingSurface`].

pub mod animation;
pub mod default;
pub mod executor;
pub mod icons;
pub mod modifier;
pub mod recording;
pub mod surface;

pub use default::{DefaultClusterRenderer, RenderPhase};
pub use executor::{SurfaceExecutor, SurfaceHandle};
pub use icons::{ClusterBadge, IconCache};
pub use modifier::{CreateTask, MarkerModifier};
pub use recording::{RecordingSurface, SurfaceOp};
pub use surface::{CameraPosition, MarkerId, MarkerOptions, RenderingSurface};

use crate::algo::{Cluster, ClusterSet};
use crate::markers::{CollectionId, MarkerManager};
use geocluster_types::item::ClusterItem;
use parking_lot::Mutex;
use std::sync::Arc;

/// Listener for taps on cluster badges. Returns whether the tap was consumed.
pub type ClusterClickListener<T> = Arc<dyn Fn(&Cluster<T>) -> bool + Send + Sync>;

/// Listener for taps on individual item markers.
pub type ItemClickListener<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Where a renderer draws: the surface thread, the marker collections and
/// which collection holds item markers versus cluster badges.
pub struct RenderContext<S> {
    pub surface: SurfaceHandle<S>,
    pub markers: Arc<Mutex<MarkerManager>>,
    pub item_collection: CollectionId,
    pub cluster_collection: CollectionId,
}

impl<S> Clone for RenderContext<S> {
    fn clone(&self) -> Self {
        Self {
            surface: self.surface.clone(),
            markers: Arc::clone(&self.markers),
            item_collection: self.item_collection,
            cluster_collection: self.cluster_collection,
        }
    }
}

/// Receives cluster sets and keeps the map's markers in step with them.
pub trait ClusterRenderer<T: ClusterItem>: Send + Sync {
    /// A new set is ready. Implementations must not block.
    fn on_clusters_changed(&self, clusters: ClusterSet<T>);

    fn on_camera_idle(&self, _camera: &CameraPosition) {}

    fn set_animation(&self, animate: bool);

    /// Attached to a manager; start handling taps.
    fn on_add(&self);

    /// Detached from a manager; stop handling taps.
    fn on_remove(&self);

    fn set_on_cluster_click_listener(&self, listener: Option<ClusterClickListener<T>>);

    fn set_on_cluster_item_click_listener(&self, listener: Option<ItemClickListener<T>>);
}
