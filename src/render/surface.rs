//! The map a renderer draws onto, specified only at its interface.

use crate::projection::SphericalMercatorProjection;
use crate::render::icons::ClusterBadge;
use geo::{Point, Rect};
use geocluster_types::point::ProjectedPoint;
use std::fmt;
use std::sync::Arc;

/// Handle of a marker placed on a [`RenderingSurface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerId(pub u64);

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "marker#{}", self.0)
    }
}

/// Everything a surface needs to draw one marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerOptions {
    pub position: Point<f64>,
    pub title: Option<String>,
    pub snippet: Option<String>,
    /// Badge content for cluster markers; `None` for item markers.
    pub icon: Option<Arc<ClusterBadge>>,
}

impl MarkerOptions {
    pub fn new(position: Point<f64>) -> Self {
        Self {
            position,
            title: None,
            snippet: None,
            icon: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    pub fn with_icon(mut self, icon: Arc<ClusterBadge>) -> Self {
        self.icon = Some(icon);
        self
    }
}

/// Camera state of the map view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPosition {
    pub target: Point<f64>,
    pub zoom: f64,
    pub bearing: f64,
    pub tilt: f64,
}

impl CameraPosition {
    pub fn new(target: Point<f64>, zoom: f64) -> Self {
        Self {
            target,
            zoom,
            bearing: 0.0,
            tilt: 0.0,
        }
    }
}

/// A map view that can draw markers.
///
/// Implementations are owned by a single surface thread (see
/// [`SurfaceExecutor`](crate::render::executor::SurfaceExecutor)), so methods
/// take `&mut self` freely and never need internal locking.
pub trait RenderingSurface: Send + 'static {
    fn camera(&self) -> CameraPosition;

    /// Geographic extent currently on screen.
    fn visible_region(&self) -> Rect<f64>;

    fn add_marker(&mut self, options: MarkerOptions) -> MarkerId;

    fn set_marker_position(&mut self, marker: MarkerId, position: Point<f64>);

    fn remove_marker(&mut self, marker: MarkerId);

    /// World pixel coordinates of `position` at the current zoom.
    fn to_screen_location(&self, position: &Point<f64>) -> ProjectedPoint {
        SphericalMercatorProjection::for_zoom(self.camera().zoom).to_point(position)
    }

    /// Inverse of [`to_screen_location`](Self::to_screen_location).
    fn from_screen_location(&self, point: &ProjectedPoint) -> Point<f64> {
        SphericalMercatorProjection::for_zoom(self.camera().zoom).to_lat_lng(point)
    }
}

/// Inclusive containment of a geographic position in a region.
pub fn region_contains(region: &Rect<f64>, position: &Point<f64>) -> bool {
    let (min, max) = (region.min(), region.max());
    min.x <= position.x() && position.x() <= max.x && min.y <= position.y() && position.y() <= max.y
}
