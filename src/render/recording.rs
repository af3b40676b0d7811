//! An in-memory [`RenderingSurface`] that records every call.
//!
//! Useful for tests, benchmarks and headless clustering where the marker
//! plan matters but nothing is drawn.

use crate::render::surface::{CameraPosition, MarkerId, MarkerOptions, RenderingSurface};
use geo::{Point, Rect, coord};
use rustc_hash::FxHashMap;

/// One call made against a [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOp {
    Add { marker: MarkerId, position: Point<f64> },
    Move { marker: MarkerId, position: Point<f64> },
    Remove { marker: MarkerId },
}

#[derive(Debug, Clone)]
pub struct RecordingSurface {
    camera: CameraPosition,
    visible: Rect<f64>,
    next_id: u64,
    markers: FxHashMap<MarkerId, MarkerOptions>,
    ops: Vec<SurfaceOp>,
}

impl RecordingSurface {
    pub fn new(camera: CameraPosition, visible: Rect<f64>) -> Self {
        Self {
            camera,
            visible,
            next_id: 0,
            markers: FxHashMap::default(),
            ops: Vec::new(),
        }
    }

    /// The whole Mercator world, which keeps every marker on screen.
    pub fn world() -> Rect<f64> {
        Rect::new(coord! { x: -180.0, y: -85.0 }, coord! { x: 180.0, y: 85.0 })
    }

    pub fn set_camera(&mut self, camera: CameraPosition) {
        self.camera = camera;
    }

    pub fn set_visible_region(&mut self, visible: Rect<f64>) {
        self.visible = visible;
    }

    /// Every call since creation or the last [`clear_ops`](Self::clear_ops).
    pub fn ops(&self) -> &[SurfaceOp] {
        &self.ops
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    /// Markers currently on the surface, with their latest positions.
    pub fn marker(&self, marker: MarkerId) -> Option<&MarkerOptions> {
        self.markers.get(&marker)
    }

    pub fn markers(&self) -> impl Iterator<Item = (&MarkerId, &MarkerOptions)> {
        self.markers.iter()
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }
}

impl Default for RecordingSurface {
    fn default() -> Self {
        Self::new(CameraPosition::new(Point::new(0.0, 0.0), 0.0), Self::world())
    }
}

impl RenderingSurface for RecordingSurface {
    fn camera(&self) -> CameraPosition {
        self.camera
    }

    fn visible_region(&self) -> Rect<f64> {
        self.visible
    }

    fn add_marker(&mut self, options: MarkerOptions) -> MarkerId {
        self.next_id += 1;
        let marker = MarkerId(self.next_id);
        self.ops.push(SurfaceOp::Add {
            marker,
            position: options.position,
        });
        self.markers.insert(marker, options);
        marker
    }

    fn set_marker_position(&mut self, marker: MarkerId, position: Point<f64>) {
        if let Some(options) = self.markers.get_mut(&marker) {
            options.position = position;
        }
        self.ops.push(SurfaceOp::Move { marker, position });
    }

    fn remove_marker(&mut self, marker: MarkerId) {
        if self.markers.remove(&marker).is_none() {
            log::warn!("Removing {} which is not on the surface", marker);
        }
        self.ops.push(SurfaceOp::Remove { marker });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_calls() {
        let mut surface = RecordingSurface::default();
        let a = surface.add_marker(MarkerOptions::new(Point::new(1.0, 1.0)));
        surface.set_marker_position(a, Point::new(2.0, 2.0));
        surface.remove_marker(a);

        assert_eq!(
            surface.ops(),
            &[
                SurfaceOp::Add {
                    marker: a,
                    position: Point::new(1.0, 1.0)
                },
                SurfaceOp::Move {
                    marker: a,
                    position: Point::new(2.0, 2.0)
                },
                SurfaceOp::Remove { marker: a },
            ]
        );
        assert_eq!(surface.marker_count(), 0);
    }

    #[test]
    fn test_screen_location_roundtrip() {
        let mut surface = RecordingSurface::default();
        surface.set_camera(CameraPosition::new(Point::new(0.0, 0.0), 4.0));
        let position = Point::new(12.5, -33.0);
        let screen = surface.to_screen_location(&position);
        assert!((screen.x - 256.0 * 16.0 * (12.5 / 360.0 + 0.5)).abs() < 1e-9);
        let back = surface.from_screen_location(&screen);
        assert!((back.x() - position.x()).abs() < 1e-9);
        assert!((back.y() - position.y()).abs() < 1e-9);
    }
}
