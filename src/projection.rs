//! Spherical Mercator projection between geographic and projected space.

use geo::Point;
use geocluster_types::point::ProjectedPoint;
use std::f64::consts::PI;

/// Side length in pixels of the world at zoom 0.
pub const TILE_SIZE: f64 = 256.0;

/// Width of the projected world at a zoom level: `256 * 2^zoom`.
#[inline]
pub fn world_width(zoom: f64) -> f64 {
    TILE_SIZE * 2f64.powf(zoom)
}

/// Maps longitude/latitude onto a square of side `world_width`.
///
/// x grows eastwards from the antimeridian, y grows southwards from the
/// northern edge. Latitudes at or beyond the poles project to infinity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphericalMercatorProjection {
    world_width: f64,
}

impl SphericalMercatorProjection {
    pub fn new(world_width: f64) -> Self {
        Self { world_width }
    }

    /// Projection for a map at the given (possibly fractional) zoom.
    pub fn for_zoom(zoom: f64) -> Self {
        Self::new(world_width(zoom))
    }

    pub fn world_width(&self) -> f64 {
        self.world_width
    }

    /// Project a geographic position (x = longitude, y = latitude).
    ///
    /// # Examples
    ///
    /// ```
    /// use geo::Point;
    /// use geocluster::projection::SphericalMercatorProjection;
    ///
    /// let projection = SphericalMercatorProjection::new(256.0);
    /// let center = projection.to_point(&Point::new(0.0, 0.0));
    /// assert!((center.x - 128.0).abs() < 1e-9);
    /// assert!((center.y - 128.0).abs() < 1e-9);
    /// ```
    pub fn to_point(&self, position: &Point<f64>) -> ProjectedPoint {
        let x = position.x() / 360.0 + 0.5;
        let siny = position.y().to_radians().sin();
        let y = 0.5 * ((1.0 + siny) / (1.0 - siny)).ln() / -(2.0 * PI) + 0.5;
        ProjectedPoint::new(x * self.world_width, y * self.world_width)
    }

    /// Inverse of [`to_point`](Self::to_point).
    pub fn to_lat_lng(&self, point: &ProjectedPoint) -> Point<f64> {
        let x = point.x / self.world_width - 0.5;
        let longitude = x * 360.0;

        let y = 0.5 - point.y / self.world_width;
        let latitude = 90.0 - ((-y * 2.0 * PI).exp().atan() * 2.0).to_degrees();

        Point::new(longitude, latitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn test_world_width_doubles_per_zoom() {
        assert_eq!(world_width(0.0), 256.0);
        assert_eq!(world_width(1.0), 512.0);
        assert_eq!(world_width(10.0), 262_144.0);
    }

    #[test]
    fn test_roundtrip() {
        let projection = SphericalMercatorProjection::for_zoom(12.0);
        for (lng, lat) in [(-74.006, 40.7128), (139.6917, 35.6895), (0.0, 0.0), (-179.9, -80.0)] {
            let back = projection.to_lat_lng(&projection.to_point(&Point::new(lng, lat)));
            assert_close(back.x(), lng);
            assert_close(back.y(), lat);
        }
    }

    #[test]
    fn test_axes_orientation() {
        let projection = SphericalMercatorProjection::new(1.0);
        let west = projection.to_point(&Point::new(-180.0, 0.0));
        let east = projection.to_point(&Point::new(180.0, 0.0));
        assert_close(west.x, 0.0);
        assert_close(east.x, 1.0);

        let north = projection.to_point(&Point::new(0.0, 60.0));
        let south = projection.to_point(&Point::new(0.0, -60.0));
        assert!(north.y < 0.5 && south.y > 0.5);
    }

    #[test]
    fn test_poles_project_outside_world() {
        let projection = SphericalMercatorProjection::new(256.0);
        assert!(!projection.to_point(&Point::new(0.0, 90.0)).is_finite());
    }
}
