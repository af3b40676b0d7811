use serde::{Deserialize, Serialize};

/// A point in projected (screen-like) space.
///
/// Coordinates are produced by a spherical Mercator projection whose world
/// spans `[0, world_width]` on both axes, with y growing southwards.
///
/// # Examples
///
/// ```
/// use geocluster_types::point::ProjectedPoint;
///
/// let a = ProjectedPoint::new(0.0, 0.0);
/// let b = ProjectedPoint::new(3.0, 4.0);
/// assert_eq!(a.distance_squared(&b), 25.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProjectedPoint {
    pub x: f64,
    pub y: f64,
}

impl ProjectedPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance, cheap enough for nearest-neighbour scans.
    #[inline]
    pub fn distance_squared(&self, other: &ProjectedPoint) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f64, f64)> for ProjectedPoint {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}
