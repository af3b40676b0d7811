use crate::point::ProjectedPoint;
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in projected space.
///
/// Used both as quadtree node extents and as range-query windows. The
/// midpoints are cached because the quadtree consults them on every descent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub mid_x: f64,
    pub mid_y: f64,
}

impl Bounds {
    /// Create bounds from their extents.
    ///
    /// # Arguments
    ///
    /// * `min_x` - Left edge
    /// * `max_x` - Right edge
    /// * `min_y` - Top edge
    /// * `max_y` - Bottom edge
    ///
    /// # Examples
    ///
    /// ```
    /// use geocluster_types::bounds::Bounds;
    ///
    /// let bounds = Bounds::new(0.0, 10.0, 0.0, 20.0);
    /// assert_eq!(bounds.mid_x, 5.0);
    /// assert_eq!(bounds.mid_y, 10.0);
    /// ```
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
            mid_x: (min_x + max_x) / 2.0,
            mid_y: (min_y + max_y) / 2.0,
        }
    }

    /// Square bounds of side `span` centred on `center`.
    pub fn from_span(center: &ProjectedPoint, span: f64) -> Self {
        let half = span / 2.0;
        Self::new(
            center.x - half,
            center.x + half,
            center.y - half,
            center.y + half,
        )
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Inclusive point containment.
    #[inline]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.min_x <= x && x <= self.max_x && self.min_y <= y && y <= self.max_y
    }

    #[inline]
    pub fn contains_point(&self, point: &ProjectedPoint) -> bool {
        self.contains(point.x, point.y)
    }

    /// Whether `other` lies entirely inside these bounds.
    pub fn contains_bounds(&self, other: &Bounds) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    /// Strict overlap test; rectangles that only share an edge do not intersect.
    pub fn intersects(&self, min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> bool {
        min_x < self.max_x && self.min_x < max_x && min_y < self.max_y && self.min_y < max_y
    }

    pub fn intersects_bounds(&self, other: &Bounds) -> bool {
        self.intersects(other.min_x, other.max_x, other.min_y, other.max_y)
    }

    /// The four equal quadrants, ordered top-left, top-right, bottom-left,
    /// bottom-right.
    pub fn quadrants(&self) -> [Bounds; 4] {
        [
            Bounds::new(self.min_x, self.mid_x, self.min_y, self.mid_y),
            Bounds::new(self.mid_x, self.max_x, self.min_y, self.mid_y),
            Bounds::new(self.min_x, self.mid_x, self.mid_y, self.max_y),
            Bounds::new(self.mid_x, self.max_x, self.mid_y, self.max_y),
        ]
    }
}
