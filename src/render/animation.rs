//! Marker movement between two positions.

use geo::Point;

/// Decelerating ease: fast start, slow finish.
#[inline]
pub fn decelerate(fraction: f64) -> f64 {
    let t = fraction.clamp(0.0, 1.0);
    1.0 - (1.0 - t) * (1.0 - t)
}

/// Position `fraction` of the way from `from` to `to`.
///
/// Latitude moves linearly. Longitude takes the shorter way around, crossing
/// the antimeridian when that is closer.
pub fn interpolate(from: Point<f64>, to: Point<f64>, fraction: f64) -> Point<f64> {
    let latitude = (to.y() - from.y()) * fraction + from.y();
    let mut longitude_delta = to.x() - from.x();
    if longitude_delta.abs() > 180.0 {
        longitude_delta -= longitude_delta.signum() * 360.0;
    }
    Point::new(longitude_delta * fraction + from.x(), latitude)
}

/// A marker gliding between two positions over a fixed number of frames.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerAnimation {
    pub from: Point<f64>,
    pub to: Point<f64>,
    frames: u32,
    frame: u32,
}

impl MarkerAnimation {
    pub fn new(from: Point<f64>, to: Point<f64>, frames: u32) -> Self {
        Self {
            from,
            to,
            frames: frames.max(1),
            frame: 0,
        }
    }

    /// Advance one frame and return the marker's new position.
    pub fn step(&mut self) -> Point<f64> {
        self.frame = (self.frame + 1).min(self.frames);
        if self.is_finished() {
            return self.to;
        }
        let fraction = decelerate(self.frame as f64 / self.frames as f64);
        interpolate(self.from, self.to, fraction)
    }

    pub fn is_finished(&self) -> bool {
        self.frame >= self.frames
    }
}
