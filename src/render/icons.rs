//! Cluster badge content: bucketed counts and their colours.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Thresholds for badge text. Sizes at or above a threshold show `"<threshold>+"`.
pub const BUCKETS: [usize; 7] = [10, 20, 50, 100, 200, 500, 1000];

/// Content of the badge drawn for a cluster marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClusterBadge {
    pub bucket: usize,
    pub text: String,
    /// 0xAARRGGBB
    pub color: u32,
}

impl ClusterBadge {
    pub fn for_bucket(bucket: usize) -> Self {
        Self {
            bucket,
            text: cluster_text(bucket),
            color: cluster_color(bucket),
        }
    }
}

/// Bucket a cluster of `size` items is drawn under.
///
/// ```
/// use geocluster::render::icons::bucket_for;
///
/// assert_eq!(bucket_for(7), 7);
/// assert_eq!(bucket_for(10), 10);
/// assert_eq!(bucket_for(37), 20);
/// assert_eq!(bucket_for(5_000), 1000);
/// ```
pub fn bucket_for(size: usize) -> usize {
    if size <= BUCKETS[0] {
        return size;
    }
    for window in BUCKETS.windows(2) {
        if size < window[1] {
            return window[0];
        }
    }
    BUCKETS[BUCKETS.len() - 1]
}

pub fn cluster_text(bucket: usize) -> String {
    if bucket < BUCKETS[0] {
        bucket.to_string()
    } else {
        format!("{}+", bucket)
    }
}

/// Badge colour for a bucket: hue falls from blue towards red as the bucket grows.
pub fn cluster_color(bucket: usize) -> u32 {
    const HUE_RANGE: f64 = 220.0;
    const SIZE_RANGE: f64 = 300.0;

    let size = (bucket as f64).min(SIZE_RANGE);
    let hue = (SIZE_RANGE - size) * (SIZE_RANGE - size) / (SIZE_RANGE * SIZE_RANGE) * HUE_RANGE;
    hsv_to_argb(hue, 1.0, 0.6)
}

fn hsv_to_argb(hue: f64, saturation: f64, value: f64) -> u32 {
    let chroma = value * saturation;
    let sector = (hue / 60.0) % 6.0;
    let x = chroma * (1.0 - ((sector % 2.0) - 1.0).abs());
    let (r, g, b) = match sector as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = value - chroma;
    let channel = |c: f64| ((c + m) * 255.0).round().clamp(0.0, 255.0) as u32;
    0xFF00_0000 | (channel(r) << 16) | (channel(g) << 8) | channel(b)
}

/// Badges built so far, one per bucket. Each renderer owns its own cache.
#[derive(Debug, Default)]
pub struct IconCache {
    badges: Mutex<FxHashMap<usize, Arc<ClusterBadge>>>,
}

impl IconCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared badge for a cluster of `size` items.
    pub fn badge_for(&self, size: usize) -> Arc<ClusterBadge> {
        let bucket = bucket_for(size);
        Arc::clone(
            self.badges
                .lock()
                .entry(bucket)
                .or_insert_with(|| Arc::new(ClusterBadge::for_bucket(bucket))),
        )
    }

    pub fn len(&self) -> usize {
        self.badges.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets() {
        assert_eq!(bucket_for(5), 5);
        assert_eq!(bucket_for(11), 10);
        assert_eq!(bucket_for(19), 10);
        assert_eq!(bucket_for(20), 20);
        assert_eq!(bucket_for(499), 200);
        assert_eq!(bucket_for(999), 500);
        assert_eq!(bucket_for(1000), 1000);
    }

    #[test]
    fn test_text() {
        assert_eq!(cluster_text(5), "5");
        assert_eq!(cluster_text(10), "10+");
        assert_eq!(cluster_text(bucket_for(250)), "200+");
    }

    #[test]
    fn test_large_buckets_are_red() {
        assert_eq!(cluster_color(500), 0xFF99_0000);
        assert_eq!(cluster_color(1000), 0xFF99_0000);
    }

    #[test]
    fn test_small_buckets_are_blue() {
        let color = cluster_color(5);
        let (r, g, b) = ((color >> 16) & 0xFF, (color >> 8) & 0xFF, color & 0xFF);
        assert_eq!(b, 153);
        assert_eq!(r, 0);
        assert!(g > 0 && g < b);
    }

    #[test]
    fn test_icon_cache_shares_badges() {
        let cache = IconCache::new();
        let a = cache.badge_for(12);
        let b = cache.badge_for(15);
        let c = cache.badge_for(60);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(a.text, "10+");
        assert_eq!(c.text, "50+");
        assert_eq!(cache.len(), 2);
    }
}
