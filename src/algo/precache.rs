//! Per-zoom memoization around another [`Algorithm`].
//!
//! Results are cached by discrete zoom in a small LRU table. Every mutation
//! drops the whole table. After each request the neighbouring zoom levels are
//! computed on short-lived background threads, so a one-level zoom usually
//! hits the cache.

use super::{Algorithm, ClusterSet, MAX_ZOOM, discrete_zoom};
use crate::config::CacheConfig;
use geocluster_types::item::ClusterItem;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use rustc_hash::FxHashSet;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

struct Inner<T> {
    algorithm: RwLock<Box<dyn Algorithm<T>>>,
    cache: RwLock<LruCache<i32, ClusterSet<T>>>,
    /// Bumped under the algorithm write lock on every mutation. Results computed
    /// against an older version are returned but never stored.
    version: AtomicU64,
    in_flight: Mutex<FxHashSet<i32>>,
    config: CacheConfig,
}

impl<T: ClusterItem> Inner<T> {
    fn mutate<R>(&self, f: impl FnOnce(&mut dyn Algorithm<T>) -> R) -> R {
        let result = {
            let mut algorithm = self.algorithm.write();
            let result = f(algorithm.as_mut());
            self.version.fetch_add(1, Ordering::AcqRel);
            result
        };
        // The algorithm lock is released before the cache lock is taken.
        self.cache.write().clear();
        result
    }

    fn cached(&self, zoom: i32) -> Option<ClusterSet<T>> {
        let hit = self.cache.read().peek(&zoom).cloned();
        if hit.is_some() {
            if let Some(mut cache) = self.cache.try_write() {
                cache.promote(&zoom);
            }
        }
        hit
    }

    fn get_or_compute(&self, zoom: i32) -> ClusterSet<T> {
        if let Some(clusters) = self.cached(zoom) {
            return clusters;
        }

        let mut cache = self.cache.write();
        if let Some(clusters) = cache.get(&zoom) {
            return clusters.clone();
        }

        let (clusters, version) = {
            let algorithm = self.algorithm.read();
            let version = self.version.load(Ordering::Acquire);
            (algorithm.clusters(zoom as f64), version)
        };

        if version == self.version.load(Ordering::Acquire) {
            cache.put(zoom, clusters.clone());
        } else {
            log::debug!("Discarding clusters for zoom {} computed before a mutation", zoom);
        }
        clusters
    }

    fn jitter(&self) -> Duration {
        let min = self.config.precache_delay_min_ms;
        let max = self.config.precache_delay_max_ms.max(min);
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

/// Caching decorator that memoizes clusters per discrete zoom level.
///
/// # Examples
///
/// ```
/// use geocluster::algo::{Algorithm, NonHierarchicalDistanceBasedAlgorithm, PreCachingAlgorithm};
/// use geocluster::config::CacheConfig;
/// use geocluster_types::item::GeoItem;
///
/// let mut cached = PreCachingAlgorithm::new(
///     Box::new(NonHierarchicalDistanceBasedAlgorithm::new()),
///     CacheConfig::default().with_precache(false),
/// );
/// cached.add_item(GeoItem::new(1, 2.35, 48.85));
///
/// let first = cached.clusters(10.4);
/// let second = cached.clusters(10.9);
/// assert!(first.ptr_eq(&second));
/// ```
pub struct PreCachingAlgorithm<T> {
    inner: Arc<Inner<T>>,
}

impl<T: ClusterItem> PreCachingAlgorithm<T> {
    pub fn new(algorithm: Box<dyn Algorithm<T>>, config: CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(Inner {
                algorithm: RwLock::new(algorithm),
                cache: RwLock::new(LruCache::new(capacity)),
                version: AtomicU64::new(0),
                in_flight: Mutex::new(FxHashSet::default()),
                config,
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Whether results for the zoom level containing `zoom` are cached.
    pub fn is_cached(&self, zoom: f64) -> bool {
        self.inner.cache.read().contains(&discrete_zoom(zoom))
    }

    /// Cached zoom levels, most recently used first.
    pub fn cached_zooms(&self) -> Vec<i32> {
        self.inner.cache.read().iter().map(|(zoom, _)| *zoom).collect()
    }

    /// Number of speculative computations currently scheduled or running.
    pub fn pending_precaches(&self) -> usize {
        self.inner.in_flight.lock().len()
    }

    fn precache_neighbours(&self, zoom: i32) {
        if !self.inner.config.precache {
            return;
        }
        for neighbour in [zoom + 1, zoom - 1] {
            if (0..=MAX_ZOOM).contains(&neighbour) {
                self.precache(neighbour);
            }
        }
    }

    fn precache(&self, zoom: i32) {
        if self.inner.cache.read().contains(&zoom) {
            return;
        }
        if !self.inner.in_flight.lock().insert(zoom) {
            return;
        }

        let delay = self.inner.jitter();
        let weak: Weak<Inner<T>> = Arc::downgrade(&self.inner);
        let spawned = thread::Builder::new()
            .name(format!("geocluster-precache-{}", zoom))
            .spawn(move || {
                thread::sleep(delay);
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                inner.get_or_compute(zoom);
                inner.in_flight.lock().remove(&zoom);
            });

        if let Err(e) = spawned {
            log::warn!("Failed to spawn precache thread for zoom {}: {}", zoom, e);
            self.inner.in_flight.lock().remove(&zoom);
        }
    }
}

impl<T: ClusterItem> Algorithm<T> for PreCachingAlgorithm<T> {
    fn add_item(&mut self, item: T) {
        self.inner.mutate(|algorithm| algorithm.add_item(item));
    }

    fn add_items(&mut self, items: Vec<T>) {
        self.inner.mutate(|algorithm| algorithm.add_items(items));
    }

    fn remove_item(&mut self, item: &T) -> bool {
        self.inner.mutate(|algorithm| algorithm.remove_item(item))
    }

    fn clear_items(&mut self) {
        self.inner.mutate(|algorithm| algorithm.clear_items());
    }

    fn items(&self) -> Vec<T> {
        self.inner.algorithm.read().items()
    }

    fn clusters(&self, zoom: f64) -> ClusterSet<T> {
        let zoom = discrete_zoom(zoom);
        let clusters = self.inner.get_or_compute(zoom);
        self.precache_neighbours(zoom);
        clusters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::NonHierarchicalDistanceBasedAlgorithm;
    use geocluster_types::item::GeoItem;
    use std::time::Instant;

    fn cached(config: CacheConfig) -> PreCachingAlgorithm<GeoItem> {
        let mut algorithm = PreCachingAlgorithm::new(
            Box::new(NonHierarchicalDistanceBasedAlgorithm::new()),
            config,
        );
        for id in 0..50 {
            algorithm.add_item(GeoItem::new(id, (id % 10) as f64 * 0.01, (id / 10) as f64 * 0.01));
        }
        algorithm
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    #[test]
    fn test_hit_returns_same_allocation() {
        let algorithm = cached(CacheConfig::default().with_precache(false));
        let first = algorithm.clusters(12.0);
        let second = algorithm.clusters(12.7);
        assert!(first.ptr_eq(&second));
        assert_eq!(algorithm.cached_zooms(), vec![12]);
    }

    #[test]
    fn test_mutation_invalidates() {
        let mut algorithm = cached(CacheConfig::default().with_precache(false));
        let before = algorithm.clusters(20.0);
        assert!(algorithm.is_cached(20.0));

        algorithm.add_item(GeoItem::new(999, 100.0, -40.0));
        assert!(!algorithm.is_cached(20.0));

        let after = algorithm.clusters(20.0);
        assert_eq!(after.item_count(), before.item_count() + 1);

        assert!(algorithm.remove_item(&GeoItem::new(999, 0.0, 0.0)));
        assert_eq!(algorithm.clusters(20.0).item_count(), before.item_count());

        algorithm.clear_items();
        assert!(algorithm.clusters(20.0).is_empty());
        assert!(algorithm.items().is_empty());
    }

    #[test]
    fn test_lru_eviction() {
        let algorithm = cached(
            CacheConfig::default()
                .with_capacity(2)
                .with_precache(false),
        );
        algorithm.clusters(3.0);
        algorithm.clusters(4.0);
        algorithm.clusters(3.0);
        algorithm.clusters(5.0);
        assert_eq!(algorithm.cached_zooms(), vec![5, 3]);
    }

    #[test]
    fn test_precaches_neighbours() {
        let algorithm = cached(
            CacheConfig::default().with_precache_delay(Duration::ZERO, Duration::from_millis(5)),
        );
        algorithm.clusters(8.0);
        assert!(wait_for(|| algorithm.is_cached(7.0) && algorithm.is_cached(9.0)));
        assert!(wait_for(|| algorithm.pending_precaches() == 0));
    }

    #[test]
    fn test_precache_stays_in_zoom_range() {
        let algorithm = cached(
            CacheConfig::default().with_precache_delay(Duration::ZERO, Duration::ZERO),
        );
        algorithm.clusters(0.0);
        assert!(wait_for(|| algorithm.is_cached(1.0)));
        assert!(wait_for(|| algorithm.pending_precaches() == 0));
        let mut zooms = algorithm.cached_zooms();
        zooms.sort_unstable();
        assert_eq!(zooms, vec![0, 1]);
    }

    #[test]
    fn test_matches_wrapped_algorithm() {
        let mut plain = NonHierarchicalDistanceBasedAlgorithm::new();
        let algorithm = cached(CacheConfig::default().with_precache(false));
        plain.add_items(algorithm.items());
        for zoom in [2.0, 9.0, 15.0] {
            assert_eq!(algorithm.clusters(zoom), plain.clusters(zoom));
        }
    }
}
