//! The coordinator tying items, clustering and rendering together.
//!
//! A [`ClusterManager`] owns the item set (behind a caching algorithm), a
//! worker pool that computes clusters off the surface thread and the renderer
//! that draws them. Camera and tap events from the map are fed in through
//! [`ClusterManager::on_camera_idle`] and [`ClusterManager::on_marker_click`].

use crate::algo::{Algorithm, ClusterSet, PreCachingAlgorithm};
use crate::builder::ClusterManagerBuilder;
use crate::config::Config;
use crate::error::Result;
use crate::markers::{CollectionId, MarkerManager};
use crate::render::{
    CameraPosition, ClusterClickListener, ClusterRenderer, ItemClickListener, MarkerId,
    RenderContext, RenderingSurface, SurfaceHandle,
};
use crate::worker::WorkerPool;
use geocluster_types::item::ClusterItem;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

struct Shared<T: ClusterItem, S> {
    config: Config,
    context: RenderContext<S>,
    algorithm: RwLock<PreCachingAlgorithm<T>>,
    renderer: RwLock<Arc<dyn ClusterRenderer<T>>>,
    generation: AtomicU64,
    /// Held from the final staleness check until the renderer has the set.
    delivery: Mutex<()>,
    previous_zoom: Mutex<Option<f64>>,
    cluster_listener: RwLock<Option<ClusterClickListener<T>>>,
    item_listener: RwLock<Option<ItemClickListener<T>>>,
}

impl<T: ClusterItem, S: RenderingSurface> Shared<T, S> {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) == generation
    }

    fn renderer(&self) -> Arc<dyn ClusterRenderer<T>> {
        Arc::clone(&*self.renderer.read())
    }

    /// Worker side of [`ClusterManager::cluster`].
    fn compute(&self, generation: u64) {
        if !self.is_current(generation) {
            log::debug!("Skipping superseded cluster request {}", generation);
            return;
        }
        let zoom = match self.context.surface.call(|surface| surface.camera().zoom) {
            Ok(zoom) => zoom,
            Err(e) => {
                log::debug!("Dropping cluster request {}: {}", generation, e);
                return;
            }
        };
        let clusters = self.algorithm.read().clusters(zoom);
        let _delivery = self.delivery.lock();
        if !self.is_current(generation) {
            log::debug!(
                "Discarding {} clusters from superseded request {}",
                clusters.len(),
                generation
            );
            return;
        }
        self.renderer().on_clusters_changed(clusters);
    }

    fn install_listeners(&self, renderer: &dyn ClusterRenderer<T>) {
        renderer.set_on_cluster_click_listener(self.cluster_listener.read().clone());
        renderer.set_on_cluster_item_click_listener(self.item_listener.read().clone());
    }
}

/// Groups items into clusters for the current zoom and keeps the map's
/// markers in step.
///
/// Mutating the item set does not redraw anything by itself; call
/// [`cluster`](Self::cluster) afterwards. Camera changes re-cluster
/// automatically through [`on_camera_idle`](Self::on_camera_idle).
///
/// None of the methods may be called from the surface thread.
///
/// # Examples
///
/// ```
/// use geocluster::prelude::*;
///
/// let executor = SurfaceExecutor::spawn(RecordingSurface::default())?;
/// let manager = ClusterManager::<GeoItem, RecordingSurface>::new(executor.handle())?;
///
/// manager.add_item(GeoItem::new(1, 0.0, 0.0));
/// manager.add_item(GeoItem::new(2, 0.0001, 0.0001));
/// manager.add_item(GeoItem::new(3, 50.0, 50.0));
///
/// assert_eq!(manager.clusters(14.0).len(), 2);
/// manager.cluster()?;
/// # Ok::<(), geocluster::ClusterError>(())
/// ```
pub struct ClusterManager<T: ClusterItem, S: RenderingSurface> {
    // Declared first so workers are joined before the shared state goes.
    pool: WorkerPool,
    shared: Arc<Shared<T, S>>,
}

impl<T: ClusterItem, S: RenderingSurface> ClusterManager<T, S> {
    /// Manager with the default configuration, algorithm and renderer.
    pub fn new(surface: SurfaceHandle<S>) -> Result<Self> {
        ClusterManagerBuilder::new().build(surface)
    }

    pub(crate) fn from_parts(
        config: Config,
        context: RenderContext<S>,
        algorithm: Box<dyn Algorithm<T>>,
        renderer: Arc<dyn ClusterRenderer<T>>,
    ) -> Result<Self> {
        let pool = WorkerPool::new("geocluster-worker", config.worker_threads)?;
        let algorithm = PreCachingAlgorithm::new(algorithm, config.cache.clone());
        renderer.on_add();
        let shared = Arc::new(Shared {
            config,
            context,
            algorithm: RwLock::new(algorithm),
            renderer: RwLock::new(renderer),
            generation: AtomicU64::new(0),
            delivery: Mutex::new(()),
            previous_zoom: Mutex::new(None),
            cluster_listener: RwLock::new(None),
            item_listener: RwLock::new(None),
        });
        Ok(Self { pool, shared })
    }

    pub fn add_item(&self, item: T) {
        self.shared.algorithm.write().add_item(item);
    }

    pub fn add_items(&self, items: Vec<T>) {
        self.shared.algorithm.write().add_items(items);
    }

    /// Returns whether the item was present.
    pub fn remove_item(&self, item: &T) -> bool {
        self.shared.algorithm.write().remove_item(item)
    }

    pub fn clear_items(&self) {
        self.shared.algorithm.write().clear_items();
    }

    pub fn items(&self) -> Vec<T> {
        self.shared.algorithm.read().items()
    }

    /// Clusters at `zoom`, computed synchronously or served from the cache.
    pub fn clusters(&self, zoom: f64) -> ClusterSet<T> {
        self.shared.algorithm.read().clusters(zoom)
    }

    /// Discrete zoom levels currently cached, most recently used first.
    pub fn cached_zooms(&self) -> Vec<i32> {
        self.shared.algorithm.read().cached_zooms()
    }

    /// Recompute clusters for the camera's current zoom in the background and
    /// hand them to the renderer.
    ///
    /// Only the latest request is rendered; results of earlier requests that
    /// finish afterwards are dropped.
    pub fn cluster(&self) -> Result<()> {
        let generation = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let shared = Arc::clone(&self.shared);
        self.pool.execute(move || shared.compute(generation))
    }

    /// The camera has stopped moving. Re-clusters unless only the target,
    /// bearing or tilt changed since the last idle event.
    pub fn on_camera_idle(&self, camera: &CameraPosition) -> Result<()> {
        self.shared.renderer().on_camera_idle(camera);

        let mut previous = self.shared.previous_zoom.lock();
        if *previous == Some(camera.zoom) {
            return Ok(());
        }
        *previous = Some(camera.zoom);
        drop(previous);
        self.cluster()
    }

    /// Route a tap to the collection owning `marker`. Returns whether a
    /// listener consumed it.
    pub fn on_marker_click(&self, marker: MarkerId) -> bool {
        let listener = self.shared.context.markers.lock().click_listener_for(marker);
        listener.is_some_and(|listener| listener(marker))
    }

    /// Replace the algorithm, moving every item into it, and re-cluster.
    pub fn set_algorithm(&self, mut algorithm: Box<dyn Algorithm<T>>) -> Result<()> {
        {
            let mut current = self.shared.algorithm.write();
            algorithm.add_items(current.items());
            *current = PreCachingAlgorithm::new(algorithm, self.shared.config.cache.clone());
        }
        self.cluster()
    }

    /// Replace the renderer and re-cluster.
    ///
    /// The old renderer is detached and every marker it drew is removed from
    /// the surface before the new one is attached.
    pub fn set_renderer(&self, renderer: Arc<dyn ClusterRenderer<T>>) -> Result<()> {
        let old = std::mem::replace(&mut *self.shared.renderer.write(), Arc::clone(&renderer));
        old.on_remove();
        drop(old);

        let context = self.shared.context.clone();
        self.shared.context.surface.post(move |surface| {
            let mut markers = context.markers.lock();
            for collection in [context.item_collection, context.cluster_collection] {
                if let Err(e) = markers.clear(collection, surface) {
                    log::warn!("Failed to clear {}: {}", collection, e);
                }
            }
        })?;

        renderer.on_add();
        self.shared.install_listeners(renderer.as_ref());
        self.cluster()
    }

    pub fn set_animation(&self, animate: bool) {
        self.shared.renderer().set_animation(animate);
    }

    pub fn set_on_cluster_click_listener(&self, listener: Option<ClusterClickListener<T>>) {
        *self.shared.cluster_listener.write() = listener.clone();
        self.shared.renderer().set_on_cluster_click_listener(listener);
    }

    pub fn set_on_cluster_item_click_listener(&self, listener: Option<ItemClickListener<T>>) {
        *self.shared.item_listener.write() = listener.clone();
        self.shared
            .renderer()
            .set_on_cluster_item_click_listener(listener);
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    pub fn renderer(&self) -> Arc<dyn ClusterRenderer<T>> {
        self.shared.renderer()
    }

    pub fn render_context(&self) -> RenderContext<S> {
        self.shared.context.clone()
    }

    pub fn marker_manager(&self) -> Arc<Mutex<MarkerManager>> {
        Arc::clone(&self.shared.context.markers)
    }

    pub fn item_collection(&self) -> CollectionId {
        self.shared.context.item_collection
    }

    pub fn cluster_collection(&self) -> CollectionId {
        self.shared.context.cluster_collection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::GridBasedAlgorithm;
    use crate::render::{MarkerOptions, RecordingSurface, SurfaceExecutor};
    use crossbeam_channel::{Receiver, Sender};
    use geo::Point;
    use geocluster_types::item::GeoItem;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    struct ForwardingRenderer {
        sets: Sender<ClusterSet<GeoItem>>,
        attached: AtomicBool,
        idle_events: AtomicU64,
        has_item_listener: AtomicBool,
    }

    impl ForwardingRenderer {
        fn new() -> (Arc<Self>, Receiver<ClusterSet<GeoItem>>) {
            let (sets, received) = crossbeam_channel::unbounded();
            let renderer = Arc::new(Self {
                sets,
                attached: AtomicBool::new(false),
                idle_events: AtomicU64::new(0),
                has_item_listener: AtomicBool::new(false),
            });
            (renderer, received)
        }
    }

    impl ClusterRenderer<GeoItem> for ForwardingRenderer {
        fn on_clusters_changed(&self, clusters: ClusterSet<GeoItem>) {
            let _ = self.sets.send(clusters);
        }

        fn on_camera_idle(&self, _camera: &CameraPosition) {
            self.idle_events.fetch_add(1, Ordering::SeqCst);
        }

        fn set_animation(&self, _animate: bool) {}

        fn on_add(&self) {
            self.attached.store(true, Ordering::SeqCst);
        }

        fn on_remove(&self) {
            self.attached.store(false, Ordering::SeqCst);
        }

        fn set_on_cluster_click_listener(&self, _listener: Option<ClusterClickListener<GeoItem>>) {}

        fn set_on_cluster_item_click_listener(&self, listener: Option<ItemClickListener<GeoItem>>) {
            self.has_item_listener
                .store(listener.is_some(), Ordering::SeqCst);
        }
    }

    struct Fixture {
        executor: SurfaceExecutor<RecordingSurface>,
        manager: ClusterManager<GeoItem, RecordingSurface>,
        renderer: Arc<ForwardingRenderer>,
        sets: Receiver<ClusterSet<GeoItem>>,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_workers(1)
        }

        fn with_workers(threads: usize) -> Self {
            let executor = SurfaceExecutor::spawn(RecordingSurface::default()).unwrap();
            let (renderer, sets) = ForwardingRenderer::new();
            let forwarding = Arc::clone(&renderer);
            let manager = ClusterManagerBuilder::new()
                .config(Config::default().with_worker_threads(threads))
                .renderer(move |_context, _config| Ok(forwarding as Arc<dyn ClusterRenderer<GeoItem>>))
                .build(executor.handle())
                .unwrap();
            Self {
                executor,
                manager,
                renderer,
                sets,
            }
        }

        fn set_zoom(&self, zoom: f64) {
            self.executor
                .handle()
                .call(move |surface| {
                    surface.set_camera(CameraPosition::new(Point::new(0.0, 0.0), zoom))
                })
                .unwrap();
        }

        fn next_set(&self) -> Option<ClusterSet<GeoItem>> {
            self.sets.recv_timeout(Duration::from_secs(5)).ok()
        }

        fn no_more_sets(&self) -> bool {
            self.sets.recv_timeout(Duration::from_millis(100)).is_err()
        }
    }

    fn scenario() -> Vec<GeoItem> {
        vec![
            GeoItem::new(1, 0.0, 0.0),
            GeoItem::new(2, 0.0001, 0.0001),
            GeoItem::new(3, 50.0, 50.0),
        ]
    }

    #[test]
    fn test_cluster_renders_camera_zoom() {
        let fixture = Fixture::new();
        assert!(fixture.renderer.attached.load(Ordering::SeqCst));
        fixture.manager.add_items(scenario());
        fixture.set_zoom(14.0);

        fixture.manager.cluster().unwrap();
        let set = fixture.next_set().unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.item_count(), 3);
    }

    #[test]
    fn test_latest_request_wins() {
        let fixture = Fixture::new();
        fixture.set_zoom(14.0);
        for id in 0..20 {
            fixture
                .manager
                .add_item(GeoItem::new(id, id as f64, 0.0));
            fixture.manager.cluster().unwrap();
        }

        let mut last = fixture.next_set().unwrap();
        while let Ok(set) = fixture.sets.recv_timeout(Duration::from_millis(200)) {
            last = set;
        }
        assert_eq!(last.item_count(), 20);
    }

    #[test]
    fn test_parallel_workers_never_deliver_an_older_set() {
        let fixture = Fixture::with_workers(4);
        fixture.set_zoom(14.0);
        for id in 0..200 {
            fixture
                .manager
                .add_item(GeoItem::new(id, (id % 360) as f64 - 180.0, 0.0));
            fixture.manager.cluster().unwrap();
        }

        let mut counts = Vec::new();
        while let Some(set) = fixture.next_set() {
            counts.push(set.item_count());
            if set.item_count() == 200 {
                break;
            }
        }
        while let Ok(set) = fixture.sets.recv_timeout(Duration::from_millis(200)) {
            counts.push(set.item_count());
        }
        assert_eq!(counts.last(), Some(&200));
        assert!(counts.windows(2).all(|pair| pair[0] <= pair[1]), "{:?}", counts);
    }

    #[test]
    fn test_camera_idle_skips_unchanged_zoom() {
        let fixture = Fixture::new();
        fixture.manager.add_items(scenario());
        fixture.set_zoom(10.0);

        let camera = CameraPosition::new(Point::new(0.0, 0.0), 10.0);
        fixture.manager.on_camera_idle(&camera).unwrap();
        assert!(fixture.next_set().is_some());

        let panned = CameraPosition::new(Point::new(5.0, 5.0), 10.0);
        fixture.manager.on_camera_idle(&panned).unwrap();
        assert!(fixture.no_more_sets());

        fixture.set_zoom(11.0);
        let zoomed = CameraPosition::new(Point::new(5.0, 5.0), 11.0);
        fixture.manager.on_camera_idle(&zoomed).unwrap();
        assert!(fixture.next_set().is_some());
        assert_eq!(fixture.renderer.idle_events.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_set_algorithm_transfers_items() {
        let fixture = Fixture::new();
        fixture.manager.add_items(scenario());
        fixture.manager.clusters(14.0);
        assert!(fixture.manager.cached_zooms().contains(&14));

        fixture
            .manager
            .set_algorithm(Box::new(GridBasedAlgorithm::new()))
            .unwrap();
        assert_eq!(fixture.manager.items(), scenario());
        assert!(!fixture.manager.cached_zooms().contains(&14));
        assert!(fixture.next_set().is_some());
    }

    #[test]
    fn test_set_renderer_clears_markers_and_reinstalls_listeners() {
        let fixture = Fixture::new();
        let handle = fixture.executor.handle();
        let markers = fixture.manager.marker_manager();
        let collection = fixture.manager.item_collection();
        let drawn = markers.clone();
        handle
            .call(move |surface| {
                drawn
                    .lock()
                    .add_marker(collection, surface, MarkerOptions::new(Point::new(1.0, 0.0)))
                    .unwrap()
            })
            .unwrap();

        fixture
            .manager
            .set_on_cluster_item_click_listener(Some(Arc::new(|_: &GeoItem| true)));

        let (replacement, sets) = ForwardingRenderer::new();
        fixture
            .manager
            .set_renderer(Arc::clone(&replacement) as Arc<dyn ClusterRenderer<GeoItem>>)
            .unwrap();

        assert!(!fixture.renderer.attached.load(Ordering::SeqCst));
        assert!(replacement.attached.load(Ordering::SeqCst));
        assert!(replacement.has_item_listener.load(Ordering::SeqCst));
        assert!(sets.recv_timeout(Duration::from_secs(5)).is_ok());
        assert_eq!(handle.call(|surface| surface.marker_count()).unwrap(), 0);
        assert!(markers.lock().markers(collection).is_empty());
    }

    #[test]
    fn test_marker_click_routes_to_collection() {
        let fixture = Fixture::new();
        let markers = fixture.manager.marker_manager();
        let collection = fixture.manager.cluster_collection();
        markers
            .lock()
            .set_click_listener(collection, Some(Arc::new(|_: MarkerId| true)))
            .unwrap();

        let drawn = markers.clone();
        let marker = fixture
            .executor
            .handle()
            .call(move |surface| {
                drawn
                    .lock()
                    .add_marker(collection, surface, MarkerOptions::new(Point::new(2.0, 0.0)))
                    .unwrap()
            })
            .unwrap();

        assert!(fixture.manager.on_marker_click(marker));
        assert!(!fixture.manager.on_marker_click(MarkerId(9999)));
    }
}
