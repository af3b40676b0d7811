//! The default renderer: diff, create, wait, remove, wait.
//!
//! Small clusters are drawn as one marker per item, larger ones as a single
//! badge. When zooming in, new markers on screen glide out of the badge they
//! were previously part of. When zooming out by less than a few levels,
//! markers on screen glide into the badge that absorbed them before they are
//! removed.

use crate::algo::{Cluster, ClusterSet};
use crate::config::Config;
use crate::error::{ClusterError, Result};
use crate::markers::MarkerClickListener;
use crate::projection::SphericalMercatorProjection;
use crate::render::icons::IconCache;
use crate::render::modifier::{CreateTask, MarkerModifier};
use crate::render::surface::{CameraPosition, MarkerId, RenderingSurface, region_contains};
use crate::render::{ClusterClickListener, ClusterRenderer, ItemClickListener, RenderContext};
use geo::Rect;
use geocluster_types::item::ClusterItem;
use geocluster_types::point::ProjectedPoint;
use parking_lot::{Condvar, Mutex, RwLock};
use rustc_hash::FxHashSet;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Stage of the reconciliation cycle in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RenderPhase {
    Idle = 0,
    ComputingDiff = 1,
    Creating = 2,
    Removing = 3,
}

impl RenderPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => RenderPhase::ComputingDiff,
            2 => RenderPhase::Creating,
            3 => RenderPhase::Removing,
            _ => RenderPhase::Idle,
        }
    }
}

/// Resets the phase to idle however the cycle ends.
struct PhaseGuard<'a>(&'a AtomicU8);

impl PhaseGuard<'_> {
    fn set(&self, phase: RenderPhase) {
        self.0.store(phase as u8, Ordering::Release);
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.set(RenderPhase::Idle);
    }
}

struct Rendered<T> {
    clusters: Option<ClusterSet<T>>,
    zoom: f64,
    markers: FxHashSet<MarkerId>,
}

struct RenderQueue<T> {
    next: Option<ClusterSet<T>>,
    running: bool,
    shutdown: bool,
}

struct Inner<T: ClusterItem, S: RenderingSurface> {
    context: RenderContext<S>,
    modifier: MarkerModifier<T, S>,
    icons: IconCache,
    max_distance_px: f64,
    min_cluster_size: usize,
    max_animation_zoom_out: f64,
    animate: AtomicBool,
    phase: AtomicU8,
    cycle: Mutex<()>,
    rendered: RwLock<Rendered<T>>,
    queue: Mutex<RenderQueue<T>>,
    queue_changed: Condvar,
    cluster_listener: RwLock<Option<ClusterClickListener<T>>>,
    item_listener: RwLock<Option<ItemClickListener<T>>>,
}

/// Closest candidate strictly within `max_distance` of `point`.
fn find_closest(
    candidates: &[ProjectedPoint],
    point: &ProjectedPoint,
    max_distance: f64,
) -> Option<ProjectedPoint> {
    let mut best = max_distance * max_distance;
    let mut closest = None;
    for candidate in candidates {
        let distance = candidate.distance_squared(point);
        if distance < best {
            best = distance;
            closest = Some(*candidate);
        }
    }
    closest
}

impl<T: ClusterItem, S: RenderingSurface> Inner<T, S> {
    fn render_as_cluster(&self, cluster: &Cluster<T>) -> bool {
        cluster.size() > self.min_cluster_size
    }

    fn on_screen_badges(
        &self,
        clusters: &ClusterSet<T>,
        visible: &Rect<f64>,
        projection: &SphericalMercatorProjection,
    ) -> Vec<ProjectedPoint> {
        clusters
            .iter()
            .filter(|c| self.render_as_cluster(c) && region_contains(visible, &c.position()))
            .map(|c| projection.to_point(&c.position()))
            .collect()
    }

    fn create_task(&self, cluster: &Arc<Cluster<T>>) -> CreateTask<T> {
        let badge = self
            .render_as_cluster(cluster)
            .then(|| self.icons.badge_for(cluster.size()));
        CreateTask {
            cluster: Arc::clone(cluster),
            badge,
            animate_from: None,
        }
    }

    fn reconcile(
        &self,
        clusters: ClusterSet<T>,
        camera: &CameraPosition,
        visible: &Rect<f64>,
    ) -> Result<()> {
        let _cycle = self.cycle.lock();
        let (previous_clusters, previous_zoom, previous_markers) = {
            let rendered = self.rendered.read();
            if rendered.clusters.as_ref() == Some(&clusters) {
                return Ok(());
            }
            (
                rendered.clusters.clone(),
                rendered.zoom,
                rendered.markers.clone(),
            )
        };

        let phase = PhaseGuard(&self.phase);
        phase.set(RenderPhase::ComputingDiff);

        let zoom = camera.zoom;
        let zooming_in = zoom > previous_zoom;
        let zoom_delta = zoom - previous_zoom;
        let projection = SphericalMercatorProjection::for_zoom(zoom.min(previous_zoom));
        let animate = self.animate.load(Ordering::Acquire);

        let existing_on_screen = match &previous_clusters {
            Some(previous) if animate => self.on_screen_badges(previous, visible, &projection),
            _ => Vec::new(),
        };

        phase.set(RenderPhase::Creating);
        self.modifier.begin_cycle();
        for cluster in clusters.iter() {
            let on_screen = region_contains(visible, &cluster.position());
            let mut task = self.create_task(cluster);
            if zooming_in && on_screen && animate {
                let point = projection.to_point(&cluster.position());
                task.animate_from = find_closest(&existing_on_screen, &point, self.max_distance_px)
                    .map(|closest| projection.to_lat_lng(&closest));
                self.modifier.add(true, task)?;
            } else {
                self.modifier.add(on_screen, task)?;
            }
        }
        self.modifier.wait_until_free()?;
        // Reused markers are in here too, so they survive the removal pass.
        let new_markers = self.modifier.take_new_markers();

        phase.set(RenderPhase::Removing);
        let new_on_screen = if animate {
            self.on_screen_badges(&clusters, visible, &projection)
        } else {
            Vec::new()
        };

        for &marker in previous_markers.difference(&new_markers) {
            let position = self.modifier.position_of(marker);
            let on_screen = position.is_some_and(|p| region_contains(visible, &p));
            match position {
                Some(position)
                    if !zooming_in
                        && zoom_delta > -self.max_animation_zoom_out
                        && on_screen
                        && animate =>
                {
                    let point = projection.to_point(&position);
                    match find_closest(&new_on_screen, &point, self.max_distance_px) {
                        Some(closest) => self.modifier.animate_then_remove(
                            marker,
                            position,
                            projection.to_lat_lng(&closest),
                        )?,
                        None => self.modifier.remove(true, marker)?,
                    }
                }
                _ => self.modifier.remove(on_screen, marker)?,
            }
        }
        self.modifier.wait_until_free()?;

        log::debug!(
            "Rendered {} clusters as {} markers at zoom {:.2}",
            clusters.len(),
            new_markers.len(),
            zoom
        );
        let mut rendered = self.rendered.write();
        rendered.clusters = Some(clusters);
        rendered.zoom = zoom;
        rendered.markers = new_markers;
        Ok(())
    }

    fn render(&self, clusters: ClusterSet<T>) -> Result<()> {
        let (camera, visible) = self
            .context
            .surface
            .call(|surface| (surface.camera(), surface.visible_region()))?;
        self.reconcile(clusters, &camera, &visible)
    }

    fn item_clicked(&self, marker: MarkerId) -> bool {
        let Some(item) = self.modifier.item_for_marker(marker) else {
            return false;
        };
        let listener = self.item_listener.read().clone();
        listener.is_some_and(|listener| listener(&item))
    }

    fn cluster_clicked(&self, marker: MarkerId) -> bool {
        let Some(cluster) = self.modifier.cluster_for_marker(marker) else {
            return false;
        };
        let listener = self.cluster_listener.read().clone();
        listener.is_some_and(|listener| listener(&cluster))
    }
}

fn render_loop<T: ClusterItem, S: RenderingSurface>(inner: Arc<Inner<T, S>>) {
    loop {
        let clusters = {
            let mut queue = inner.queue.lock();
            while queue.next.is_none() && !queue.shutdown {
                inner.queue_changed.wait(&mut queue);
            }
            if queue.shutdown {
                return;
            }
            queue.running = true;
            queue.next.take()
        };

        if let Some(clusters) = clusters {
            match inner.render(clusters) {
                Ok(()) => {}
                Err(ClusterError::SurfaceClosed) => {
                    log::debug!("Surface closed; dropping cluster set");
                }
                Err(e) => log::warn!("Render cycle failed: {}", e),
            }
        }

        let mut queue = inner.queue.lock();
        queue.running = false;
        inner.queue_changed.notify_all();
    }
}

/// Renders cluster sets on a background thread, one cycle at a time.
///
/// Only the latest pending set is kept: sets that arrive while a cycle is
/// running replace each other, and the cycle after it renders the newest.
pub struct DefaultClusterRenderer<T: ClusterItem, S: RenderingSurface> {
    inner: Arc<Inner<T, S>>,
    thread: Option<JoinHandle<()>>,
}

impl<T: ClusterItem, S: RenderingSurface> DefaultClusterRenderer<T, S> {
    pub fn new(context: RenderContext<S>, config: &Config) -> Result<Self> {
        let inner = Arc::new(Inner {
            modifier: MarkerModifier::new(context.clone(), config.render.clone()),
            context,
            icons: IconCache::new(),
            max_distance_px: config.max_distance_px,
            min_cluster_size: config.min_cluster_size,
            max_animation_zoom_out: config.render.max_animation_zoom_out,
            animate: AtomicBool::new(config.render.animate),
            phase: AtomicU8::new(RenderPhase::Idle as u8),
            cycle: Mutex::new(()),
            rendered: RwLock::new(Rendered {
                clusters: None,
                zoom: 0.0,
                markers: FxHashSet::default(),
            }),
            queue: Mutex::new(RenderQueue {
                next: None,
                running: false,
                shutdown: false,
            }),
            queue_changed: Condvar::new(),
            cluster_listener: RwLock::new(None),
            item_listener: RwLock::new(None),
        });

        let worker = Arc::clone(&inner);
        let thread = thread::Builder::new()
            .name("geocluster-render".to_string())
            .spawn(move || render_loop(worker))?;

        Ok(Self {
            inner,
            thread: Some(thread),
        })
    }

    /// Reconcile the drawn markers with `clusters` and block until done.
    ///
    /// A set equal to the one already drawn is a no-op.
    pub fn reconcile(
        &self,
        clusters: ClusterSet<T>,
        camera: &CameraPosition,
        visible: &Rect<f64>,
    ) -> Result<()> {
        self.inner.reconcile(clusters, camera, visible)
    }

    /// Wait until no set is pending and no cycle is running.
    pub fn wait_until_rendered(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut queue = self.inner.queue.lock();
        while queue.next.is_some() || queue.running {
            if self
                .inner
                .queue_changed
                .wait_until(&mut queue, deadline)
                .timed_out()
            {
                return queue.next.is_none() && !queue.running;
            }
        }
        true
    }

    pub fn phase(&self) -> RenderPhase {
        RenderPhase::from_u8(self.inner.phase.load(Ordering::Acquire))
    }

    pub fn is_animating(&self) -> bool {
        self.inner.animate.load(Ordering::Acquire)
    }

    pub fn modifier(&self) -> &MarkerModifier<T, S> {
        &self.inner.modifier
    }

    /// The set drawn by the last completed cycle.
    pub fn rendered_clusters(&self) -> Option<ClusterSet<T>> {
        self.inner.rendered.read().clusters.clone()
    }

    pub fn rendered_markers(&self) -> Vec<MarkerId> {
        let mut markers: Vec<MarkerId> = self.inner.rendered.read().markers.iter().copied().collect();
        markers.sort_unstable();
        markers
    }

    pub fn marker_for_item(&self, item: &T) -> Option<MarkerId> {
        self.inner.modifier.marker_for_item(item)
    }

    pub fn item_for_marker(&self, marker: MarkerId) -> Option<T> {
        self.inner.modifier.item_for_marker(marker)
    }

    pub fn marker_for_cluster(&self, cluster: &Cluster<T>) -> Option<MarkerId> {
        self.inner.modifier.marker_for_cluster(cluster)
    }

    pub fn cluster_for_marker(&self, marker: MarkerId) -> Option<Arc<Cluster<T>>> {
        self.inner.modifier.cluster_for_marker(marker)
    }

    pub fn icons(&self) -> &IconCache {
        &self.inner.icons
    }
}

impl<T: ClusterItem, S: RenderingSurface> ClusterRenderer<T> for DefaultClusterRenderer<T, S> {
    fn on_clusters_changed(&self, clusters: ClusterSet<T>) {
        let mut queue = self.inner.queue.lock();
        if queue.next.replace(clusters).is_some() {
            log::debug!("Replacing a cluster set that was never rendered");
        }
        self.inner.queue_changed.notify_all();
    }

    fn set_animation(&self, animate: bool) {
        self.inner.animate.store(animate, Ordering::Release);
    }

    fn on_add(&self) {
        let weak: Weak<Inner<T, S>> = Arc::downgrade(&self.inner);
        let items: MarkerClickListener = Arc::new(move |marker: MarkerId| {
            weak.upgrade().is_some_and(|inner| inner.item_clicked(marker))
        });
        let weak: Weak<Inner<T, S>> = Arc::downgrade(&self.inner);
        let clusters: MarkerClickListener = Arc::new(move |marker: MarkerId| {
            weak.upgrade()
                .is_some_and(|inner| inner.cluster_clicked(marker))
        });

        let context = &self.inner.context;
        let mut markers = context.markers.lock();
        let installed = markers
            .set_click_listener(context.item_collection, Some(items))
            .and_then(|_| markers.set_click_listener(context.cluster_collection, Some(clusters)));
        if let Err(e) = installed {
            log::warn!("Failed to install marker listeners: {}", e);
        }
    }

    fn on_remove(&self) {
        let context = &self.inner.context;
        let mut markers = context.markers.lock();
        for collection in [context.item_collection, context.cluster_collection] {
            if let Err(e) = markers.set_click_listener(collection, None) {
                log::warn!("Failed to clear marker listener: {}", e);
            }
        }
    }

    fn set_on_cluster_click_listener(&self, listener: Option<ClusterClickListener<T>>) {
        *self.inner.cluster_listener.write() = listener;
    }

    fn set_on_cluster_item_click_listener(&self, listener: Option<ItemClickListener<T>>) {
        *self.inner.item_listener.write() = listener;
    }
}

impl<T: ClusterItem, S: RenderingSurface> Drop for DefaultClusterRenderer<T, S> {
    fn drop(&mut self) {
        {
            let mut queue = self.inner.queue.lock();
            queue.shutdown = true;
            self.inner.queue_changed.notify_all();
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
