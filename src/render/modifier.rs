//! Batched marker mutations on the surface thread.
//!
//! The renderer queues work from its own thread; the surface thread performs
//! at most `batch_size` operations per turn, in priority order:
//!
//! 1. on-screen removals
//! 2. animation starts
//! 3. on-screen creations
//! 4. off-screen creations
//! 5. off-screen removals
//!
//! Running animations advance one frame per turn. While anything remains the
//! next turn is scheduled `frame_interval_ms` later; once everything is done,
//! threads blocked in [`MarkerModifier::wait_until_free`] are woken.

use crate::algo::Cluster;
use crate::config::RenderConfig;
use crate::error::{ClusterError, Result};
use crate::render::RenderContext;
use crate::render::animation::MarkerAnimation;
use crate::render::icons::ClusterBadge;
use crate::render::surface::{MarkerId, MarkerOptions, RenderingSurface};
use geo::Point;
use geocluster_types::item::ClusterItem;
use parking_lot::{Condvar, Mutex, MutexGuard};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Request to draw one cluster, either as a badge or as its items.
#[derive(Debug, Clone)]
pub struct CreateTask<T> {
    pub cluster: Arc<Cluster<T>>,
    /// Badge content when the cluster is drawn as one marker; `None` draws
    /// one marker per item.
    pub badge: Option<Arc<ClusterBadge>>,
    /// Where new markers start before gliding to their true position.
    pub animate_from: Option<Point<f64>>,
}

#[derive(Debug)]
struct AnimationTask {
    marker: MarkerId,
    animation: MarkerAnimation,
    remove_on_complete: bool,
}

/// Item and cluster lookups in both directions, plus last known positions.
#[derive(Debug)]
struct Bookkeeping<T> {
    item_markers: FxHashMap<T, MarkerId>,
    marker_items: FxHashMap<MarkerId, T>,
    cluster_markers: FxHashMap<Arc<Cluster<T>>, MarkerId>,
    marker_clusters: FxHashMap<MarkerId, Arc<Cluster<T>>>,
    positions: FxHashMap<MarkerId, Point<f64>>,
}

impl<T: ClusterItem> Bookkeeping<T> {
    fn new() -> Self {
        Self {
            item_markers: FxHashMap::default(),
            marker_items: FxHashMap::default(),
            cluster_markers: FxHashMap::default(),
            marker_clusters: FxHashMap::default(),
            positions: FxHashMap::default(),
        }
    }

    fn put_item(&mut self, item: T, marker: MarkerId, position: Point<f64>) {
        // Equal items may still differ in position; replace the stored key.
        self.item_markers.remove(&item);
        self.item_markers.insert(item.clone(), marker);
        self.marker_items.insert(marker, item);
        self.positions.insert(marker, position);
    }

    fn put_cluster(&mut self, cluster: Arc<Cluster<T>>, marker: MarkerId, position: Point<f64>) {
        self.cluster_markers.insert(Arc::clone(&cluster), marker);
        self.marker_clusters.insert(marker, cluster);
        self.positions.insert(marker, position);
    }

    fn forget(&mut self, marker: MarkerId) {
        if let Some(item) = self.marker_items.remove(&marker) {
            self.item_markers.remove(&item);
        }
        if let Some(cluster) = self.marker_clusters.remove(&marker) {
            self.cluster_markers.remove(&cluster);
        }
        self.positions.remove(&marker);
    }
}

struct ModifierState<T> {
    on_screen_removes: VecDeque<MarkerId>,
    animations: VecDeque<AnimationTask>,
    on_screen_creates: VecDeque<CreateTask<T>>,
    off_screen_creates: VecDeque<CreateTask<T>>,
    off_screen_removes: VecDeque<MarkerId>,
    running: Vec<AnimationTask>,
    /// A drain turn is posted and has not run yet.
    scheduled: bool,
    /// The surface thread is gone; nothing queued will ever run.
    closed: bool,
    /// Markers created or reused since the last `begin_cycle`.
    new_markers: FxHashSet<MarkerId>,
    book: Bookkeeping<T>,
}

impl<T: ClusterItem> ModifierState<T> {
    fn new() -> Self {
        Self {
            on_screen_removes: VecDeque::new(),
            animations: VecDeque::new(),
            on_screen_creates: VecDeque::new(),
            off_screen_creates: VecDeque::new(),
            off_screen_removes: VecDeque::new(),
            running: Vec::new(),
            scheduled: false,
            closed: false,
            new_markers: FxHashSet::default(),
            book: Bookkeeping::new(),
        }
    }

    fn is_busy(&self) -> bool {
        !(self.on_screen_removes.is_empty()
            && self.animations.is_empty()
            && self.on_screen_creates.is_empty()
            && self.off_screen_creates.is_empty()
            && self.off_screen_removes.is_empty()
            && self.running.is_empty())
    }

    fn abandon(&mut self) {
        self.on_screen_removes.clear();
        self.animations.clear();
        self.on_screen_creates.clear();
        self.off_screen_creates.clear();
        self.off_screen_removes.clear();
        self.running.clear();
        self.scheduled = false;
        self.closed = true;
    }
}

struct Shared<T, S> {
    state: Mutex<ModifierState<T>>,
    free: Condvar,
    context: RenderContext<S>,
    config: RenderConfig,
}

/// A posted drain turn. Dropping it unrun means the surface thread is gone.
struct DrainTurn<T: ClusterItem, S: RenderingSurface> {
    shared: Arc<Shared<T, S>>,
    ran: bool,
}

impl<T: ClusterItem, S: RenderingSurface> DrainTurn<T, S> {
    fn run(mut self, surface: &mut S) {
        self.ran = true;
        self.shared.drain(surface);
    }
}

impl<T: ClusterItem, S: RenderingSurface> Drop for DrainTurn<T, S> {
    fn drop(&mut self) {
        if !self.ran {
            self.shared.state.lock().abandon();
            self.shared.free.notify_all();
        }
    }
}

impl<T: ClusterItem, S: RenderingSurface> Shared<T, S> {
    /// Post a drain turn unless one is already pending.
    fn schedule(
        self: &Arc<Self>,
        state: &mut MutexGuard<'_, ModifierState<T>>,
        delay: Option<Duration>,
    ) -> Result<()> {
        if state.closed {
            return Err(ClusterError::SurfaceClosed);
        }
        if state.scheduled {
            return Ok(());
        }
        state.scheduled = true;

        let turn = DrainTurn {
            shared: Arc::clone(self),
            ran: false,
        };
        // A rejected turn is dropped inside `post`, and its drop takes the lock.
        let posted = MutexGuard::unlocked(state, || match delay {
            Some(delay) => self
                .context
                .surface
                .post_delayed(delay, move |surface| turn.run(surface)),
            None => self.context.surface.post(move |surface| turn.run(surface)),
        });

        if posted.is_err() {
            state.abandon();
            self.free.notify_all();
        }
        posted
    }

    fn drain(self: &Arc<Self>, surface: &mut S) {
        let mut state = self.state.lock();
        state.scheduled = false;

        for _ in 0..self.config.batch_size {
            if !self.perform_next(&mut state, surface) {
                break;
            }
        }
        self.step_animations(&mut state, surface);

        if state.is_busy() {
            if let Err(e) = self.schedule(&mut state, Some(self.config.frame_interval())) {
                log::warn!("Dropping queued marker work: {}", e);
            }
        } else {
            self.free.notify_all();
        }
    }

    fn perform_next(&self, state: &mut ModifierState<T>, surface: &mut S) -> bool {
        if let Some(marker) = state.on_screen_removes.pop_front() {
            self.remove_marker(state, surface, marker);
        } else if let Some(task) = state.animations.pop_front() {
            state.running.push(task);
        } else if let Some(task) = state.on_screen_creates.pop_front() {
            self.create(state, surface, task);
        } else if let Some(task) = state.off_screen_creates.pop_front() {
            self.create(state, surface, task);
        } else if let Some(marker) = state.off_screen_removes.pop_front() {
            self.remove_marker(state, surface, marker);
        } else {
            return false;
        }
        true
    }

    fn step_animations(&self, state: &mut ModifierState<T>, surface: &mut S) {
        let mut completed = Vec::new();
        {
            let ModifierState { running, book, .. } = &mut *state;
            running.retain_mut(|task| {
                let position = task.animation.step();
                surface.set_marker_position(task.marker, position);
                book.positions.insert(task.marker, position);
                if !task.animation.is_finished() {
                    return true;
                }
                if task.remove_on_complete {
                    completed.push(task.marker);
                }
                false
            });
        }
        for marker in completed {
            self.remove_marker(state, surface, marker);
        }
    }

    fn remove_marker(&self, state: &mut ModifierState<T>, surface: &mut S, marker: MarkerId) {
        state.book.forget(marker);
        self.context.markers.lock().remove(marker, surface);
    }

    fn add_marker(&self, surface: &mut S, badge: bool, options: MarkerOptions) -> Option<MarkerId> {
        let collection = if badge {
            self.context.cluster_collection
        } else {
            self.context.item_collection
        };
        match self.context.markers.lock().add_marker(collection, surface, options) {
            Ok(marker) => Some(marker),
            Err(e) => {
                log::warn!("Failed to add marker: {}", e);
                None
            }
        }
    }

    /// Bring a reused item marker to the item's current position.
    fn relocate(
        &self,
        state: &mut ModifierState<T>,
        surface: &mut S,
        marker: MarkerId,
        item: &T,
        animate: bool,
    ) {
        let target = item.position();
        let Some(&current) = state.book.positions.get(&marker) else {
            state.book.put_item(item.clone(), marker, target);
            return;
        };
        if current == target {
            state.book.put_item(item.clone(), marker, current);
            return;
        }
        if animate {
            state.book.put_item(item.clone(), marker, current);
            state.animations.push_back(AnimationTask {
                marker,
                animation: MarkerAnimation::new(current, target, self.config.animation_frames),
                remove_on_complete: false,
            });
        } else {
            surface.set_marker_position(marker, target);
            state.book.put_item(item.clone(), marker, target);
        }
    }

    fn create(&self, state: &mut ModifierState<T>, surface: &mut S, task: CreateTask<T>) {
        let frames = self.config.animation_frames;

        let Some(badge) = task.badge else {
            for item in task.cluster.items() {
                if let Some(&marker) = state.book.item_markers.get(item) {
                    self.relocate(state, surface, marker, item, task.animate_from.is_some());
                    state.new_markers.insert(marker);
                    continue;
                }
                let start = task.animate_from.unwrap_or_else(|| item.position());
                let Some(marker) = self.add_marker(surface, false, item_options(item, start)) else {
                    continue;
                };
                state.book.put_item(item.clone(), marker, start);
                if let Some(from) = task.animate_from {
                    state.animations.push_back(AnimationTask {
                        marker,
                        animation: MarkerAnimation::new(from, item.position(), frames),
                        remove_on_complete: false,
                    });
                }
                state.new_markers.insert(marker);
            }
            return;
        };

        if let Some(&marker) = state.book.cluster_markers.get(&task.cluster) {
            state.new_markers.insert(marker);
            return;
        }
        let start = task.animate_from.unwrap_or_else(|| task.cluster.position());
        let options = MarkerOptions::new(start).with_icon(badge);
        let Some(marker) = self.add_marker(surface, true, options) else {
            return;
        };
        if let Some(from) = task.animate_from {
            state.animations.push_back(AnimationTask {
                marker,
                animation: MarkerAnimation::new(from, task.cluster.position(), frames),
                remove_on_complete: false,
            });
        }
        state.book.put_cluster(task.cluster, marker, start);
        state.new_markers.insert(marker);
    }
}

/// Title and snippet for an item marker. A lone snippet is promoted to title.
fn item_options<T: ClusterItem>(item: &T, position: Point<f64>) -> MarkerOptions {
    let mut options = MarkerOptions::new(position);
    match (item.title(), item.snippet()) {
        (Some(title), Some(snippet)) => {
            options.title = Some(title.to_string());
            options.snippet = Some(snippet.to_string());
        }
        (Some(text), None) | (None, Some(text)) => options.title = Some(text.to_string()),
        (None, None) => {}
    }
    options
}

/// Queues marker work for the surface thread and tracks what it has drawn.
pub struct MarkerModifier<T: ClusterItem, S: RenderingSurface> {
    shared: Arc<Shared<T, S>>,
}

impl<T: ClusterItem, S: RenderingSurface> MarkerModifier<T, S> {
    pub fn new(context: RenderContext<S>, config: RenderConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(ModifierState::new()),
                free: Condvar::new(),
                context,
                config,
            }),
        }
    }

    fn enqueue(&self, f: impl FnOnce(&mut ModifierState<T>)) -> Result<()> {
        let mut state = self.shared.state.lock();
        if state.closed {
            return Err(ClusterError::SurfaceClosed);
        }
        f(&mut *state);
        self.shared.schedule(&mut state, None)
    }

    /// Queue creation of the markers for a cluster.
    pub fn add(&self, on_screen: bool, task: CreateTask<T>) -> Result<()> {
        self.enqueue(|state| {
            if on_screen {
                state.on_screen_creates.push_back(task);
            } else {
                state.off_screen_creates.push_back(task);
            }
        })
    }

    /// Queue removal of a marker.
    pub fn remove(&self, on_screen: bool, marker: MarkerId) -> Result<()> {
        self.enqueue(|state| {
            if on_screen {
                state.on_screen_removes.push_back(marker);
            } else {
                state.off_screen_removes.push_back(marker);
            }
        })
    }

    /// Queue a glide from `from` to `to`, removing the marker when it lands.
    pub fn animate_then_remove(&self, marker: MarkerId, from: Point<f64>, to: Point<f64>) -> Result<()> {
        let frames = self.shared.config.animation_frames;
        self.enqueue(|state| {
            state.animations.push_back(AnimationTask {
                marker,
                animation: MarkerAnimation::new(from, to, frames),
                remove_on_complete: true,
            });
        })
    }

    pub fn is_busy(&self) -> bool {
        self.shared.state.lock().is_busy()
    }

    /// Queued operations not yet started on the surface thread.
    pub fn pending(&self) -> usize {
        let state = self.shared.state.lock();
        state.on_screen_removes.len()
            + state.animations.len()
            + state.on_screen_creates.len()
            + state.off_screen_creates.len()
            + state.off_screen_removes.len()
    }

    /// Block until every queue is empty and every animation has finished.
    ///
    /// Must not be called from the surface thread.
    pub fn wait_until_free(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        while state.is_busy() {
            self.shared.schedule(&mut state, None)?;
            self.shared.free.wait(&mut state);
        }
        if state.closed {
            return Err(ClusterError::SurfaceClosed);
        }
        Ok(())
    }

    /// Start collecting the markers a reconciliation cycle keeps.
    pub(crate) fn begin_cycle(&self) {
        self.shared.state.lock().new_markers.clear();
    }

    /// Markers created or reused since [`begin_cycle`](Self::begin_cycle).
    pub(crate) fn take_new_markers(&self) -> FxHashSet<MarkerId> {
        std::mem::take(&mut self.shared.state.lock().new_markers)
    }

    pub fn marker_for_item(&self, item: &T) -> Option<MarkerId> {
        self.shared.state.lock().book.item_markers.get(item).copied()
    }

    pub fn item_for_marker(&self, marker: MarkerId) -> Option<T> {
        self.shared.state.lock().book.marker_items.get(&marker).cloned()
    }

    pub fn marker_for_cluster(&self, cluster: &Cluster<T>) -> Option<MarkerId> {
        self.shared.state.lock().book.cluster_markers.get(cluster).copied()
    }

    pub fn cluster_for_marker(&self, marker: MarkerId) -> Option<Arc<Cluster<T>>> {
        self.shared.state.lock().book.marker_clusters.get(&marker).cloned()
    }

    /// Last position assigned to a marker by this modifier.
    pub fn position_of(&self, marker: MarkerId) -> Option<Point<f64>> {
        self.shared.state.lock().book.positions.get(&marker).copied()
    }
}
