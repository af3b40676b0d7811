//! A dedicated thread that owns the rendering surface.
//!
//! Marker mutations and camera reads all run on this thread. Other threads
//! talk to it through a cloneable [`SurfaceHandle`].

use crate::error::{ClusterError, Result};
use crate::render::surface::RenderingSurface;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

type Task<S> = Box<dyn FnOnce(&mut S) + Send>;

enum Message<S> {
    Run(Task<S>),
    RunAt(Instant, Task<S>),
    Shutdown,
}

struct Delayed<S> {
    deadline: Instant,
    seq: u64,
    task: Task<S>,
}

// Min-heap on (deadline, seq) so equal deadlines run in posting order.
impl<S> Ord for Delayed<S> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<S> PartialOrd for Delayed<S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<S> PartialEq for Delayed<S> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl<S> Eq for Delayed<S> {}

/// Owns the surface thread. Dropping it stops the thread and waits for it.
///
/// # Examples
///
/// ```
/// use geocluster::render::executor::SurfaceExecutor;
/// use geocluster::render::recording::RecordingSurface;
/// use geocluster::render::surface::RenderingSurface;
///
/// let executor = SurfaceExecutor::spawn(RecordingSurface::default())?;
/// let zoom = executor.handle().call(|surface| surface.camera().zoom)?;
/// assert_eq!(zoom, 0.0);
/// # Ok::<(), geocluster::ClusterError>(())
/// ```
pub struct SurfaceExecutor<S> {
    handle: SurfaceHandle<S>,
    thread: Option<JoinHandle<S>>,
}

impl<S: RenderingSurface> SurfaceExecutor<S> {
    pub fn spawn(surface: S) -> Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let thread = thread::Builder::new()
            .name("geocluster-surface".to_string())
            .spawn(move || run(surface, receiver))?;

        let handle = SurfaceHandle {
            sender,
            thread_id: thread.thread().id(),
        };
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> SurfaceHandle<S> {
        self.handle.clone()
    }

    /// Stop the surface thread and hand the surface back.
    ///
    /// Delayed tasks that have not come due are dropped.
    pub fn shutdown(mut self) -> Option<S> {
        self.stop()
    }

    fn stop(&mut self) -> Option<S> {
        let thread = self.thread.take()?;
        let _ = self.handle.sender.send(Message::Shutdown);
        match thread.join() {
            Ok(surface) => Some(surface),
            Err(_) => {
                log::warn!("Surface thread panicked");
                None
            }
        }
    }
}

impl<S> Drop for SurfaceExecutor<S> {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.handle.sender.send(Message::Shutdown);
            let _ = thread.join();
        }
    }
}

fn run<S>(mut surface: S, receiver: Receiver<Message<S>>) -> S {
    let mut delayed: BinaryHeap<Delayed<S>> = BinaryHeap::new();
    let mut seq = 0u64;

    loop {
        let now = Instant::now();
        while delayed.peek().is_some_and(|next| next.deadline <= now) {
            if let Some(due) = delayed.pop() {
                (due.task)(&mut surface);
            }
        }

        let message = match delayed.peek() {
            Some(next) => match receiver.recv_timeout(next.deadline.saturating_duration_since(now)) {
                Ok(message) => message,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match receiver.recv() {
                Ok(message) => message,
                Err(_) => break,
            },
        };

        match message {
            Message::Run(task) => task(&mut surface),
            Message::RunAt(deadline, task) => {
                seq += 1;
                delayed.push(Delayed {
                    deadline,
                    seq,
                    task,
                });
            }
            Message::Shutdown => break,
        }
    }

    surface
}

/// Sends work to the surface thread.
pub struct SurfaceHandle<S> {
    sender: Sender<Message<S>>,
    thread_id: ThreadId,
}

impl<S> Clone for SurfaceHandle<S> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            thread_id: self.thread_id,
        }
    }
}

impl<S: RenderingSurface> SurfaceHandle<S> {
    /// Run `task` on the surface thread as soon as possible.
    pub fn post<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.sender
            .send(Message::Run(Box::new(task)))
            .map_err(|_| ClusterError::SurfaceClosed)
    }

    /// Run `task` on the surface thread once `delay` has elapsed.
    pub fn post_delayed<F>(&self, delay: Duration, task: F) -> Result<()>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.sender
            .send(Message::RunAt(Instant::now() + delay, Box::new(task)))
            .map_err(|_| ClusterError::SurfaceClosed)
    }

    /// Run `task` on the surface thread and wait for its result.
    ///
    /// Must not be called from the surface thread itself.
    pub fn call<R, F>(&self, task: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut S) -> R + Send + 'static,
    {
        debug_assert!(
            !self.is_surface_thread(),
            "SurfaceHandle::call from the surface thread would never return"
        );
        let (reply, response) = crossbeam_channel::bounded(1);
        self.post(move |surface| {
            let _ = reply.send(task(surface));
        })?;
        response.recv().map_err(|_| ClusterError::SurfaceClosed)
    }

    pub fn is_surface_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }
}
