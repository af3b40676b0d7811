//! Fixed-size thread pool for cluster computation.

use crate::error::{ClusterError, Result};
use crossbeam_channel::{Receiver, Sender};
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs submitted jobs on a fixed set of named threads.
///
/// Dropping the pool lets queued jobs finish, then joins the threads.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(name: &str, threads: usize) -> Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
        let mut workers = Vec::with_capacity(threads);
        for index in 0..threads.max(1) {
            let receiver: Receiver<Job> = receiver.clone();
            let worker = thread::Builder::new()
                .name(format!("{}-{}", name, index))
                .spawn(move || {
                    for job in receiver.iter() {
                        job();
                    }
                })?;
            workers.push(worker);
        }
        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    pub fn execute<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.sender
            .as_ref()
            .ok_or(ClusterError::PoolClosed)?
            .send(Box::new(job))
            .map_err(|_| ClusterError::PoolClosed)
    }

    pub fn threads(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.sender.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::warn!("Cluster worker panicked");
            }
        }
    }
}
