//! Fixed-size worker pool fed by a bounded queue.
//!
//! Workers are tokio tasks pulling boxed futures off a `flume` channel whose
//! capacity equals the worker count, so `submit` waits whenever every worker
//! is busy and the queue is full. A panicking unit is caught and logged; the
//! worker that ran it keeps going.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};

/// A self-contained unit of work.
pub type Job = BoxFuture<'static, ()>;

pub struct WorkerPool {
    size: usize,
    sender: Option<flume::Sender<Job>>,
    receiver: flume::Receiver<Job>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// A pool of `size` workers with a queue of the same capacity. `size` must be positive.
    pub fn new(size: usize) -> Self {
        let (sender, receiver) = flume::bounded(size);
        WorkerPool {
            size,
            sender: Some(sender),
            receiver,
            handles: Vec::with_capacity(size),
        }
    }

    /// Spawns the workers. Calling it again is a no-op.
    pub fn start(&mut self) {
        if !self.handles.is_empty() {
            return;
        }
        for id in 0..self.size {
            let receiver = self.receiver.clone();
            self.handles.push(tokio::spawn(async move {
                while let Ok(job) = receiver.recv_async().await {
                    if AssertUnwindSafe(job).catch_unwind().await.is_err() {
                        tracing::error!(worker = id, "unit of work panicked");
                    }
                }
                tracing::debug!(worker = id, "worker exiting");
            }));
        }
    }

    /// Queues `job`, waiting while the queue is full.
    pub async fn submit<F>(&self, job: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| Error::Pool("submit after stop".to_string()))?;
        if self.handles.is_empty() {
            return Err(Error::Pool("submit before start".to_string()));
        }
        sender
            .send_async(job.boxed())
            .await
            .map_err(|_| Error::Pool("all workers have exited".to_string()))
    }

    /// Closes the queue and waits for the workers to drain it and exit.
    pub async fn stop(&mut self) {
        self.sender.take();
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                tracing::error!("worker task failed: {}", e);
            }
        }
    }
}
