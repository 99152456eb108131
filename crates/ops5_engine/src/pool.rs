//! A fixed-size pool of named worker threads fed by a channel.
//!
//! Used twice by the engine: once to match rules in parallel and once to
//! run asynchronous actions. A panicking job is caught and logged; the
//! worker keeps serving the queue.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, unbounded};
use ops5_foundation::{Error, Result};
use tracing::{debug, error};

/// A unit of work for the pool.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size thread pool.
pub struct WorkerPool {
    name: String,
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `size` workers (at least one) named `{name}-{n}`.
    ///
    /// # Errors
    /// Returns an internal error if the OS refuses to spawn a thread.
    pub fn new(name: &str, size: usize) -> Result<Self> {
        let size = size.max(1);
        let (sender, receiver) = unbounded::<Job>();
        let mut workers = Vec::with_capacity(size);

        for n in 0..size {
            let receiver = receiver.clone();
            let thread_name = format!("{name}-{n}");
            let handle = thread::Builder::new()
                .name(thread_name.clone())
                .spawn(move || {
                    for job in &receiver {
                        if catch_unwind(AssertUnwindSafe(job)).is_err() {
                            error!(worker = %thread_name, "job panicked");
                        }
                    }
                })
                .map_err(|e| Error::internal(format!("spawn {name}-{n}: {e}")))?;
            workers.push(handle);
        }

        debug!(pool = name, size, "worker pool started");
        Ok(Self {
            name: name.to_string(),
            sender: Some(sender),
            workers,
        })
    }

    /// Number of worker threads.
    #[must_use]
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queues a job.
    ///
    /// # Errors
    /// Returns a shutdown error once [`WorkerPool::shutdown`] has run.
    pub fn execute<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or_else(Error::shutdown)?;
        sender.send(Box::new(job)).map_err(|_| Error::shutdown())
    }

    /// Returns true once the pool stopped accepting work.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.sender.is_none()
    }

    /// Stops accepting work, lets queued jobs finish, and joins every worker.
    pub fn shutdown(&mut self) {
        if self.sender.take().is_none() {
            return;
        }
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!(pool = %self.name, "worker exited abnormally");
            }
        }
        debug!(pool = %self.name, "worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
