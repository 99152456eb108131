//! Execution of asynchronous actions with ticket tracking.
//!
//! Every submitted job holds a [`Ticket`] from the moment it is accepted
//! until it finishes, whether it returns, fails, or panics. The engine
//! only declares quiescence once no tickets are outstanding.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ops5_foundation::Result;
use ops5_memory::MemoryHandle;
use parking_lot::{Condvar, Mutex};
use tracing::trace;
use uuid::Uuid;

use crate::pool::WorkerPool;

/// One in-flight asynchronous action.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Ticket {
    /// Unique ticket id.
    pub id: Uuid,
    /// Name of the rule whose action is running.
    pub rule: Arc<str>,
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.rule)
    }
}

#[derive(Default)]
struct TicketTable {
    live: Mutex<HashMap<Uuid, Arc<str>>>,
    idle: Condvar,
}

/// Releases a ticket when dropped, including during unwinding.
struct TicketGuard {
    id: Uuid,
    table: Arc<TicketTable>,
    memory: MemoryHandle,
}

impl Drop for TicketGuard {
    fn drop(&mut self) {
        let mut live = self.table.live.lock();
        live.remove(&self.id);
        // Wake under the ticket lock: anyone who sees the ticket gone also
        // sees the bumped epoch.
        self.memory.wake();
        if live.is_empty() {
            self.table.idle.notify_all();
        }
        drop(live);
        trace!(ticket = %self.id, "ticket released");
    }
}

/// Worker pool for async actions plus the outstanding ticket set.
pub struct AsyncExecutor {
    pool: WorkerPool,
    tickets: Arc<TicketTable>,
    memory: MemoryHandle,
}

impl AsyncExecutor {
    /// Starts `workers` action threads. Completions wake `memory`.
    ///
    /// # Errors
    /// Returns an internal error if a worker thread cannot be spawned.
    pub fn new(workers: usize, memory: MemoryHandle) -> Result<Self> {
        Ok(Self {
            pool: WorkerPool::new("ops5-action", workers)?,
            tickets: Arc::default(),
            memory,
        })
    }

    /// Registers a ticket and queues the job. Returns immediately.
    ///
    /// # Errors
    /// Returns a shutdown error if the pool is closed; the ticket is
    /// released before returning.
    pub fn submit<F>(&self, rule: &Arc<str>, job: F) -> Result<Ticket>
    where
        F: FnOnce() + Send + 'static,
    {
        let ticket = Ticket {
            id: Uuid::new_v4(),
            rule: Arc::clone(rule),
        };
        self.tickets.live.lock().insert(ticket.id, Arc::clone(rule));
        let guard = TicketGuard {
            id: ticket.id,
            table: Arc::clone(&self.tickets),
            memory: self.memory.clone(),
        };
        trace!(ticket = %ticket, "submitted");

        self.pool.execute(move || {
            let _guard = guard;
            job();
        })?;
        Ok(ticket)
    }

    /// Number of tickets still outstanding.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.tickets.live.lock().len()
    }

    /// The outstanding tickets.
    #[must_use]
    pub fn tickets(&self) -> Vec<Ticket> {
        self.tickets
            .live
            .lock()
            .iter()
            .map(|(id, rule)| Ticket {
                id: *id,
                rule: Arc::clone(rule),
            })
            .collect()
    }

    /// Blocks until no tickets are outstanding or the timeout passes.
    ///
    /// Returns true if the executor is idle.
    pub fn wait_idle(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut live = self.tickets.live.lock();
        while !live.is_empty() {
            match deadline {
                Some(deadline) => {
                    if self.tickets.idle.wait_until(&mut live, deadline).timed_out() {
                        return live.is_empty();
                    }
                }
                None => self.tickets.idle.wait(&mut live),
            }
        }
        true
    }

    /// Lets queued jobs finish and joins the action threads.
    pub fn shutdown(&mut self) {
        self.pool.shutdown();
    }
}
