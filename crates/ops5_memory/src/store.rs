//! The fact store: live facts indexed by type plus a pending queue.
//!
//! New facts never become visible immediately. [`FactStore::make`] and
//! [`MemoryHandle::make`] append to a thread-safe pending queue, and only
//! [`FactStore::drain`] (run by the engine loop between cycles) moves them
//! into the live index. Matching therefore always sees a store that has
//! been frozen since the last drain.
//!
//! The live index is a persistent map, so [`FactStore::snapshot`] is an
//! O(1) clone that matching workers can hold while the loop thread keeps
//! ownership of the store.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use ops5_foundation::{Error, Result, Value};
use parking_lot::{Condvar, Mutex, RwLock};
use tracing::trace;

use crate::fact::{Fact, FactId};
use crate::template::Template;

type LiveIndex = im::HashMap<Arc<str>, im::Vector<Arc<Fact>>>;

// =============================================================================
// Shared Memory
// =============================================================================

#[derive(Default)]
struct Pending {
    queue: VecDeque<Arc<Fact>>,
    /// Bumped by every enqueue and wake; waiters compare against it.
    epoch: u64,
}

#[derive(Default)]
struct Shared {
    templates: RwLock<HashMap<Arc<str>, Arc<Template>>>,
    pending: Mutex<Pending>,
    signal: Condvar,
    next_id: AtomicU64,
}

/// Thread-safe handle onto the shared half of working memory.
///
/// Worker threads and external producers use a handle to create facts.
/// Facts created through a handle land in the pending queue and become
/// visible at the owning store's next drain.
#[derive(Clone, Default)]
pub struct MemoryHandle {
    shared: Arc<Shared>,
}

impl MemoryHandle {
    /// Registers (literalizes) a template, replacing any previous one for the type.
    pub fn register_template(&self, template: Template) {
        let fact_type = Arc::clone(&template.fact_type);
        self.shared
            .templates
            .write()
            .insert(fact_type, Arc::new(template));
    }

    /// Returns the template registered for a type.
    #[must_use]
    pub fn template(&self, fact_type: &str) -> Option<Arc<Template>> {
        self.shared.templates.read().get(fact_type).cloned()
    }

    /// Instantiates the type's template with overrides and enqueues the fact.
    ///
    /// # Errors
    /// Returns a schema error if the type is not literalized, or a field error
    /// if an override names a field outside the template. Nothing is enqueued
    /// on error.
    pub fn make<K: AsRef<str>>(&self, fact_type: &str, overrides: &[(K, Value)]) -> Result<Arc<Fact>> {
        let template = self
            .template(fact_type)
            .ok_or_else(|| Error::schema(fact_type))?;
        let id = FactId::new(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let fact = Arc::new(template.instantiate(id, overrides)?);
        self.enqueue(Arc::clone(&fact));
        Ok(fact)
    }

    /// Appends a fact to the pending queue without making it visible.
    pub fn enqueue(&self, fact: Arc<Fact>) {
        trace!(fact = %fact, "enqueue");
        let mut pending = self.shared.pending.lock();
        pending.queue.push_back(fact);
        pending.epoch = pending.epoch.wrapping_add(1);
        drop(pending);
        self.shared.signal.notify_all();
    }

    /// Interrupts any blocking drain without enqueueing anything.
    pub fn wake(&self) {
        let mut pending = self.shared.pending.lock();
        pending.epoch = pending.epoch.wrapping_add(1);
        drop(pending);
        self.shared.signal.notify_all();
    }

    /// Returns the current signal epoch.
    ///
    /// Read the epoch before checking for outstanding work, then pass it to
    /// [`FactStore::drain_blocking_since`]; a signal raised in between is
    /// not lost.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.shared.pending.lock().epoch
    }

    /// Returns true if facts are waiting to be drained.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.shared.pending.lock().queue.is_empty()
    }

    /// Returns the number of facts waiting to be drained.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.shared.pending.lock().queue.len()
    }

    /// Takes every queued fact, waiting for a signal first if the queue is
    /// empty and nothing was signalled since `seen`.
    fn take_pending(&self, seen: Option<u64>, timeout: Option<Duration>) -> Vec<Arc<Fact>> {
        let mut pending = self.shared.pending.lock();
        if let Some(seen) = seen {
            let deadline = timeout.map(|t| Instant::now() + t);
            while pending.queue.is_empty() && pending.epoch == seen {
                match deadline {
                    Some(deadline) => {
                        if self
                            .shared
                            .signal
                            .wait_until(&mut pending, deadline)
                            .timed_out()
                        {
                            break;
                        }
                    }
                    None => self.shared.signal.wait(&mut pending),
                }
            }
        }
        pending.queue.drain(..).collect()
    }

    fn clear(&self) {
        self.shared.templates.write().clear();
        self.shared.pending.lock().queue.clear();
    }
}

impl std::fmt::Debug for MemoryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pending = self.shared.pending.lock();
        f.debug_struct("MemoryHandle")
            .field("pending", &pending.queue.len())
            .field("epoch", &pending.epoch)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// A frozen, read-only view of the live index.
#[derive(Clone, Default)]
pub struct Snapshot {
    index: LiveIndex,
}

impl Snapshot {
    /// Returns the live facts of a type, in insertion order.
    #[must_use]
    pub fn get(&self, fact_type: &str) -> im::Vector<Arc<Fact>> {
        self.index.get(fact_type).cloned().unwrap_or_default()
    }

    /// Returns the total number of live facts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.values().map(im::Vector::len).sum()
    }

    /// Returns true if there are no live facts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Fact Store
// =============================================================================

/// Working memory owned by the engine loop.
///
/// The live index is only mutated through `&mut self`; everything reachable
/// through [`FactStore::handle`] is safe for concurrent producers.
#[derive(Default)]
pub struct FactStore {
    shared: MemoryHandle,
    live: LiveIndex,
}

impl FactStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a thread-safe handle onto this store's pending queue and templates.
    #[must_use]
    pub fn handle(&self) -> MemoryHandle {
        self.shared.clone()
    }

    /// Registers (literalizes) a template.
    pub fn register_template(&self, template: Template) {
        self.shared.register_template(template);
    }

    /// Returns the template registered for a type.
    #[must_use]
    pub fn template(&self, fact_type: &str) -> Option<Arc<Template>> {
        self.shared.template(fact_type)
    }

    /// Creates a fact from its template and enqueues it for the next drain.
    ///
    /// # Errors
    /// Returns a schema error for an unregistered type or a field error for
    /// an unknown override key.
    pub fn make<K: AsRef<str>>(&self, fact_type: &str, overrides: &[(K, Value)]) -> Result<Arc<Fact>> {
        self.shared.make(fact_type, overrides)
    }

    /// Appends a fact to the pending queue.
    pub fn enqueue(&self, fact: Arc<Fact>) {
        self.shared.enqueue(fact);
    }

    /// Moves every queued fact into the live index.
    ///
    /// Returns true if anything was moved.
    pub fn drain(&mut self) -> bool {
        let batch = self.shared.take_pending(None, None);
        self.insert_batch(batch)
    }

    /// Like [`FactStore::drain`], but waits for a producer first if the queue
    /// is empty.
    ///
    /// The wait ends on any enqueue or [`MemoryHandle::wake`], or after
    /// `timeout` (`None` waits until signalled).
    pub fn drain_blocking(&mut self, timeout: Option<Duration>) -> bool {
        let seen = self.shared.epoch();
        self.drain_blocking_since(seen, timeout)
    }

    /// Like [`FactStore::drain_blocking`], but only waits if no signal was
    /// raised since `epoch` was read.
    pub fn drain_blocking_since(&mut self, epoch: u64, timeout: Option<Duration>) -> bool {
        let batch = self.shared.take_pending(Some(epoch), timeout);
        self.insert_batch(batch)
    }

    fn insert_batch(&mut self, batch: Vec<Arc<Fact>>) -> bool {
        if batch.is_empty() {
            return false;
        }
        trace!(count = batch.len(), "drained pending facts");
        for fact in batch {
            self.live
                .entry(Arc::clone(fact.type_tag()))
                .or_insert_with(im::Vector::new)
                .push_back(fact);
        }
        true
    }

    /// Returns the live facts of a type (possibly empty).
    #[must_use]
    pub fn get(&self, fact_type: &str) -> im::Vector<Arc<Fact>> {
        self.live.get(fact_type).cloned().unwrap_or_default()
    }

    /// Removes one fact instance from its type's live list.
    ///
    /// Returns true if the fact was live.
    pub fn remove(&mut self, fact: &Fact) -> bool {
        let Some(facts) = self.live.get_mut(fact.fact_type()) else {
            return false;
        };
        let Some(pos) = facts.iter().position(|f| f.id() == fact.id()) else {
            return false;
        };
        facts.remove(pos);
        fact.mark_retracted();
        trace!(fact = %fact, "removed");
        true
    }

    /// Returns a frozen view of the live index for matching.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            index: self.live.clone(),
        }
    }

    /// Returns the total number of live facts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.values().map(im::Vector::len).sum()
    }

    /// Returns true if there are no live facts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if facts are waiting to be drained.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.shared.has_pending()
    }

    /// Returns the number of facts waiting to be drained.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.shared.pending_len()
    }

    /// Returns the current signal epoch (see [`MemoryHandle::epoch`]).
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.shared.epoch()
    }

    /// Clears templates, the live index, and the pending queue.
    pub fn reset(&mut self) {
        self.shared.clear();
        self.live = LiveIndex::new();
    }
}
