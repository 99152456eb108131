//! The view of a firing that commands receive.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ThreadId};

use ops5_foundation::{Error, Result, Value};
use ops5_memory::{Fact, MemoryHandle};
use parking_lot::Mutex;

use crate::matcher::Match;
use crate::pattern::Bindings;
use crate::rule::{Param, Rule};

// =============================================================================
// HaltHandle
// =============================================================================

/// Shared stop flag for the engine loop.
///
/// Setting it also wakes a loop that is blocked waiting for facts.
#[derive(Clone, Debug, Default)]
pub struct HaltHandle {
    flag: Arc<AtomicBool>,
    memory: MemoryHandle,
}

impl HaltHandle {
    /// Creates a halt handle that wakes the given memory when set.
    #[must_use]
    pub fn new(memory: MemoryHandle) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            memory,
        }
    }

    /// Asks the loop to stop at the top of its next cycle.
    pub fn halt(&self) {
        self.flag.store(true, Ordering::Release);
        self.memory.wake();
    }

    /// Returns true if a halt was requested.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Clears the flag so the engine can run again.
    pub fn clear(&self) {
        self.flag.store(false, Ordering::Release);
    }
}

// =============================================================================
// ActionContext
// =============================================================================

/// Everything a command can see and do during one firing.
///
/// Sync actions of a firing share one context, so a variable set by `bind`
/// is visible to the actions after it. Async actions get their own clone of
/// the bindings as they stood at dispatch.
pub struct ActionContext {
    rule: Arc<Rule>,
    facts: Vec<Arc<Fact>>,
    bindings: Mutex<Bindings>,
    memory: MemoryHandle,
    halt: HaltHandle,
    loop_thread: ThreadId,
    removals: Mutex<Vec<Arc<Fact>>>,
}

impl ActionContext {
    /// Creates the context for a match, owned by the current (loop) thread.
    #[must_use]
    pub fn new(matched: Match, memory: MemoryHandle, halt: HaltHandle) -> Self {
        Self {
            rule: matched.rule,
            facts: matched.facts,
            bindings: Mutex::new(matched.bindings),
            memory,
            halt,
            loop_thread: thread::current().id(),
            removals: Mutex::new(Vec::new()),
        }
    }

    /// Clones this context for an async action, freezing current bindings.
    ///
    /// The clone keeps the loop thread id, so removals from it fail.
    #[must_use]
    pub(crate) fn fork(&self) -> Self {
        Self {
            rule: Arc::clone(&self.rule),
            facts: self.facts.clone(),
            bindings: Mutex::new(self.bindings.lock().clone()),
            memory: self.memory.clone(),
            halt: self.halt.clone(),
            loop_thread: self.loop_thread,
            removals: Mutex::new(Vec::new()),
        }
    }

    /// The rule being fired.
    #[must_use]
    pub fn rule(&self) -> &Arc<Rule> {
        &self.rule
    }

    /// The fired rule's name.
    #[must_use]
    pub fn rule_name(&self) -> &str {
        self.rule.name()
    }

    /// The matched facts, one per condition.
    #[must_use]
    pub fn facts(&self) -> &[Arc<Fact>] {
        &self.facts
    }

    /// The fact matched by condition `index`.
    ///
    /// # Errors
    /// Returns an index error if the rule has fewer conditions.
    pub fn fact(&self, index: usize) -> Result<&Arc<Fact>> {
        self.facts
            .get(index)
            .ok_or_else(|| Error::index(index, self.facts.len()))
    }

    /// Handle onto working memory.
    #[must_use]
    pub fn memory(&self) -> &MemoryHandle {
        &self.memory
    }

    /// Requests that the engine stop.
    pub fn halt(&self) {
        self.halt.halt();
    }

    /// Queues the fact matched by condition `index` for removal.
    ///
    /// The engine applies queued removals after the current sync action
    /// returns, so the fact disappears before the next match phase.
    ///
    /// # Errors
    /// Returns an index error for a bad index, or an async-removal error
    /// when called off the engine loop thread.
    pub fn remove_matched(&self, index: usize) -> Result<()> {
        let fact = Arc::clone(self.fact(index)?);
        if thread::current().id() != self.loop_thread {
            return Err(Error::async_removal(index));
        }
        self.removals.lock().push(fact);
        Ok(())
    }

    /// Overwrites fields of the fact matched by condition `index` in place.
    ///
    /// # Errors
    /// Returns an index error for a bad index or a field error for a key
    /// outside the schema, in which case the fact is unchanged.
    pub fn modify_matched<K: AsRef<str>>(&self, index: usize, values: &[(K, Value)]) -> Result<()> {
        self.fact(index)?.set_many(values)
    }

    /// Creates a fact; it becomes visible at the next drain.
    ///
    /// # Errors
    /// Returns a schema or field error from the template.
    pub fn create_fact<K: AsRef<str>>(&self, fact_type: &str, values: &[(K, Value)]) -> Result<Arc<Fact>> {
        self.memory.make(fact_type, values)
    }

    /// Resolves one parameter against the current bindings.
    ///
    /// # Errors
    /// Returns an unbound-variable error for a variable with no binding.
    pub fn resolve_value(&self, param: &Param) -> Result<Value> {
        match param {
            Param::Literal(v) => Ok(v.clone()),
            Param::Variable(name) => self
                .bindings
                .lock()
                .get(name)
                .cloned()
                .ok_or_else(|| Error::unbound_variable(name.as_str())),
        }
    }

    /// Resolves a parameter list in order.
    ///
    /// # Errors
    /// Fails on the first unbound variable.
    pub fn resolve_values(&self, params: &[Param]) -> Result<Vec<Value>> {
        params.iter().map(|p| self.resolve_value(p)).collect()
    }

    /// Returns a variable's current binding.
    #[must_use]
    pub fn get_var(&self, name: &str) -> Option<Value> {
        self.bindings.lock().get(name).cloned()
    }

    /// Binds (or rebinds) a variable for the remaining actions of the firing.
    pub fn set_var(&self, name: impl Into<String>, value: Value) {
        self.bindings.lock().set(name.into(), value);
    }

    /// Returns true if the variable is bound.
    #[must_use]
    pub fn has_var(&self, name: &str) -> bool {
        self.bindings.lock().contains(name)
    }

    /// Returns a copy of the current bindings.
    #[must_use]
    pub fn bindings(&self) -> Bindings {
        self.bindings.lock().clone()
    }

    pub(crate) fn take_removals(&self) -> Vec<Arc<Fact>> {
        std::mem::take(&mut *self.removals.lock())
    }
}
