//! The match-resolve-act loop.
//!
//! Each cycle drains pending facts, matches every rule against the frozen
//! store, resolves to one match, and runs that rule's actions. Sync actions
//! run inline; async actions are handed to the [`AsyncExecutor`] and tracked
//! by ticket. The loop ends when nothing matches, nothing is pending, and
//! no tickets are outstanding, or when halted.

use std::cmp::Reverse;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use ops5_foundation::{Error, ErrorContext, Result, Value};
use ops5_memory::{Fact, FactStore, MemoryHandle, Template};
use parking_lot::Mutex;
use tracing::{debug, error, info, trace};

use crate::config::EngineConfig;
use crate::context::{ActionContext, HaltHandle};
use crate::executor::{AsyncExecutor, Ticket};
use crate::matcher::{Match, Matcher};
use crate::pool::WorkerPool;
use crate::resolve::ConflictResolver;
use crate::rule::{Command, ExecMode, Rule};

// =============================================================================
// Reports
// =============================================================================

/// Lifecycle state of the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    /// Not running; ready to run.
    Idle,
    /// Inside `run`.
    Running,
    /// Stopped by quiescence or halt.
    Halted,
}

/// Why a run returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// No match, nothing pending, no outstanding tickets.
    Quiescent,
    /// Stopped by a halt request.
    Halted,
    /// Reached the firing limit passed to [`Engine::run_steps`].
    StepLimit,
}

/// Summary of one call to `run`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunReport {
    /// Rules fired during this run.
    pub firings: usize,
    /// Why the run ended.
    pub outcome: RunOutcome,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} firings, {:?}", self.firings, self.outcome)
    }
}

/// A reported action failure.
#[derive(Clone, Debug)]
pub struct ActionFailure {
    /// Rule whose action failed.
    pub rule: Arc<str>,
    /// Command that failed.
    pub command: String,
    /// The `ActionExecution` error, with the rule and command as context.
    pub error: Error,
}

type FailureLog = Arc<Mutex<Vec<ActionFailure>>>;

fn report_failure(log: &FailureLog, rule: &Arc<str>, command: &str, cause: &Error) {
    error!(rule = %rule, command, error = %cause, "action failed");
    let wrapped = Error::action_execution(&**rule, command, cause)
        .with_context(ErrorContext::new().with_source(&**rule).with_frame(command));
    log.lock().push(ActionFailure {
        rule: Arc::clone(rule),
        command: command.to_string(),
        error: wrapped,
    });
}

/// Runs one command, turning a panic into an error so it is reported like
/// any other failure and the rest of the firing still runs.
fn exec_guarded(command: &dyn Command, ctx: &ActionContext, args: &[Value]) -> Result<()> {
    catch_unwind(AssertUnwindSafe(|| command.exec(ctx, args))).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(Error::internal(format!("{} panicked: {message}", command.name())))
    })
}

// =============================================================================
// Engine
// =============================================================================

/// A forward-chaining production system.
pub struct Engine {
    config: EngineConfig,
    store: FactStore,
    rules: Vec<Arc<Rule>>,
    matcher: Matcher,
    resolver: ConflictResolver,
    match_pool: Option<WorkerPool>,
    executor: AsyncExecutor,
    halt: HaltHandle,
    state: EngineState,
    last_fired: Option<Arc<Rule>>,
    firings: usize,
    failures: FailureLog,
}

impl Engine {
    /// Creates an engine and starts its worker pools.
    ///
    /// # Errors
    /// Returns an internal error if a worker thread cannot be spawned.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let store = FactStore::new();
        let memory = store.handle();
        let match_pool = if config.parallel_match {
            Some(WorkerPool::new("ops5-match", config.match_workers)?)
        } else {
            None
        };
        let executor = AsyncExecutor::new(config.action_workers, memory.clone())?;
        debug!(?config, "engine created");

        Ok(Self {
            matcher: Matcher::new(config.max_match_frames),
            resolver: ConflictResolver::new(),
            halt: HaltHandle::new(memory),
            config,
            store,
            rules: Vec::new(),
            match_pool,
            executor,
            state: EngineState::Idle,
            last_fired: None,
            firings: 0,
            failures: FailureLog::default(),
        })
    }

    // -------------------------------------------------------------------------
    // Setup
    // -------------------------------------------------------------------------

    /// Adds a rule, re-sorting by specificity if that ordering is enabled.
    pub fn add_rule(&mut self, rule: Rule) -> Arc<Rule> {
        let rule = Arc::new(rule);
        self.rules.push(Arc::clone(&rule));
        self.order_rules();
        rule
    }

    /// Adds several rules, sorting once at the end.
    pub fn add_rules(&mut self, rules: impl IntoIterator<Item = Rule>) {
        self.rules.extend(rules.into_iter().map(Arc::new));
        self.order_rules();
    }

    fn order_rules(&mut self) {
        if self.config.sort_by_specificity {
            // Stable: equal specificity keeps declaration order.
            self.rules.sort_by_key(|r| Reverse(r.specificity()));
        }
    }

    /// Rules in the order the resolver sees their matches.
    #[must_use]
    pub fn rules(&self) -> &[Arc<Rule>] {
        &self.rules
    }

    /// Registers (literalizes) a fact type.
    pub fn register_template(&self, template: Template) {
        self.store.register_template(template);
    }

    /// Creates a fact; it becomes visible at the next cycle.
    ///
    /// # Errors
    /// Returns a schema or field error.
    pub fn make<K: AsRef<str>>(&self, fact_type: &str, overrides: &[(K, Value)]) -> Result<Arc<Fact>> {
        self.store.make(fact_type, overrides)
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// The engine's configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Working memory.
    #[must_use]
    pub fn store(&self) -> &FactStore {
        &self.store
    }

    /// Mutable working memory.
    pub fn store_mut(&mut self) -> &mut FactStore {
        &mut self.store
    }

    /// Thread-safe handle for producers outside the engine.
    #[must_use]
    pub fn handle(&self) -> MemoryHandle {
        self.store.handle()
    }

    /// Shareable halt flag, usable from other threads while `run` blocks.
    #[must_use]
    pub fn halt_handle(&self) -> HaltHandle {
        self.halt.clone()
    }

    /// Requests a halt at the next cycle boundary.
    pub fn halt(&self) {
        self.halt.halt();
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Total firings since creation or the last reset.
    #[must_use]
    pub fn firings(&self) -> usize {
        self.firings
    }

    /// The rule fired most recently.
    #[must_use]
    pub fn last_fired(&self) -> Option<&Arc<Rule>> {
        self.last_fired.as_ref()
    }

    /// Every action failure reported so far.
    #[must_use]
    pub fn failures(&self) -> Vec<ActionFailure> {
        self.failures.lock().clone()
    }

    /// Async actions still running.
    #[must_use]
    pub fn outstanding(&self) -> Vec<Ticket> {
        self.executor.tickets()
    }

    // -------------------------------------------------------------------------
    // Running
    // -------------------------------------------------------------------------

    /// Runs until quiescence or halt.
    pub fn run(&mut self) -> RunReport {
        self.run_bounded(None)
    }

    /// Runs at most `steps` firings.
    pub fn run_steps(&mut self, steps: usize) -> RunReport {
        self.run_bounded(Some(steps))
    }

    fn run_bounded(&mut self, limit: Option<usize>) -> RunReport {
        self.halt.clear();
        self.state = EngineState::Running;
        let mut fired = 0;

        let outcome = loop {
            if self.halt.is_halted() {
                break RunOutcome::Halted;
            }
            if limit.is_some_and(|n| fired >= n) {
                break RunOutcome::StepLimit;
            }

            let drained = self.store.drain();
            let snapshot = self.store.snapshot();
            let matches = self
                .matcher
                .match_all(&self.rules, &snapshot, self.match_pool.as_ref());
            debug!(drained, live = snapshot.len(), matched = matches.len(), "cycle");

            let Some(selected) = self.resolver.resolve(matches, self.last_fired.as_ref()) else {
                if self.idle() {
                    continue;
                }
                break RunOutcome::Quiescent;
            };
            self.fire(selected);
            fired += 1;
        };

        match outcome {
            RunOutcome::StepLimit => self.state = EngineState::Idle,
            RunOutcome::Halted | RunOutcome::Quiescent => {
                self.executor.wait_idle(None);
                self.state = EngineState::Halted;
            }
        }
        info!(firings = fired, ?outcome, "run finished");
        RunReport {
            firings: fired,
            outcome,
        }
    }

    /// Called when nothing matched. Returns true if another cycle is needed.
    fn idle(&mut self) -> bool {
        // Read before checking, so a signal raised in between ends the wait.
        let epoch = self.store.epoch();
        if self.store.has_pending() || self.halt.is_halted() {
            return true;
        }

        let outstanding = self.executor.outstanding();
        if outstanding > 0 {
            trace!(outstanding, "waiting on async actions");
            self.store.drain_blocking_since(epoch, None);
            return true;
        }

        match self.config.idle_timeout {
            Some(timeout) => {
                trace!(?timeout, "idle, waiting for producers");
                let moved = self.store.drain_blocking_since(epoch, Some(timeout));
                moved || self.halt.is_halted() || self.executor.outstanding() > 0
            }
            None => false,
        }
    }

    fn fire(&mut self, selected: Match) {
        let rule = Arc::clone(&selected.rule);
        self.last_fired = Some(Arc::clone(&rule));
        self.firings += 1;
        debug!(rule = rule.name(), facts = ?selected.facts, "fire");

        let ctx = ActionContext::new(selected, self.store.handle(), self.halt.clone());
        for action in rule.actions() {
            let command = &action.command;
            let args = match ctx.resolve_values(&action.params) {
                Ok(args) => args,
                Err(err) => {
                    report_failure(&self.failures, rule.name_arc(), command.name(), &err);
                    continue;
                }
            };

            match command.mode() {
                ExecMode::Sync => {
                    if let Err(err) = exec_guarded(command.as_ref(), &ctx, &args) {
                        report_failure(&self.failures, rule.name_arc(), command.name(), &err);
                    }
                    for fact in ctx.take_removals() {
                        self.store.remove(&fact);
                    }
                }
                ExecMode::Async => {
                    let forked = ctx.fork();
                    let job_command = Arc::clone(command);
                    let failures = Arc::clone(&self.failures);
                    let rule_name = Arc::clone(rule.name_arc());
                    let submitted = self.executor.submit(rule.name_arc(), move || {
                        if let Err(err) = exec_guarded(job_command.as_ref(), &forked, &args) {
                            report_failure(&failures, &rule_name, job_command.name(), &err);
                        }
                    });
                    if let Err(err) = submitted {
                        report_failure(&self.failures, rule.name_arc(), command.name(), &err);
                    }
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Clears rules, working memory, and run history.
    ///
    /// Waits for outstanding async actions first so none lands in the
    /// cleared store.
    pub fn reset(&mut self) {
        self.executor.wait_idle(None);
        self.rules.clear();
        self.store.reset();
        self.last_fired = None;
        self.firings = 0;
        self.failures.lock().clear();
        self.halt.clear();
        self.state = EngineState::Idle;
        debug!("engine reset");
    }

    /// Finishes queued async actions and releases both worker pools.
    ///
    /// Later runs match on the loop thread; async actions submitted after
    /// shutdown are reported as failures.
    pub fn shutdown(&mut self) {
        self.executor.shutdown();
        if let Some(mut pool) = self.match_pool.take() {
            pool.shutdown();
        }
        self.state = EngineState::Halted;
        debug!("engine shut down");
    }
}
