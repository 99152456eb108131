//! Configuration for the engine loop and its worker pools.

use std::num::NonZeroUsize;
use std::thread;
use std::time::Duration;

/// Configuration for an [`crate::Engine`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Order rules most-specific first instead of by declaration.
    pub sort_by_specificity: bool,

    /// Threads in the matching pool.
    pub match_workers: usize,

    /// Threads in the async action pool.
    pub action_workers: usize,

    /// Match rules on the pool rather than the loop thread.
    pub parallel_match: bool,

    /// How long a quiescent engine waits for external producers.
    /// `None` stops as soon as nothing can happen.
    pub idle_timeout: Option<Duration>,

    /// Frame budget per rule for the backtracking search.
    pub max_match_frames: Option<usize>,
}

fn hardware_parallelism() -> usize {
    thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

impl Default for EngineConfig {
    fn default() -> Self {
        let workers = hardware_parallelism();
        Self {
            sort_by_specificity: false,
            match_workers: workers,
            action_workers: workers,
            parallel_match: true,
            idle_timeout: None,
            max_match_frames: None,
        }
    }
}

impl EngineConfig {
    /// Matching on the loop thread; one action worker.
    #[must_use]
    pub fn sequential() -> Self {
        Self {
            match_workers: 1,
            action_workers: 1,
            parallel_match: false,
            ..Self::default()
        }
    }

    /// Builder method to enable specificity ordering.
    #[must_use]
    pub fn with_sort_by_specificity(mut self, enabled: bool) -> Self {
        self.sort_by_specificity = enabled;
        self
    }

    /// Builder method to set the matching pool size.
    #[must_use]
    pub fn with_match_workers(mut self, workers: usize) -> Self {
        self.match_workers = workers.max(1);
        self
    }

    /// Builder method to set the action pool size.
    #[must_use]
    pub fn with_action_workers(mut self, workers: usize) -> Self {
        self.action_workers = workers.max(1);
        self
    }

    /// Builder method to toggle parallel matching.
    #[must_use]
    pub fn with_parallel_match(mut self, enabled: bool) -> Self {
        self.parallel_match = enabled;
        self
    }

    /// Builder method to set the idle wait.
    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Builder method to bound the match search.
    #[must_use]
    pub fn with_max_match_frames(mut self, frames: Option<usize>) -> Self {
        self.max_match_frames = frames;
        self
    }
}
