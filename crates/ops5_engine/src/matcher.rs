//! Backtracking search for rule matches.
//!
//! For each rule the matcher looks for the first assignment of distinct
//! live facts to its conditions, in condition order, such that every
//! condition unifies under the bindings accumulated so far. The search
//! keeps an explicit frame stack instead of recursing, so deep rules do
//! not grow the native stack and the search can be cut off by a budget.

use std::sync::Arc;

use crossbeam_channel::unbounded;
use ops5_memory::{Fact, Snapshot};
use tracing::{trace, warn};

use crate::pattern::Bindings;
use crate::pool::WorkerPool;
use crate::rule::Rule;

/// A rule together with the facts and bindings that satisfied it.
#[derive(Clone, Debug)]
pub struct Match {
    /// The matched rule.
    pub rule: Arc<Rule>,
    /// One fact per condition, in condition order, all distinct.
    pub facts: Vec<Arc<Fact>>,
    /// Variable bindings produced by unification.
    pub bindings: Bindings,
}

/// One level of the search: which condition, where to resume scanning.
struct Frame {
    condition: usize,
    cursor: usize,
    committed: Vec<Arc<Fact>>,
    bindings: Bindings,
}

/// Finds matches against a snapshot of working memory.
#[derive(Clone, Copy, Debug, Default)]
pub struct Matcher {
    max_frames: Option<usize>,
}

impl Matcher {
    /// Creates a matcher with an optional budget of search frames per rule.
    #[must_use]
    pub fn new(max_frames: Option<usize>) -> Self {
        Self { max_frames }
    }

    /// Bounds the number of frames popped while searching one rule.
    #[must_use]
    pub fn with_max_frames(mut self, max: usize) -> Self {
        self.max_frames = Some(max);
        self
    }

    /// Returns the frame budget, if any.
    #[must_use]
    pub fn max_frames(&self) -> Option<usize> {
        self.max_frames
    }

    /// Returns the first match for a rule, or `None`.
    ///
    /// Exceeding the frame budget counts as no match and is logged.
    #[must_use]
    pub fn match_rule(&self, rule: &Arc<Rule>, snapshot: &Snapshot) -> Option<Match> {
        let conditions = rule.conditions();
        let candidates: Vec<_> = conditions
            .iter()
            .map(|c| snapshot.get(&c.fact_type))
            .collect();

        let mut stack = vec![Frame {
            condition: 0,
            cursor: 0,
            committed: Vec::with_capacity(conditions.len()),
            bindings: Bindings::new(),
        }];
        let mut frames = 0usize;

        while let Some(mut frame) = stack.pop() {
            frames += 1;
            if self.max_frames.is_some_and(|max| frames > max) {
                warn!(rule = rule.name(), frames, "match search exceeded frame budget");
                return None;
            }

            if frame.condition == conditions.len() {
                trace!(rule = rule.name(), frames, "matched");
                return Some(Match {
                    rule: Arc::clone(rule),
                    facts: frame.committed,
                    bindings: frame.bindings,
                });
            }

            let condition = &conditions[frame.condition];
            let list = &candidates[frame.condition];
            while frame.cursor < list.len() {
                let fact = &list[frame.cursor];
                frame.cursor += 1;

                if fact.is_retracted() || frame.committed.iter().any(|f| f.id() == fact.id()) {
                    continue;
                }
                if let Some(bindings) = condition.unify(fact, &frame.bindings) {
                    let mut committed = frame.committed.clone();
                    committed.push(Arc::clone(fact));
                    let child = Frame {
                        condition: frame.condition + 1,
                        cursor: 0,
                        committed,
                        bindings,
                    };
                    // Parent resumes after this fact if the child fails.
                    stack.push(frame);
                    stack.push(child);
                    break;
                }
            }
        }

        None
    }

    /// Matches every rule, returning matches in rule order.
    ///
    /// With a pool, each rule is matched as a separate job; the result is
    /// the same as sequential matching.
    #[must_use]
    pub fn match_all(
        &self,
        rules: &[Arc<Rule>],
        snapshot: &Snapshot,
        pool: Option<&WorkerPool>,
    ) -> Vec<Match> {
        match pool {
            Some(pool) if rules.len() > 1 => self.match_parallel(rules, snapshot, pool),
            _ => rules
                .iter()
                .filter_map(|rule| self.match_rule(rule, snapshot))
                .collect(),
        }
    }

    fn match_parallel(&self, rules: &[Arc<Rule>], snapshot: &Snapshot, pool: &WorkerPool) -> Vec<Match> {
        let (tx, rx) = unbounded();
        for (idx, rule) in rules.iter().enumerate() {
            let tx = tx.clone();
            let rule = Arc::clone(rule);
            let job_snapshot = snapshot.clone();
            let matcher = *self;
            let job = move || {
                let found = matcher.match_rule(&rule, &job_snapshot);
                let _ = tx.send((idx, found));
            };
            if pool.execute(job).is_err() {
                warn!("match pool unavailable, matching sequentially");
                return rules
                    .iter()
                    .filter_map(|rule| self.match_rule(rule, snapshot))
                    .collect();
            }
        }
        drop(tx);

        // Ends once every job has sent or dropped its sender.
        let mut results: Vec<(usize, Match)> = rx
            .iter()
            .filter_map(|(idx, found)| found.map(|m| (idx, m)))
            .collect();
        results.sort_by_key(|(idx, _)| *idx);
        results.into_iter().map(|(_, m)| m).collect()
    }
}
