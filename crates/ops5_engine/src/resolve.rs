//! Conflict resolution: pick one match to fire.
//!
//! Matches arrive in rule order. When more than one rule matched, the rule
//! that fired last is set aside (refractoriness) so a rule whose actions do
//! not change its own match cannot fire forever while others wait. A lone
//! match is always selected, even if it is the last-fired rule.

use std::sync::Arc;

use tracing::trace;

use crate::matcher::Match;
use crate::rule::Rule;

/// Selects the match to fire from a cycle's candidates.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConflictResolver;

impl ConflictResolver {
    /// Creates a resolver.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns the selected match, or `None` if nothing matched.
    #[must_use]
    pub fn resolve(&self, mut matches: Vec<Match>, last_fired: Option<&Arc<Rule>>) -> Option<Match> {
        if matches.len() > 1 {
            if let Some(last) = last_fired {
                if let Some(pos) = matches.iter().position(|m| Arc::ptr_eq(&m.rule, last)) {
                    trace!(rule = last.name(), "refractory");
                    matches.remove(pos);
                }
            }
        }
        matches.into_iter().next()
    }
}
