//! Condition patterns and variable bindings.
//!
//! A [`Condition`] targets one fact type and lists (field, [`Pattern`])
//! tests. Unifying a condition against a fact checks every test in order
//! and extends the [`Bindings`] with any variables seen for the first time.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use ops5_foundation::Value;
use ops5_memory::Fact;

/// Leading character that marks a variable in rule files.
pub const VARIABLE_SIGIL: char = '$';

/// Returns true if a rule-file string names a variable.
#[must_use]
pub fn is_variable_name(s: &str) -> bool {
    s.starts_with(VARIABLE_SIGIL)
}

// =============================================================================
// Pattern
// =============================================================================

/// What a condition requires of one field.
#[derive(Clone, Debug, PartialEq)]
pub enum Pattern {
    /// Field must equal this value exactly: `^color red`
    Literal(Value),
    /// First occurrence binds, later occurrences must be equal: `^color $c`
    Variable(String),
    /// Field must have no value: `^color nil`
    Absent,
}

impl Pattern {
    /// Creates a literal pattern.
    #[must_use]
    pub fn lit(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// Creates a variable pattern. The name is stored as given, sigil included.
    #[must_use]
    pub fn var(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    /// Returns true for variable patterns.
    #[must_use]
    pub fn is_variable(&self) -> bool {
        matches!(self, Self::Variable(_))
    }

    /// Tests a field value, binding the variable if it is unseen.
    ///
    /// On failure `bindings` is left as it was.
    pub fn unify(&self, value: &Value, bindings: &mut Bindings) -> bool {
        match self {
            Self::Literal(lit) => lit == value,
            Self::Absent => value.is_nil(),
            Self::Variable(var) => {
                if let Some(existing) = bindings.get(var) {
                    // Must match existing binding (unification)
                    existing == value
                } else {
                    bindings.set(var.clone(), value.clone());
                    true
                }
            }
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(v) => write!(f, "{v:?}"),
            Self::Variable(name) => write!(f, "{name}"),
            Self::Absent => write!(f, "nil"),
        }
    }
}

// =============================================================================
// Condition
// =============================================================================

/// One clause of a rule's query, matched against facts of one type.
#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    /// The fact type this condition matches.
    pub fact_type: Arc<str>,
    /// Field tests, checked in order.
    pub tests: Vec<(Arc<str>, Pattern)>,
}

impl Condition {
    /// Creates a condition that matches any fact of the type.
    #[must_use]
    pub fn new(fact_type: impl Into<Arc<str>>) -> Self {
        Self {
            fact_type: fact_type.into(),
            tests: Vec::new(),
        }
    }

    /// Adds a field test.
    #[must_use]
    pub fn with(mut self, field: impl Into<Arc<str>>, pattern: Pattern) -> Self {
        self.tests.push((field.into(), pattern));
        self
    }

    /// Number of variable-bound fields in this condition.
    #[must_use]
    pub fn specificity(&self) -> usize {
        self.tests.iter().filter(|(_, p)| p.is_variable()).count()
    }

    /// Unifies this condition against a fact.
    ///
    /// Returns the extended bindings on success; `bindings` itself is never
    /// modified, so a failed attempt leaves no partial bindings behind.
    #[must_use]
    pub fn unify(&self, fact: &Fact, bindings: &Bindings) -> Option<Bindings> {
        if fact.fact_type() != &*self.fact_type {
            return None;
        }
        let mut trial = bindings.clone();
        for (field, pattern) in &self.tests {
            if !pattern.unify(&fact.get(field), &mut trial) {
                return None;
            }
        }
        Some(trial)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.fact_type)?;
        for (field, pattern) in &self.tests {
            write!(f, " ^{field} {pattern}")?;
        }
        write!(f, ")")
    }
}

// =============================================================================
// Bindings
// =============================================================================

/// A set of variable bindings from pattern matching.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bindings {
    values: HashMap<String, Value>,
}

impl Bindings {
    /// Create empty bindings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a binding by variable name.
    #[must_use]
    pub fn get(&self, var: &str) -> Option<&Value> {
        self.values.get(var)
    }

    /// Set a binding.
    pub fn set(&mut self, var: String, value: Value) {
        self.values.insert(var, value);
    }

    /// Returns true if the variable is bound.
    #[must_use]
    pub fn contains(&self, var: &str) -> bool {
        self.values.contains_key(var)
    }

    /// Number of bound variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate all bindings.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}

// =============================================================================
// Tests
// =============================================================================
