//! Facts: typed record instances in working memory.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ops5_foundation::{Error, Result, Value};
use parking_lot::RwLock;

/// Ordered field name to value pairs, in template declaration order.
pub type Fields = Vec<(Arc<str>, Value)>;

/// Fact identifier.
///
/// Identity is by instance: two facts with identical fields created
/// separately have different ids.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct FactId(u64);

impl FactId {
    /// Creates a fact id from its raw index.
    #[must_use]
    pub const fn new(index: u64) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    #[must_use]
    pub const fn index(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for FactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FactId({})", self.0)
    }
}

impl fmt::Display for FactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A typed record in working memory.
///
/// The field set is fixed at creation by the type's template; field values
/// can change through [`Fact::set`] and [`Fact::set_many`].
pub struct Fact {
    id: FactId,
    fact_type: Arc<str>,
    fields: RwLock<Fields>,
    retracted: AtomicBool,
}

impl Fact {
    /// Creates a fact. Use [`crate::Template::instantiate`] to get a
    /// schema-conforming field set.
    #[must_use]
    pub fn new(id: FactId, fact_type: Arc<str>, fields: Fields) -> Self {
        Self {
            id,
            fact_type,
            fields: RwLock::new(fields),
            retracted: AtomicBool::new(false),
        }
    }

    /// Returns this fact's identity.
    #[must_use]
    pub fn id(&self) -> FactId {
        self.id
    }

    /// Returns this fact's type tag.
    #[must_use]
    pub fn fact_type(&self) -> &str {
        &self.fact_type
    }

    /// Returns the shared type tag.
    #[must_use]
    pub fn type_tag(&self) -> &Arc<str> {
        &self.fact_type
    }

    /// Returns the value of a field.
    ///
    /// Fields outside the schema read as `Nil`, the same as absent fields.
    #[must_use]
    pub fn get(&self, field: &str) -> Value {
        self.fields
            .read()
            .iter()
            .find(|(name, _)| &**name == field)
            .map(|(_, value)| value.clone())
            .unwrap_or_default()
    }

    /// Returns true if the field is part of this fact's schema.
    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.read().iter().any(|(name, _)| &**name == field)
    }

    /// Returns a snapshot of all fields.
    #[must_use]
    pub fn fields(&self) -> Fields {
        self.fields.read().clone()
    }

    /// Overwrites one existing field.
    ///
    /// # Errors
    /// Returns a field error if `field` is not part of the schema.
    pub fn set(&self, field: &str, value: Value) -> Result<()> {
        let mut fields = self.fields.write();
        let slot = fields
            .iter_mut()
            .find(|(name, _)| &**name == field)
            .ok_or_else(|| Error::field(&*self.fact_type, field))?;
        slot.1 = value;
        Ok(())
    }

    /// Overwrites several existing fields at once.
    ///
    /// Every key is checked before any field is written, so a failed call
    /// leaves the fact unchanged.
    ///
    /// # Errors
    /// Returns a field error naming the first key outside the schema.
    pub fn set_many<K: AsRef<str>>(&self, values: &[(K, Value)]) -> Result<()> {
        let mut fields = self.fields.write();
        for (key, _) in values {
            let key = key.as_ref();
            if !fields.iter().any(|(name, _)| &**name == key) {
                return Err(Error::field(&*self.fact_type, key));
            }
        }
        for (key, value) in values {
            let key = key.as_ref();
            if let Some(slot) = fields.iter_mut().find(|(name, _)| &**name == key) {
                slot.1 = value.clone();
            }
        }
        Ok(())
    }

    /// Returns true once the fact has been removed from the live index.
    #[must_use]
    pub fn is_retracted(&self) -> bool {
        self.retracted.load(Ordering::Acquire)
    }

    pub(crate) fn mark_retracted(&self) {
        self.retracted.store(true, Ordering::Release);
    }
}

impl PartialEq for Fact {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Fact {}

impl Hash for Fact {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {}", self.fact_type, self.id)?;
        for (name, value) in self.fields.read().iter() {
            write!(f, " {name}={value:?}")?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.fact_type)?;
        for (name, value) in self.fields.read().iter() {
            if !value.is_nil() {
                write!(f, " ^{name} {value}")?;
            }
        }
        write!(f, ")")
    }
}
