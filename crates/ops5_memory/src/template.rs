//! Templates define the structure of each fact type.
//!
//! A template is registered once per type ("literalize") and fixes the
//! field names and their default values. Every fact is an instance of a
//! template with some defaults overridden.

use std::sync::Arc;

use ops5_foundation::{Error, Result, Value};

use crate::fact::{Fact, FactId, Fields};

/// Schema definition for a fact type.
#[derive(Clone, Debug, PartialEq)]
pub struct Template {
    /// Type tag (e.g., `goal`, `monkey`).
    pub fact_type: Arc<str>,
    /// Field names with their default values, in declaration order.
    pub defaults: Fields,
}

impl Template {
    /// Creates a template with no fields.
    #[must_use]
    pub fn new(fact_type: impl Into<Arc<str>>) -> Self {
        Self {
            fact_type: fact_type.into(),
            defaults: Vec::new(),
        }
    }

    /// Adds a field with a default value.
    ///
    /// Declaring the same field twice replaces its default.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<Arc<str>>, default: impl Into<Value>) -> Self {
        let name = name.into();
        let default = default.into();
        if let Some(slot) = self.defaults.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = default;
        } else {
            self.defaults.push((name, default));
        }
        self
    }

    /// Adds a field whose default is absent.
    #[must_use]
    pub fn with_absent(self, name: impl Into<Arc<str>>) -> Self {
        self.with_field(name, Value::Nil)
    }

    /// Returns true if the field belongs to this schema.
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.defaults.iter().any(|(n, _)| &**n == name)
    }

    /// Returns the field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.defaults.iter().map(|(n, _)| &**n)
    }

    /// Creates a fact from this template with some fields overridden.
    ///
    /// # Errors
    /// Returns a field error if an override names a field outside the schema.
    pub fn instantiate<K: AsRef<str>>(&self, id: FactId, overrides: &[(K, Value)]) -> Result<Fact> {
        let mut fields = self.defaults.clone();
        for (key, value) in overrides {
            let key = key.as_ref();
            let slot = fields
                .iter_mut()
                .find(|(n, _)| &**n == key)
                .ok_or_else(|| Error::field(&*self.fact_type, key))?;
            slot.1 = value.clone();
        }
        Ok(Fact::new(id, Arc::clone(&self.fact_type), fields))
    }
}
