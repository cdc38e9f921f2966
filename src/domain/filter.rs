//! Entry filters for find and collection subscriptions

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::Entry;

/// Predicate over entries, used by `find` and by collection subscriptions.
///
/// A driver fixes its filter vocabulary through the `StorageDriver::Filter`
/// associated type; [`FieldFilter`] is the reference implementation.
pub trait EntryFilter<E>: Clone + Send + Sync + 'static {
    /// Returns `true` if the entry satisfies this filter
    fn matches(&self, entry: &E) -> bool;
}

/// Structural field filter: every named field must exist on the serialized
/// entry with an equal value. An empty filter matches every entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldFilter {
    fields: BTreeMap<String, Value>,
}

impl FieldFilter {
    /// Creates an empty filter (matches everything)
    pub fn new() -> Self {
        Self {
            fields: BTreeMap::new(),
        }
    }

    /// Adds a field constraint
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Returns `true` if no field constraints are set
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<E: Entry> EntryFilter<E> for FieldFilter {
    fn matches(&self, entry: &E) -> bool {
        if self.fields.is_empty() {
            return true;
        }

        // An entry that cannot be serialized cannot be inspected; fail closed.
        let Ok(value) = serde_json::to_value(entry) else {
            return false;
        };
        let Some(object) = value.as_object() else {
            return false;
        };

        self.fields
            .iter()
            .all(|(name, expected)| object.get(name) == Some(expected))
    }
}
