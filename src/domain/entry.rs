//! Entry traits and types

use std::fmt::Debug;
use std::sync::Arc;

use serde::Serialize;

/// Trait for records that can be stored and observed.
///
/// Every stored record and every domain object satisfies this contract; the
/// two are distinguished structurally, not by inheritance. The id must stay
/// stable across the insert/update/delete lifecycle of a logical record.
///
/// `Serialize` is required so structural filters can inspect entry fields.
pub trait Entry: Clone + Debug + Send + Sync + Serialize + 'static {
    /// Returns the entry's unique identifier
    fn id(&self) -> &str;
}

// Shared handles are entries too; the converting layer hands out `Arc`s so
// repeated fetches of the same logical record compare equal by pointer.
impl<T: Entry> Entry for Arc<T> {
    fn id(&self) -> &str {
        (**self).id()
    }
}

/// Target of a delete operation: either a bare id or a full entry.
///
/// Replaces runtime discrimination between "id string" and "entry object"
/// arguments with a variant the compiler checks exhaustively.
#[derive(Debug, Clone)]
pub enum DeleteTarget<E> {
    /// Delete the record with this id
    ById(String),
    /// Delete the record matching this entry's id
    ByEntry(E),
}

impl<E: Entry> DeleteTarget<E> {
    /// The id this target resolves to
    pub fn id(&self) -> &str {
        match self {
            Self::ById(id) => id,
            Self::ByEntry(entry) => entry.id(),
        }
    }
}

impl<E> From<String> for DeleteTarget<E> {
    fn from(id: String) -> Self {
        Self::ById(id)
    }
}

impl<E> From<&str> for DeleteTarget<E> {
    fn from(id: &str) -> Self {
        Self::ById(id.to_string())
    }
}
