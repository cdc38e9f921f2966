//! Observation handles for single entries and filtered collections

use async_trait::async_trait;

use crate::domain::event::ChangeStream;
use crate::domain::{Entry, StorageError};

/// A handle on one logical record: fetch it on demand, write through it, or
/// observe its changes.
///
/// A potential owns no data and holds no subscription state of its own; it
/// answers `fetch` correctly with zero subscribers, and every `subscribe`
/// call creates exactly one registration on the owning driver's change
/// channel, released when the returned stream is dropped.
#[async_trait]
pub trait EntryPotential<E: Entry>: Send + Sync {
    /// Fetch the current state of the entry, if present
    async fn fetch(&self) -> Result<Option<E>, StorageError>;

    /// Update the entry. The entry's id must match this potential's id.
    async fn update(&self, entry: E) -> Result<(), StorageError>;

    /// Delete the entry
    async fn delete(&self) -> Result<(), StorageError>;

    /// Subscribe to changes of this entry only
    fn subscribe(&self) -> ChangeStream<E>;
}

/// A handle on the set of records matching a filter.
#[async_trait]
pub trait CollectionPotential<E: Entry>: Send + Sync {
    /// Fetch all entries currently matching the bound filter
    async fn all(&self) -> Result<Vec<E>, StorageError>;

    /// Subscribe to changes of matching entries only
    fn subscribe(&self) -> ChangeStream<E>;
}
