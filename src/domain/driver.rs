//! Storage driver contract

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::entry::DeleteTarget;
use crate::domain::event::ChangeStream;
use crate::domain::filter::EntryFilter;
use crate::domain::potential::{CollectionPotential, EntryPotential};
use crate::domain::{Entry, StorageError};

/// Generic driver contract for CRUD and observation over any entry type.
///
/// The contract is deliberately vague enough that a variety of backends can
/// implement it (memory, database, remote API) while staying concrete enough
/// for application-facing callers to rely on:
///
/// - `fetch` signals absence with `Ok(None)`, never an error
/// - `insert` and `update` are upserts; updating a missing id inserts it
/// - every mutation is announced on the driver-wide change channel
/// - `delete_collection` with an empty input is a no-op
#[async_trait]
pub trait StorageDriver<E: Entry>: Send + Sync + Debug {
    /// Filter vocabulary accepted by `find` and collection potentials
    type Filter: EntryFilter<E>;

    /// Fetch a copy of the entry with the given id
    async fn fetch(&self, id: &str) -> Result<Option<E>, StorageError>;

    /// Insert an entry, replacing any previous entry with the same id
    async fn insert(&self, entry: E) -> Result<(), StorageError>;

    /// Find all entries matching the filter; no filter matches everything
    async fn find(&self, filter: Option<&Self::Filter>) -> Result<Vec<E>, StorageError>;

    /// Update an entry; a missing id behaves as insert
    async fn update(&self, entry: E) -> Result<(), StorageError>;

    /// Remove an entry
    async fn delete(&self, target: DeleteTarget<E>) -> Result<(), StorageError>;

    /// Insert a collection of entries
    async fn insert_collection(&self, entries: Vec<E>) -> Result<(), StorageError>;

    /// Update a collection of entries
    async fn update_collection(&self, entries: Vec<E>) -> Result<(), StorageError>;

    /// Remove a collection of entries; an empty input is a no-op
    async fn delete_collection(
        &self,
        targets: Vec<DeleteTarget<E>>,
    ) -> Result<(), StorageError>;

    /// Get an observation handle for one entry
    fn entry_potential(&self, id: &str) -> Box<dyn EntryPotential<E>>;

    /// Get an observation handle for the entries matching a filter
    fn collection_potential(
        &self,
        filter: Option<Self::Filter>,
    ) -> Box<dyn CollectionPotential<E>>;

    /// Subscribe to every change announced by this driver
    fn changes(&self) -> ChangeStream<E>;

    /// Dispose of any data or connection
    async fn dispose(&self) -> Result<(), StorageError>;
}
