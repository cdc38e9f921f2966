//! Application-facing facade over a storage driver

use crate::domain::entry::DeleteTarget;
use crate::domain::potential::{CollectionPotential, EntryPotential};
use crate::domain::{Entry, StorageDriver, StorageError};

/// How [`Sack::store`] writes an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Replace whatever is stored under the entry's id
    Replace,
    /// Update the stored entry (inserts when absent)
    Update,
}

/// A named group of entries held by a storage driver.
///
/// Where the raw driver signals absence with `Ok(None)`, the sack treats a
/// missing entry as a failure: application code asking for a specific id
/// usually has no meaningful default.
#[derive(Debug)]
pub struct Sack<E, D>
where
    E: Entry,
    D: StorageDriver<E>,
{
    driver: D,
    _entry: std::marker::PhantomData<fn() -> E>,
}

impl<E, D> Sack<E, D>
where
    E: Entry,
    D: StorageDriver<E>,
{
    /// Creates a sack over the given driver
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            _entry: std::marker::PhantomData,
        }
    }

    /// Fetch an entry by id, failing when it does not exist
    pub async fn fetch(&self, id: &str) -> Result<E, StorageError> {
        self.driver
            .fetch(id)
            .await?
            .ok_or_else(|| StorageError::not_found(format!("Entry with id '{id}' not found")))
    }

    /// Store an entry
    pub async fn store(&self, entry: E, mode: StoreMode) -> Result<(), StorageError> {
        match mode {
            StoreMode::Replace => self.driver.insert(entry).await,
            StoreMode::Update => self.driver.update(entry).await,
        }
    }

    /// Remove an entry
    pub async fn remove(&self, target: DeleteTarget<E>) -> Result<(), StorageError> {
        self.driver.delete(target).await
    }

    /// Observation handle for one entry
    pub fn entry(&self, id: &str) -> Box<dyn EntryPotential<E>> {
        self.driver.entry_potential(id)
    }

    /// Observation handle for the entries matching a filter
    pub fn collection(&self, filter: Option<D::Filter>) -> Box<dyn CollectionPotential<E>> {
        self.driver.collection_potential(filter)
    }

    /// The underlying driver
    pub fn driver(&self) -> &D {
        &self.driver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory::MemoryDriver;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestEntry {
        id: String,
        name: String,
    }

    impl Entry for TestEntry {
        fn id(&self) -> &str {
            &self.id
        }
    }

    fn entry(id: &str, name: &str) -> TestEntry {
        TestEntry {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    fn sack() -> Sack<TestEntry, MemoryDriver<TestEntry>> {
        Sack::new(MemoryDriver::new())
    }

    #[tokio::test]
    async fn test_fetch_missing_fails() {
        let sack = sack();

        let result = sack.fetch("missing").await;
        assert!(matches!(result.unwrap_err(), StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_store_and_fetch() {
        let sack = sack();
        sack.store(entry("1", "a"), StoreMode::Replace).await.unwrap();

        let fetched = sack.fetch("1").await.unwrap();
        assert_eq!(fetched, entry("1", "a"));
    }

    #[tokio::test]
    async fn test_store_update_mode() {
        let sack = sack();
        sack.store(entry("1", "a"), StoreMode::Replace).await.unwrap();
        sack.store(entry("1", "b"), StoreMode::Update).await.unwrap();

        let fetched = sack.fetch("1").await.unwrap();
        assert_eq!(fetched.name, "b");
    }

    #[tokio::test]
    async fn test_remove() {
        let sack = sack();
        sack.store(entry("1", "a"), StoreMode::Replace).await.unwrap();

        sack.remove("1".into()).await.unwrap();
        assert!(sack.fetch("1").await.is_err());
    }

    #[tokio::test]
    async fn test_entry_potential_passthrough() {
        let sack = sack();
        sack.store(entry("1", "a"), StoreMode::Replace).await.unwrap();

        let potential = sack.entry("1");
        assert_eq!(potential.fetch().await.unwrap(), Some(entry("1", "a")));
    }
}
