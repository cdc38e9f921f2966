//! In-memory storage driver implementation

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::entry::DeleteTarget;
use crate::domain::event::{ChangeEvent, ChangeStream};
use crate::domain::filter::{EntryFilter, FieldFilter};
use crate::domain::potential::{CollectionPotential, EntryPotential};
use crate::domain::{Entry, StorageDriver, StorageError};
use crate::infrastructure::feed::{ChangeFeed, DriverConfig, FeedFilter};
use crate::infrastructure::memory::potential::{MemoryCollectionPotential, MemoryEntryPotential};

/// Thread-safe in-memory storage driver.
///
/// Useful for testing and embedded use; data is lost when the process
/// terminates. Reads hand out clones, never references into the store, which
/// mirrors what API- and database-backed drivers naturally provide.
///
/// Change events are emitted synchronously within the awaited write call --
/// the ordering the converting driver's echo suppression assumes.
///
/// Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct MemoryDriver<E: Entry, F: EntryFilter<E> = FieldFilter> {
    inner: Arc<MemoryInner<E>>,
    _filter: PhantomData<fn() -> F>,
}

impl<E: Entry, F: EntryFilter<E>> std::fmt::Debug for MemoryDriver<E, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDriver")
            .field("inner", &self.inner)
            .finish()
    }
}

#[derive(Debug)]
pub(crate) struct MemoryInner<E: Entry> {
    entries: RwLock<HashMap<String, E>>,
    feed: ChangeFeed<E>,
}

impl<E: Entry> MemoryInner<E> {
    pub(crate) async fn fetch(&self, id: &str) -> Option<E> {
        self.entries.read().await.get(id).cloned()
    }

    pub(crate) async fn find<F: EntryFilter<E>>(&self, filter: Option<&F>) -> Vec<E> {
        let entries = self.entries.read().await;
        match filter {
            Some(filter) => entries
                .values()
                .filter(|entry| filter.matches(entry))
                .cloned()
                .collect(),
            None => entries.values().cloned().collect(),
        }
    }

    pub(crate) async fn upsert(&self, entry: E) {
        {
            let mut entries = self.entries.write().await;
            entries.insert(entry.id().to_string(), entry.clone());
        }
        debug!(id = %entry.id(), "entry stored");
        self.feed.emit(&ChangeEvent::Updated { entry });
    }

    pub(crate) async fn remove(&self, id: &str) {
        let previous = {
            let mut entries = self.entries.write().await;
            entries.remove(id)
        };
        // Removing an absent id is a silent no-op: there is no pre-deletion
        // state to announce.
        if let Some(entry) = previous {
            debug!(id, "entry removed");
            self.feed.emit(&ChangeEvent::Deleted { entry });
        }
    }

    pub(crate) fn subscribe(&self, filter: FeedFilter<E>) -> ChangeStream<E> {
        self.feed.subscribe(filter)
    }
}

impl<E: Entry, F: EntryFilter<E>> MemoryDriver<E, F> {
    /// Creates an empty driver with default configuration
    pub fn new() -> Self {
        Self::with_config(DriverConfig::default())
    }

    /// Creates an empty driver with the given configuration
    pub fn with_config(config: DriverConfig) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                entries: RwLock::new(HashMap::new()),
                feed: ChangeFeed::new(config.channel_capacity),
            }),
            _filter: PhantomData,
        }
    }

    /// Creates a driver pre-populated with entries (no events are emitted)
    pub async fn with_entries(entries: Vec<E>) -> Self {
        let driver = Self::new();
        {
            let mut map = driver.inner.entries.write().await;
            for entry in entries {
                map.insert(entry.id().to_string(), entry);
            }
        }
        driver
    }

    /// Number of stored entries
    pub async fn len(&self) -> usize {
        self.inner.entries.read().await.len()
    }

    /// Returns `true` if nothing is stored
    pub async fn is_empty(&self) -> bool {
        self.inner.entries.read().await.is_empty()
    }
}

impl<E: Entry, F: EntryFilter<E>> Default for MemoryDriver<E, F> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: Entry, F: EntryFilter<E>> StorageDriver<E> for MemoryDriver<E, F> {
    type Filter = F;

    async fn fetch(&self, id: &str) -> Result<Option<E>, StorageError> {
        Ok(self.inner.fetch(id).await)
    }

    async fn insert(&self, entry: E) -> Result<(), StorageError> {
        self.inner.upsert(entry).await;
        Ok(())
    }

    async fn find(&self, filter: Option<&Self::Filter>) -> Result<Vec<E>, StorageError> {
        Ok(self.inner.find(filter).await)
    }

    async fn update(&self, entry: E) -> Result<(), StorageError> {
        // Whole-record replacement; a missing id behaves as insert.
        self.inner.upsert(entry).await;
        Ok(())
    }

    async fn delete(&self, target: DeleteTarget<E>) -> Result<(), StorageError> {
        self.inner.remove(target.id()).await;
        Ok(())
    }

    async fn insert_collection(&self, entries: Vec<E>) -> Result<(), StorageError> {
        for entry in entries {
            self.inner.upsert(entry).await;
        }
        Ok(())
    }

    async fn update_collection(&self, entries: Vec<E>) -> Result<(), StorageError> {
        for entry in entries {
            self.inner.upsert(entry).await;
        }
        Ok(())
    }

    async fn delete_collection(
        &self,
        targets: Vec<DeleteTarget<E>>,
    ) -> Result<(), StorageError> {
        for target in targets {
            self.inner.remove(target.id()).await;
        }
        Ok(())
    }

    fn entry_potential(&self, id: &str) -> Box<dyn EntryPotential<E>> {
        Box::new(MemoryEntryPotential::new(
            id.to_string(),
            Arc::clone(&self.inner),
        ))
    }

    fn collection_potential(
        &self,
        filter: Option<Self::Filter>,
    ) -> Box<dyn CollectionPotential<E>> {
        Box::new(MemoryCollectionPotential::new(
            filter,
            Arc::clone(&self.inner),
        ))
    }

    fn changes(&self) -> ChangeStream<E> {
        self.inner.subscribe(FeedFilter::All)
    }

    async fn dispose(&self) -> Result<(), StorageError> {
        self.inner.entries.write().await.clear();
        debug!("memory driver disposed");
        Ok(())
    }
}
