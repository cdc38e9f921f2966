//! Observation handles backed by the in-memory driver

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::event::ChangeStream;
use crate::domain::filter::EntryFilter;
use crate::domain::potential::{CollectionPotential, EntryPotential};
use crate::domain::{Entry, StorageError};
use crate::infrastructure::feed::FeedFilter;
use crate::infrastructure::memory::driver::MemoryInner;

/// Entry potential over the in-memory driver.
pub struct MemoryEntryPotential<E: Entry> {
    id: String,
    inner: Arc<MemoryInner<E>>,
}

impl<E: Entry> MemoryEntryPotential<E> {
    pub(crate) fn new(id: String, inner: Arc<MemoryInner<E>>) -> Self {
        Self { id, inner }
    }
}

#[async_trait]
impl<E: Entry> EntryPotential<E> for MemoryEntryPotential<E> {
    async fn fetch(&self) -> Result<Option<E>, StorageError> {
        Ok(self.inner.fetch(&self.id).await)
    }

    async fn update(&self, entry: E) -> Result<(), StorageError> {
        if entry.id() != self.id {
            return Err(StorageError::validation(format!(
                "Entry id '{}' does not match potential id '{}'",
                entry.id(),
                self.id
            )));
        }
        self.inner.upsert(entry).await;
        Ok(())
    }

    async fn delete(&self) -> Result<(), StorageError> {
        self.inner.remove(&self.id).await;
        Ok(())
    }

    fn subscribe(&self) -> ChangeStream<E> {
        self.inner.subscribe(FeedFilter::Id(self.id.clone()))
    }
}

/// Collection potential over the in-memory driver.
pub struct MemoryCollectionPotential<E: Entry, F: EntryFilter<E>> {
    filter: Option<F>,
    inner: Arc<MemoryInner<E>>,
}

impl<E: Entry, F: EntryFilter<E>> MemoryCollectionPotential<E, F> {
    pub(crate) fn new(filter: Option<F>, inner: Arc<MemoryInner<E>>) -> Self {
        Self { filter, inner }
    }
}

#[async_trait]
impl<E: Entry, F: EntryFilter<E>> CollectionPotential<E> for MemoryCollectionPotential<E, F> {
    async fn all(&self) -> Result<Vec<E>, StorageError> {
        Ok(self.inner.find(self.filter.as_ref()).await)
    }

    fn subscribe(&self) -> ChangeStream<E> {
        match self.filter.clone() {
            Some(filter) => self
                .inner
                .subscribe(FeedFilter::Where(Arc::new(move |entry: &E| {
                    filter.matches(entry)
                }))),
            None => self.inner.subscribe(FeedFilter::All),
        }
    }
}
