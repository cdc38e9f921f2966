//! Observation handles backed by the converting driver

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::entry::DeleteTarget;
use crate::domain::event::ChangeStream;
use crate::domain::filter::EntryFilter;
use crate::domain::potential::{CollectionPotential, EntryPotential};
use crate::domain::{Converter, Entry, StorageDriver, StorageError};
use crate::infrastructure::converting::driver::{ConvertingInner, WriteMode};
use crate::infrastructure::feed::FeedFilter;

/// Entry potential over a converting driver.
///
/// Reads and writes delegate to the owning driver, so identity preservation
/// and echo suppression apply unchanged; subscriptions filter the driver's
/// domain-level change channel by id.
pub struct ConvertingEntryPotential<C, S>
where
    C: Converter,
    S: StorageDriver<C::Record>,
{
    id: String,
    inner: Arc<ConvertingInner<C, S>>,
}

impl<C, S> ConvertingEntryPotential<C, S>
where
    C: Converter,
    S: StorageDriver<C::Record>,
{
    pub(crate) fn new(id: String, inner: Arc<ConvertingInner<C, S>>) -> Self {
        Self { id, inner }
    }
}

#[async_trait]
impl<C, S> EntryPotential<Arc<C::Domain>> for ConvertingEntryPotential<C, S>
where
    C: Converter,
    S: StorageDriver<C::Record> + 'static,
{
    async fn fetch(&self) -> Result<Option<Arc<C::Domain>>, StorageError> {
        self.inner.fetch_entry(&self.id).await
    }

    async fn update(&self, entry: Arc<C::Domain>) -> Result<(), StorageError> {
        if entry.id() != self.id {
            return Err(StorageError::validation(format!(
                "Entry id '{}' does not match potential id '{}'",
                entry.id(),
                self.id
            )));
        }
        self.inner.write_through(entry, WriteMode::Update).await
    }

    async fn delete(&self) -> Result<(), StorageError> {
        self.inner.remove(DeleteTarget::ById(self.id.clone())).await
    }

    fn subscribe(&self) -> ChangeStream<Arc<C::Domain>> {
        self.inner.subscribe(FeedFilter::Id(self.id.clone()))
    }
}

/// Collection potential over a converting driver.
///
/// `all()` delegates to the driver's filtered find (records are filtered
/// backend-side); subscriptions filter the domain-level change channel, so
/// the filter must be meaningful on the domain shape as well.
pub struct ConvertingCollectionPotential<C, S>
where
    C: Converter,
    S: StorageDriver<C::Record>,
{
    filter: Option<S::Filter>,
    inner: Arc<ConvertingInner<C, S>>,
}

impl<C, S> ConvertingCollectionPotential<C, S>
where
    C: Converter,
    S: StorageDriver<C::Record>,
{
    pub(crate) fn new(filter: Option<S::Filter>, inner: Arc<ConvertingInner<C, S>>) -> Self {
        Self { filter, inner }
    }
}

#[async_trait]
impl<C, S> CollectionPotential<Arc<C::Domain>> for ConvertingCollectionPotential<C, S>
where
    C: Converter,
    S: StorageDriver<C::Record> + 'static,
    S::Filter: EntryFilter<Arc<C::Domain>>,
{
    async fn all(&self) -> Result<Vec<Arc<C::Domain>>, StorageError> {
        self.inner.find_entries(self.filter.as_ref()).await
    }

    fn subscribe(&self) -> ChangeStream<Arc<C::Domain>> {
        match self.filter.clone() {
            Some(filter) => self.inner.subscribe(FeedFilter::Where(Arc::new(
                move |entry: &Arc<C::Domain>| filter.matches(entry),
            ))),
            None => self.inner.subscribe(FeedFilter::All),
        }
    }
}
