//! Converting storage driver implementation

use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::entry::DeleteTarget;
use crate::domain::event::{ChangeEvent, ChangeStream};
use crate::domain::filter::EntryFilter;
use crate::domain::potential::{CollectionPotential, EntryPotential};
use crate::domain::{Converter, Entry, StorageDriver, StorageError};
use crate::infrastructure::cache::EntryCache;
use crate::infrastructure::converting::echo::EchoLedger;
use crate::infrastructure::converting::potential::{
    ConvertingCollectionPotential, ConvertingEntryPotential,
};
use crate::infrastructure::feed::{ChangeFeed, DriverConfig, FeedFilter};

/// Which backend write a write-through resolves to.
#[derive(Debug, Clone, Copy)]
pub(crate) enum WriteMode {
    Insert,
    Update,
}

/// Driver that wraps another driver to convert between application-space
/// domain objects and backend-space records.
///
/// Useful when application code works with rich types while the backend
/// speaks plain serializable records. The driver:
///
/// - converts in both directions through an integrator-supplied [`Converter`]
/// - hands out `Arc` handles and, when configured with an [`EntryCache`],
///   returns the same handle for the same id until it is invalidated
/// - re-publishes the backend's change events as domain-level events,
///   suppressing the echoes of its own writes so one logical change is
///   announced exactly once
///
/// Every mutation synthesizes its own domain notification after the backend
/// call settles; the corresponding backend echo is consumed silently by the
/// standing handler. Deleting an id the backend does not hold is a silent
/// no-op with no notification.
pub struct ConvertingDriver<C, S>
where
    C: Converter,
    S: StorageDriver<C::Record>,
{
    inner: Arc<ConvertingInner<C, S>>,
    handler: Mutex<Option<JoinHandle<()>>>,
}

pub(crate) struct ConvertingInner<C, S>
where
    C: Converter,
    S: StorageDriver<C::Record>,
{
    backend: S,
    converter: C,
    cache: Option<EntryCache<C::Domain>>,
    feed: ChangeFeed<Arc<C::Domain>>,
    echoes: EchoLedger,
}

impl<C, S> ConvertingInner<C, S>
where
    C: Converter,
    S: StorageDriver<C::Record>,
{
    fn cached(&self, id: &str) -> Option<Arc<C::Domain>> {
        self.cache.as_ref().and_then(|cache| cache.get(id))
    }

    /// Single chokepoint turning records into domain handles.
    ///
    /// A cache hit short-circuits the conversion and preserves identity;
    /// every read path must come through here rather than calling `wrap`
    /// directly.
    pub(crate) async fn obtain(
        &self,
        record: C::Record,
    ) -> Result<Arc<C::Domain>, StorageError> {
        if let Some(hit) = self.cached(record.id()) {
            return Ok(hit);
        }
        let entry = Arc::new(self.converter.wrap(record).await?);
        if let Some(cache) = &self.cache {
            cache.store(Arc::clone(&entry));
        }
        Ok(entry)
    }

    pub(crate) async fn fetch_entry(
        &self,
        id: &str,
    ) -> Result<Option<Arc<C::Domain>>, StorageError> {
        if let Some(hit) = self.cached(id) {
            return Ok(Some(hit));
        }
        match self.backend.fetch(id).await? {
            Some(record) => Ok(Some(self.obtain(record).await?)),
            None => Ok(None),
        }
    }

    pub(crate) async fn find_entries(
        &self,
        filter: Option<&S::Filter>,
    ) -> Result<Vec<Arc<C::Domain>>, StorageError> {
        let records = self.backend.find(filter).await?;
        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            entries.push(self.obtain(record).await?);
        }
        Ok(entries)
    }

    /// Write one domain object through to the backend.
    ///
    /// Conversion failure mutates nothing. The cache is updated eagerly,
    /// before the backend confirms. The expected-echo claim is revoked on
    /// backend failure, so a failed write never leaves suppression armed.
    pub(crate) async fn write_through(
        &self,
        entry: Arc<C::Domain>,
        mode: WriteMode,
    ) -> Result<(), StorageError> {
        let record = self.converter.process(&entry).await?;
        if let Some(cache) = &self.cache {
            cache.store(Arc::clone(&entry));
        }

        let claim = self.echoes.expect(entry.id());
        match mode {
            WriteMode::Insert => self.backend.insert(record).await?,
            WriteMode::Update => self.backend.update(record).await?,
        }
        claim.keep();

        debug!(id = %entry.id(), ?mode, "write stored");
        self.feed.emit(&ChangeEvent::Updated { entry });
        Ok(())
    }

    pub(crate) async fn write_through_collection(
        &self,
        entries: Vec<Arc<C::Domain>>,
        mode: WriteMode,
    ) -> Result<(), StorageError> {
        // Convert the whole batch first: a conversion failure anywhere
        // leaves cache and backend untouched.
        let mut records = Vec::with_capacity(entries.len());
        for entry in &entries {
            records.push(self.converter.process(entry).await?);
        }

        if let Some(cache) = &self.cache {
            for entry in &entries {
                cache.store(Arc::clone(entry));
            }
        }

        let mut claims = Vec::with_capacity(entries.len());
        for entry in &entries {
            claims.push(self.echoes.expect(entry.id()));
        }
        match mode {
            WriteMode::Insert => self.backend.insert_collection(records).await?,
            WriteMode::Update => self.backend.update_collection(records).await?,
        }
        for claim in claims {
            claim.keep();
        }

        // One notification per element, never one per batch, so per-entry
        // observers stay correct.
        for entry in entries {
            self.feed.emit(&ChangeEvent::Updated { entry });
        }
        Ok(())
    }

    pub(crate) async fn remove(
        &self,
        target: DeleteTarget<Arc<C::Domain>>,
    ) -> Result<(), StorageError> {
        let id = target.id().to_string();
        let known = match target {
            DeleteTarget::ByEntry(entry) => Some(entry),
            DeleteTarget::ById(_) => None,
        };

        // The pre-deletion state is needed for the notification and for
        // knowing whether the backend will echo the delete at all.
        let record = self.backend.fetch(&id).await?;
        let present = record.is_some();
        let representation = if present {
            match known {
                Some(entry) => Some(entry),
                None => match self.obtain(record.expect("checked present")).await {
                    Ok(entry) => Some(entry),
                    Err(error) => {
                        warn!(id = %id, %error, "deleting entry whose record cannot be wrapped");
                        None
                    }
                },
            }
        } else {
            None
        };

        let claim = present.then(|| self.echoes.expect(&id));
        self.backend.delete(DeleteTarget::ById(id.clone())).await?;
        if let Some(claim) = claim {
            claim.keep();
        }

        if let Some(cache) = &self.cache {
            cache.invalidate(&id);
        }
        if let Some(entry) = representation {
            debug!(id = %id, "entry deleted");
            self.feed.emit(&ChangeEvent::Deleted { entry });
        }
        Ok(())
    }

    pub(crate) async fn remove_collection(
        &self,
        targets: Vec<DeleteTarget<Arc<C::Domain>>>,
    ) -> Result<(), StorageError> {
        if targets.is_empty() {
            return Ok(());
        }

        let mut resolved = Vec::with_capacity(targets.len());
        for target in targets {
            let id = target.id().to_string();
            let known = match target {
                DeleteTarget::ByEntry(entry) => Some(entry),
                DeleteTarget::ById(_) => None,
            };
            let record = self.backend.fetch(&id).await?;
            let present = record.is_some();
            let representation = if present {
                match known {
                    Some(entry) => Some(entry),
                    None => self.obtain(record.expect("checked present")).await.ok(),
                }
            } else {
                None
            };
            resolved.push((id, present, representation));
        }

        let mut claims = Vec::new();
        for (id, present, _) in &resolved {
            if *present {
                claims.push(self.echoes.expect(id));
            }
        }
        let ids = resolved
            .iter()
            .map(|(id, _, _)| DeleteTarget::ById(id.clone()))
            .collect();
        self.backend.delete_collection(ids).await?;
        for claim in claims {
            claim.keep();
        }

        for (id, _, representation) in resolved {
            if let Some(cache) = &self.cache {
                cache.invalidate(&id);
            }
            if let Some(entry) = representation {
                self.feed.emit(&ChangeEvent::Deleted { entry });
            }
        }
        Ok(())
    }

    pub(crate) fn subscribe(
        &self,
        filter: FeedFilter<Arc<C::Domain>>,
    ) -> ChangeStream<Arc<C::Domain>> {
        self.feed.subscribe(filter)
    }
}

/// Standing handler translating backend change events into domain events.
///
/// Runs for the lifetime of the owning driver. Self-originated echoes are
/// consumed from the ledger; external changes invalidate the cache and are
/// re-published at domain level. Events whose records cannot be converted
/// are dropped with a warning rather than poisoning the stream.
async fn translate_backend_changes<C, S>(
    inner: Arc<ConvertingInner<C, S>>,
    mut changes: ChangeStream<C::Record>,
) where
    C: Converter,
    S: StorageDriver<C::Record>,
{
    loop {
        match changes.recv().await {
            Ok(ChangeEvent::Updated { entry: record }) => {
                let id = record.id().to_string();
                if inner.echoes.consume(&id) {
                    debug!(id = %id, "suppressed own update echo");
                    continue;
                }
                // The record changed behind our back: the cached identity is
                // stale and must go before the rebuild.
                if let Some(cache) = &inner.cache {
                    cache.invalidate(&id);
                }
                match inner.obtain(record).await {
                    Ok(entry) => inner.feed.emit(&ChangeEvent::Updated { entry }),
                    Err(error) => warn!(id = %id, %error, "dropping unconvertible update event"),
                }
            }
            Ok(ChangeEvent::Deleted { entry: record }) => {
                let id = record.id().to_string();
                if inner.echoes.consume(&id) {
                    debug!(id = %id, "suppressed own delete echo");
                    continue;
                }
                // The raw data is gone once this event is handled; build the
                // domain representation first, then drop the cache entry.
                let converted = inner.obtain(record).await;
                if let Some(cache) = &inner.cache {
                    cache.invalidate(&id);
                }
                match converted {
                    Ok(entry) => inner.feed.emit(&ChangeEvent::Deleted { entry }),
                    Err(error) => warn!(id = %id, %error, "dropping unconvertible delete event"),
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "backend change stream lagged; events dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

impl<C, S> ConvertingDriver<C, S>
where
    C: Converter,
    S: StorageDriver<C::Record> + 'static,
{
    /// Creates a driver without an identity cache: every read constructs a
    /// fresh domain object.
    pub fn new(backend: S, converter: C) -> Self {
        Self::with_parts(backend, converter, None, DriverConfig::default())
    }

    /// Creates a driver that preserves domain-object identity through the
    /// given cache.
    pub fn with_cache(backend: S, converter: C, cache: EntryCache<C::Domain>) -> Self {
        Self::with_parts(backend, converter, Some(cache), DriverConfig::default())
    }

    /// Creates a driver from all its parts.
    pub fn with_parts(
        backend: S,
        converter: C,
        cache: Option<EntryCache<C::Domain>>,
        config: DriverConfig,
    ) -> Self {
        let changes = backend.changes();
        let inner = Arc::new(ConvertingInner {
            backend,
            converter,
            cache,
            feed: ChangeFeed::new(config.channel_capacity),
            echoes: EchoLedger::new(),
        });
        let handler = tokio::spawn(translate_backend_changes(Arc::clone(&inner), changes));
        Self {
            inner,
            handler: Mutex::new(Some(handler)),
        }
    }
}

impl<C, S> ConvertingDriver<C, S>
where
    C: Converter,
    S: StorageDriver<C::Record>,
{
    fn abort_handler(&self) {
        if let Ok(mut guard) = self.handler.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

impl<C, S> Drop for ConvertingDriver<C, S>
where
    C: Converter,
    S: StorageDriver<C::Record>,
{
    fn drop(&mut self) {
        self.abort_handler();
    }
}

impl<C, S> fmt::Debug for ConvertingDriver<C, S>
where
    C: Converter,
    S: StorageDriver<C::Record>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvertingDriver")
            .field("backend", &self.inner.backend)
            .field("cached", &self.inner.cache.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<C, S> StorageDriver<Arc<C::Domain>> for ConvertingDriver<C, S>
where
    C: Converter,
    S: StorageDriver<C::Record> + 'static,
    S::Filter: EntryFilter<Arc<C::Domain>>,
{
    type Filter = S::Filter;

    async fn fetch(&self, id: &str) -> Result<Option<Arc<C::Domain>>, StorageError> {
        self.inner.fetch_entry(id).await
    }

    async fn insert(&self, entry: Arc<C::Domain>) -> Result<(), StorageError> {
        self.inner.write_through(entry, WriteMode::Insert).await
    }

    async fn find(
        &self,
        filter: Option<&Self::Filter>,
    ) -> Result<Vec<Arc<C::Domain>>, StorageError> {
        self.inner.find_entries(filter).await
    }

    async fn update(&self, entry: Arc<C::Domain>) -> Result<(), StorageError> {
        self.inner.write_through(entry, WriteMode::Update).await
    }

    async fn delete(&self, target: DeleteTarget<Arc<C::Domain>>) -> Result<(), StorageError> {
        self.inner.remove(target).await
    }

    async fn insert_collection(
        &self,
        entries: Vec<Arc<C::Domain>>,
    ) -> Result<(), StorageError> {
        self.inner
            .write_through_collection(entries, WriteMode::Insert)
            .await
    }

    async fn update_collection(
        &self,
        entries: Vec<Arc<C::Domain>>,
    ) -> Result<(), StorageError> {
        self.inner
            .write_through_collection(entries, WriteMode::Update)
            .await
    }

    async fn delete_collection(
        &self,
        targets: Vec<DeleteTarget<Arc<C::Domain>>>,
    ) -> Result<(), StorageError> {
        self.inner.remove_collection(targets).await
    }

    fn entry_potential(&self, id: &str) -> Box<dyn EntryPotential<Arc<C::Domain>>> {
        Box::new(ConvertingEntryPotential::new(
            id.to_string(),
            Arc::clone(&self.inner),
        ))
    }

    fn collection_potential(
        &self,
        filter: Option<Self::Filter>,
    ) -> Box<dyn CollectionPotential<Arc<C::Domain>>> {
        Box::new(ConvertingCollectionPotential::new(
            filter,
            Arc::clone(&self.inner),
        ))
    }

    fn changes(&self) -> ChangeStream<Arc<C::Domain>> {
        self.inner.subscribe(FeedFilter::All)
    }

    async fn dispose(&self) -> Result<(), StorageError> {
        if let Some(cache) = &self.inner.cache {
            cache.clear();
        }
        self.abort_handler();
        self.inner.backend.dispose().await
    }
}
