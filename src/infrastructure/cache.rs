//! Identity cache for domain objects

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::domain::Entry;

/// Identity cache mapping id to a previously constructed domain object.
///
/// Used by the converting driver so entities are not reconstructed on every
/// fetch: while an id is cached, every fetch returns the same `Arc` handle
/// until that id is invalidated. There is no eviction policy -- this is an
/// identity cache, not a bounded LRU; invalidation correctness is the
/// owner's responsibility. One cache instance belongs to at most one driver
/// for its lifetime.
pub struct EntryCache<T> {
    entries: RwLock<HashMap<String, Arc<T>>>,
}

impl<T: Entry> EntryCache<T> {
    /// Creates an empty cache
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the cached handle for an id, if present
    pub fn get(&self, id: &str) -> Option<Arc<T>> {
        self.entries
            .read()
            .expect("cache lock poisoned")
            .get(id)
            .cloned()
    }

    /// Stores a handle, keyed by the entry's id, replacing any prior value
    pub fn store(&self, entry: Arc<T>) {
        self.entries
            .write()
            .expect("cache lock poisoned")
            .insert(entry.id().to_string(), entry);
    }

    /// Removes the entry for an id; a no-op when absent
    pub fn invalidate(&self, id: &str) {
        self.entries
            .write()
            .expect("cache lock poisoned")
            .remove(id);
    }

    /// Removes all entries
    pub fn clear(&self) {
        self.entries.write().expect("cache lock poisoned").clear();
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries.read().expect("cache lock poisoned").len()
    }

    /// Returns `true` if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("cache lock poisoned").is_empty()
    }
}

impl<T: Entry> Default for EntryCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entry> fmt::Debug for EntryCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryCache")
            .field("entry_count", &self.len())
            .finish()
    }
}
