//! Stowage
//!
//! A storage abstraction layer that lets application code manipulate domain
//! entities while staying agnostic of the backing store, with support for:
//! - A generic async driver contract over any entry type ([`StorageDriver`])
//! - Bidirectional conversion between backend records and domain objects
//!   with identity caching ([`ConvertingDriver`], [`EntryCache`])
//! - Live observation of single entries and filtered collections without
//!   polling ([`EntryPotential`], [`CollectionPotential`])
//! - An in-memory reference backend ([`MemoryDriver`])

pub mod domain;
pub mod infrastructure;
pub mod sack;

pub use domain::{
    ChangeEvent, ChangeStream, CollectionPotential, Converter, DeleteTarget, Entry, EntryFilter,
    EntryPotential, FieldFilter, StorageDriver, StorageError,
};
pub use infrastructure::{
    ChangeFeed, ConvertingDriver, DriverConfig, EntryCache, FeedFilter, MemoryDriver,
};
pub use sack::{Sack, StoreMode};
