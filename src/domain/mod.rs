//! Domain layer - Contracts shared by every storage backend

pub mod convert;
pub mod driver;
pub mod entry;
pub mod error;
pub mod event;
pub mod filter;
pub mod potential;

pub use convert::Converter;
pub use driver::StorageDriver;
pub use entry::{DeleteTarget, Entry};
pub use error::StorageError;
pub use event::{ChangeEvent, ChangeStream};
pub use filter::{EntryFilter, FieldFilter};
pub use potential::{CollectionPotential, EntryPotential};
