//! Conversion seam between raw records and domain objects

use async_trait::async_trait;

use crate::domain::{Entry, StorageError};

/// Bidirectional conversion between a backend-native record shape and an
/// application-native domain shape.
///
/// Supplied by the integrator. The pair must agree on ids: wrapping a record
/// and reading the id back yields the record's id. Round-tripping is not
/// required to be lossless on any other field.
///
/// Either direction may fail (e.g. a record that cannot be interpreted);
/// failures propagate to the caller unmodified, with no retry and no partial
/// cache or backend mutation.
#[async_trait]
pub trait Converter: Send + Sync + 'static {
    /// The application-native shape
    type Domain: Entry;
    /// The backend-native shape
    type Record: Entry;

    /// Build a domain object from a raw record
    async fn wrap(&self, record: Self::Record) -> Result<Self::Domain, StorageError>;

    /// Reduce a domain object to its raw record
    async fn process(&self, entry: &Self::Domain) -> Result<Self::Record, StorageError>;
}
