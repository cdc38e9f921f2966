//! Change notification payloads and streams

use tokio::sync::broadcast;

use crate::domain::Entry;

/// A change observed on a driver.
///
/// `Updated` covers both insert and update -- an insert is an update of a
/// previously absent id. `Deleted` carries the pre-deletion state.
#[derive(Debug, Clone)]
pub enum ChangeEvent<E> {
    /// A record was inserted or updated; `entry` is the post-write state
    Updated { entry: E },
    /// A record was removed; `entry` is the pre-deletion state
    Deleted { entry: E },
}

impl<E: Entry> ChangeEvent<E> {
    /// The entry carried by this event
    pub fn entry(&self) -> &E {
        match self {
            Self::Updated { entry } | Self::Deleted { entry } => entry,
        }
    }

    /// The id of the affected record
    pub fn entry_id(&self) -> &str {
        self.entry().id()
    }

    /// Returns `true` for insert/update events
    pub fn is_updated(&self) -> bool {
        matches!(self, Self::Updated { .. })
    }

    /// Returns `true` for delete events
    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted { .. })
    }
}

/// A receiver of change events for one subscription.
///
/// Dropping the stream ends the subscription; the feed prunes closed
/// subscribers on the next emission.
pub type ChangeStream<E> = broadcast::Receiver<ChangeEvent<E>>;
