//! Change feed - fan-out delivery of change events to filtered subscribers

use std::fmt;
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;
use tracing::warn;

use crate::domain::event::{ChangeEvent, ChangeStream};
use crate::domain::Entry;

/// Default capacity of per-subscriber channels
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Configuration shared by the drivers in this crate.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Capacity of per-subscriber change channels. A subscriber that falls
    /// further behind than this observes a lag, not lost emitter progress.
    pub channel_capacity: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl DriverConfig {
    /// Sets the per-subscriber channel capacity
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }
}

/// Subscription scope for a feed subscriber.
#[derive(Clone)]
pub enum FeedFilter<E> {
    /// Deliver every event
    All,
    /// Deliver only events whose entry has this id
    Id(String),
    /// Deliver only events whose entry satisfies the predicate
    Where(Arc<dyn Fn(&E) -> bool + Send + Sync>),
}

impl<E: Entry> FeedFilter<E> {
    fn matches(&self, event: &ChangeEvent<E>) -> bool {
        match self {
            Self::All => true,
            Self::Id(id) => event.entry_id() == id,
            Self::Where(predicate) => predicate(event.entry()),
        }
    }
}

impl<E> fmt::Debug for FeedFilter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "All"),
            Self::Id(id) => f.debug_tuple("Id").field(id).finish(),
            Self::Where(_) => write!(f, "Where(..)"),
        }
    }
}

/// One registered subscriber: a filter paired with a bounded channel.
struct FeedSubscriber<E> {
    filter: FeedFilter<E>,
    sender: broadcast::Sender<ChangeEvent<E>>,
}

/// Observer registry routing change events to filtered subscribers.
///
/// Each subscription owns its own bounded channel; emitting never blocks on
/// a slow subscriber. Subscribers whose receivers have all been dropped are
/// pruned during routing, so subscription lifetime is exactly the lifetime
/// of the returned stream.
pub struct ChangeFeed<E: Entry> {
    subscribers: RwLock<Vec<FeedSubscriber<E>>>,
    capacity: usize,
}

impl<E: Entry> ChangeFeed<E> {
    /// Creates a feed with the given per-subscriber channel capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    /// Register a new subscriber with the given filter.
    pub fn subscribe(&self, filter: FeedFilter<E>) -> ChangeStream<E> {
        let (sender, receiver) = broadcast::channel(self.capacity);
        self.subscribers
            .write()
            .expect("feed lock poisoned")
            .push(FeedSubscriber { filter, sender });
        receiver
    }

    /// Route an event to all matching subscribers, pruning closed ones.
    pub fn emit(&self, event: &ChangeEvent<E>) {
        let mut subscribers = self.subscribers.write().expect("feed lock poisoned");
        subscribers.retain(|subscriber| {
            if subscriber.filter.matches(event) {
                match subscriber.sender.send(event.clone()) {
                    Ok(_) => true,
                    // No receivers left: the subscription is gone.
                    Err(_) => false,
                }
            } else {
                subscriber.sender.receiver_count() > 0
            }
        });
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .expect("feed lock poisoned")
            .len()
    }
}

impl<E: Entry> Default for ChangeFeed<E> {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl<E: Entry> fmt::Debug for ChangeFeed<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("subscriber_count", &self.subscriber_count())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Receive the next event from a stream, skipping over lag.
///
/// Lag means the subscriber fell behind a bounded channel; the skipped
/// events are gone, which is logged, and delivery continues from the
/// oldest retained event.
pub async fn next_event<E: Entry>(stream: &mut ChangeStream<E>) -> Option<ChangeEvent<E>> {
    loop {
        match stream.recv().await {
            Ok(event) => return Some(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "change stream lagged; events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
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

    fn updated(id: &str, name: &str) -> ChangeEvent<TestEntry> {
        ChangeEvent::Updated {
            entry: entry(id, name),
        }
    }

    #[tokio::test]
    async fn test_subscribe_all_receives_everything() {
        let feed: ChangeFeed<TestEntry> = ChangeFeed::default();
        let mut stream = feed.subscribe(FeedFilter::All);

        feed.emit(&updated("1", "a"));
        feed.emit(&ChangeEvent::Deleted {
            entry: entry("2", "b"),
        });

        assert!(stream.try_recv().unwrap().is_updated());
        assert!(stream.try_recv().unwrap().is_deleted());
        assert!(stream.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_id_filter_only_matching_id() {
        let feed: ChangeFeed<TestEntry> = ChangeFeed::default();
        let mut stream = feed.subscribe(FeedFilter::Id("1".to_string()));

        feed.emit(&updated("2", "other"));
        feed.emit(&updated("1", "mine"));

        let event = stream.try_recv().unwrap();
        assert_eq!(event.entry_id(), "1");
        assert!(stream.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_predicate_filter() {
        let feed: ChangeFeed<TestEntry> = ChangeFeed::default();
        let mut stream = feed.subscribe(FeedFilter::Where(Arc::new(|e: &TestEntry| {
            e.name == "wanted"
        })));

        feed.emit(&updated("1", "unwanted"));
        feed.emit(&updated("2", "wanted"));

        assert_eq!(stream.try_recv().unwrap().entry_id(), "2");
        assert!(stream.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dropped_stream_is_pruned() {
        let feed: ChangeFeed<TestEntry> = ChangeFeed::default();
        let stream = feed.subscribe(FeedFilter::All);
        assert_eq!(feed.subscriber_count(), 1);

        drop(stream);
        feed.emit(&updated("1", "a"));
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_next_event_skips_lag() {
        let feed: ChangeFeed<TestEntry> = ChangeFeed::new(1);
        let mut stream = feed.subscribe(FeedFilter::All);

        feed.emit(&updated("1", "a"));
        feed.emit(&updated("2", "b"));

        // Capacity 1: the first event was overwritten; delivery resumes at
        // the most recent one.
        let event = next_event(&mut stream).await.unwrap();
        assert_eq!(event.entry_id(), "2");
    }
}
