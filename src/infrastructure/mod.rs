//! Infrastructure layer - Driver and observation implementations

pub mod cache;
pub mod converting;
pub mod feed;
pub mod memory;

pub use cache::EntryCache;
pub use converting::{ConvertingCollectionPotential, ConvertingDriver, ConvertingEntryPotential};
pub use feed::{ChangeFeed, DriverConfig, FeedFilter};
pub use memory::{MemoryCollectionPotential, MemoryDriver, MemoryEntryPotential};
