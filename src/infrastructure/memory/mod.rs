//! Memory infrastructure - In-memory reference driver

mod driver;
mod potential;

pub use driver::MemoryDriver;
pub use potential::{MemoryCollectionPotential, MemoryEntryPotential};
