//! Converting infrastructure - Conversion, identity caching, and echo-free
//! re-publication of backend changes

mod driver;
mod echo;
mod potential;

pub use driver::ConvertingDriver;
pub use potential::{ConvertingCollectionPotential, ConvertingEntryPotential};
