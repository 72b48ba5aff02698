//! Destination store abstraction
//!
//! The trait lets the engine run against Google Drive in production and
//! against an in-memory folder map in tests.

mod memory;
mod traits;

pub use memory::InMemoryObjectStore;
pub use traits::ObjectStore;
