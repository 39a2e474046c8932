//! The storage abstraction every backend (`rynxs-store-file`, `rynxs-store-s3`)
//! implements, plus an in-memory backend used by the rest of the workspace's
//! test suites.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod memory;
pub mod store;

pub use error::EventStoreError;
pub use memory::MemoryEventStore;
pub use store::{AppendResult, EventStore};
