//! S3-compatible object-store backend for the event log: one object per
//! event, keyed so lexicographic listing order equals `seq` order.
//!
//! Grounded in the original engine's `engine/log/s3_store.py`: conditional
//! `PutObject` (`If-None-Match: *`) in place of `flock`, a best-effort
//! `_head.json` cache, and the same chain-validating `read`. The file and
//! object-store backends MUST produce identical event hashes for identical
//! input (§9 of the spec) — this crate reuses `rynxs-events::integrity`
//! unchanged, so the only divergence from `rynxs-store-file` is physical
//! layout.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod config;
mod store;

pub use config::S3StoreConfig;
pub use store::S3EventStore;
