//! Segmented, advisory-locked JSONL event store.
//!
//! Grounded in the original engine's `engine/log/file_store.py`: one active
//! append-only file plus rotated segment files, a small head-cache file
//! recording `{last_seq, last_hash, segment_index}`, and an OS-level
//! exclusive lock (`fcntl.flock` there, [`fs2::FileExt`] here) held for the
//! duration of each append so multiple writer processes can share a log
//! file safely.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod config;
mod segments;
mod store;

pub use config::FileStoreConfig;
pub use store::FileEventStore;
