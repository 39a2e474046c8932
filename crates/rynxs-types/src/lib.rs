//! Canonical JSON encoding and stable identifier helpers.
//!
//! This crate has no knowledge of events, stores, or the decision layer; it
//! provides the one primitive every other `rynxs-*` crate hashes against:
//! a byte-for-byte deterministic rendering of a `serde_json::Value`.
//!
//! The rules mirror the original engine's `canonicalize`/`canonical_json_bytes`
//! pair: object keys are sorted, whitespace is stripped, and numbers must be
//! integral (no floats survive into a hash-critical path).

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod canonical;
pub mod ids;

pub use canonical::{canonical_bytes, canonical_string, canonicalize, CodecError};
pub use ids::stable_id;
