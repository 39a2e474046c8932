//! Signed, periodic snapshots of folded reducer state.
//!
//! A checkpoint lets replay skip straight to the nearest prior snapshot
//! instead of folding an entire event log from `seq` 0, and its Ed25519
//! signature lets a verifier distinguish a checkpoint this engine actually
//! produced from one an attacker fabricated to short-circuit replay onto a
//! forged state.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod model;
pub mod signer;
pub mod snapshot;
pub mod store;
pub mod verify;

pub use error::CheckpointError;
pub use model::Checkpoint;
pub use signer::{ensure_keypair, get_default_key_path, SigningKey, VerifyingKey};
pub use snapshot::{compute_state_hash, serialize_state, state_from_base64, state_to_base64};
pub use store::CheckpointStore;
pub use verify::{verify_checkpoint, verify_full, verify_signature, VerificationResult};
