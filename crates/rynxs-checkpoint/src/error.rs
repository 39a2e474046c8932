//! Error taxonomy for checkpoint creation, persistence, and verification.

use rynxs_types::canonical::CodecError;

/// Errors raised while building, signing, persisting, or verifying a
/// checkpoint.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Canonical encoding failed.
    #[error("canonical encoding error: {0}")]
    Codec(#[from] CodecError),

    /// JSON (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Base64 decoding of `state_bytes` or a signature failed.
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Underlying filesystem I/O failed.
    #[error("checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Reading/writing a key or a signing/verification operation failed.
    #[error("signature error: {0}")]
    Signature(String),

    /// `verify_checkpoint` was called with `mode: "full"` but no store and
    /// reducer were supplied to replay against.
    #[error("full verification requires a store and a reducer")]
    MissingReplayContext,

    /// `verify_checkpoint` was called with an unrecognized `mode`.
    #[error("unknown verification mode: {0}")]
    UnknownMode(String),

    /// `CheckpointStore::load` found a filename that did not match the
    /// expected `cp_<event_index>_<hash8>.json` pattern.
    #[error("malformed checkpoint filename: {0}")]
    MalformedFilename(String),

    /// A replay performed during full verification failed.
    #[error("replay error during verification: {0}")]
    Replay(#[from] rynxs_reducer::ReducerError),
}
