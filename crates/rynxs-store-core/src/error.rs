//! Error taxonomy shared by every `EventStore` backend.

/// Errors raised by an [`crate::EventStore`] implementation.
///
/// This is deliberately backend-agnostic: `rynxs-store-file` and
/// `rynxs-store-s3` both map their own I/O/SDK errors into this enum so
/// callers (the reducer, the CLI, the executor) never need to know which
/// backend they're talking to.
#[derive(Debug, thiserror::Error)]
pub enum EventStoreError {
    /// A compare-and-swap append observed a different `prev_hash` than the
    /// one the caller expected.
    #[error("append conflict: expected prev_hash {expected}, observed {actual}")]
    Conflict {
        /// The hash the caller expected the chain tip to be at.
        expected: String,
        /// The hash the store actually observed at append time.
        actual: String,
    },

    /// `append_with_retry` exhausted its retry budget without succeeding.
    #[error("append_with_retry exhausted {attempts} attempts")]
    RetriesExhausted {
        /// Number of attempts made before giving up.
        attempts: u32,
    },

    /// A log record's stored hash did not match its recomputed hash, or a
    /// `hash_version` mismatch was detected between an event and the log's
    /// declared version.
    #[error("hash chain integrity violation: {0}")]
    Integrity(String),

    /// Underlying I/O failure (file, object-store transport, etc).
    #[error("storage I/O error: {0}")]
    Io(String),

    /// A record could not be encoded/decoded as canonical JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store was misconfigured (bad env var, missing bucket, unwritable
    /// path, ...).
    #[error("storage configuration error: {0}")]
    Config(String),

    /// A requested sequence number does not exist in the log.
    #[error("no event at seq {0}")]
    NotFound(u64),
}

impl From<std::io::Error> for EventStoreError {
    fn from(err: std::io::Error) -> Self {
        EventStoreError::Io(err.to_string())
    }
}
