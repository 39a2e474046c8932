//! Error taxonomy for the audit verification tools.

use rynxs_types::canonical::CodecError;

/// Errors raised while verifying pointers or assembling a decision proof.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// Reading from the event log failed.
    #[error("event store error: {0}")]
    Store(#[from] rynxs_store_core::error::EventStoreError),

    /// Loading or verifying a checkpoint failed.
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] rynxs_checkpoint::CheckpointError),

    /// Canonical encoding failed.
    #[error("canonical encoding error: {0}")]
    Codec(#[from] CodecError),
}
