//! Errors raised while folding events into state.

/// Errors raised by [`crate::reducer::Reducer::apply`] and the replay runner.
#[derive(Debug, thiserror::Error)]
pub enum ReducerError {
    /// Strict mode encountered a wire event-type tag with no registered
    /// handler. Mirrors the original `InvalidTransitionError`.
    #[error("no handler for event type: {0}")]
    NoHandler(String),

    /// A handler's input or output could not be converted to/from the
    /// aggregate's `serde_json::Value` representation.
    #[error("state conversion error: {0}")]
    Conversion(#[from] serde_json::Error),

    /// The underlying event store returned an error while replay was reading
    /// events.
    #[error("event store error during replay: {0}")]
    Store(#[from] rynxs_store_core::error::EventStoreError),

    /// A canonical-encoding error was raised while hashing state.
    #[error("canonical encoding error: {0}")]
    Codec(#[from] rynxs_types::canonical::CodecError),
}
