//! Error taxonomy for the executor and the external resource API boundary.

/// A raw error surfaced by a [`crate::resource_api::ResourceApi`]
/// implementation. Mirrors the fields a Kubernetes `ApiException` carries
/// (`status`, `reason`), generalized so a non-Kubernetes backend can still
/// report something structured.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApiError {
    /// The raised error's type name (`"ApiException"`, `"ConnectionError"`, ...).
    pub kind: String,
    /// HTTP-style status code, if the backend has one.
    pub status: Option<i64>,
    /// Human-readable reason string, if the backend has one.
    pub reason: Option<String>,
}

impl ApiError {
    /// Build an `ApiError` carrying an HTTP-style status.
    pub fn with_status(kind: impl Into<String>, status: i64, reason: impl Into<String>) -> Self {
        ApiError {
            kind: kind.into(),
            status: Some(status),
            reason: Some(reason.into()),
        }
    }

    /// Build an `ApiError` with no further structure (connection failures,
    /// serialization errors at the backend boundary, ...).
    pub fn opaque(kind: impl Into<String>) -> Self {
        ApiError {
            kind: kind.into(),
            status: None,
            reason: None,
        }
    }
}

/// A deterministic, replay-safe error payload derived from an [`ApiError`].
///
/// Never embeds raw exception strings or stack traces in the event
/// payload — only the classifier fields below, which are themselves
/// derived purely from `status`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StableError {
    /// The originating error's type tag.
    pub kind: String,
    /// The stable taxonomy code (`K8S_NOT_FOUND`, `UNKNOWN`, ...).
    pub code: String,
    /// HTTP-style status, if available.
    pub status: Option<i64>,
    /// Human-readable reason, if available.
    pub reason: Option<String>,
}

/// Classify `err` into a [`StableError`] using the same status-code mapping
/// as the original `ExecutorLayer._stable_error`.
pub fn stable_error(err: &ApiError) -> StableError {
    let code = match err.status {
        Some(404) => "K8S_NOT_FOUND",
        Some(409) => "K8S_CONFLICT",
        Some(403) => "K8S_FORBIDDEN",
        Some(401) => "K8S_UNAUTHORIZED",
        Some(422) => "K8S_INVALID",
        Some(status) if status >= 500 => "K8S_SERVER_ERROR",
        Some(_) => "K8S_ERROR",
        None => "UNKNOWN",
    };

    StableError {
        kind: err.kind.clone(),
        code: code.to_string(),
        status: err.status,
        reason: err.reason.clone(),
    }
}

/// Errors raised by [`crate::executor::ExecutorLayer::apply`] itself (as
/// opposed to per-action `ApiError`s, which are captured into feedback
/// events rather than propagated).
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// The event store rejected a feedback-event append.
    #[error("failed to append feedback event: {0}")]
    Store(#[from] rynxs_store_core::error::EventStoreError),

    /// Canonical encoding failed while computing a desired/observed hash.
    #[error("canonical encoding error: {0}")]
    Codec(#[from] rynxs_types::canonical::CodecError),
}
