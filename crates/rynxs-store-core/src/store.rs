//! The `EventStore` trait and its default CAS-retry helper.

use crate::error::EventStoreError;
use async_trait::async_trait;
use rynxs_events::Event;
use tracing::warn;

/// Maximum number of CAS attempts `append_with_retry`'s default
/// implementation makes before giving up, matching the original engine's
/// retry budget for the append-with-retry helper.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// The outcome of a successful (or observably conflicting) append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendResult {
    /// The event as committed, with `seq` populated.
    pub event: Event,
    /// The sequence number assigned to `event`.
    pub seq: u64,
    /// The resulting hash-chain tip after this append.
    pub event_hash: String,
    /// The hash-chain tip immediately before this append.
    pub prev_hash: String,
    /// Whether the append was actually committed (always `true` for a
    /// successful `append`; `append_with_retry` never returns a result with
    /// this `false` — it retries until committed or out of attempts).
    pub committed: bool,
    /// Whether a conflict was observed before this append succeeded.
    pub conflict: bool,
    /// The `prev_hash` actually observed at the chain tip, if it differed
    /// from what the caller expected.
    pub observed_prev_hash: Option<String>,
}

/// Append-only, hash-chained event storage.
///
/// Implementations must guarantee: events are assigned strictly increasing
/// `seq` values starting at 0; `append` with `expected_prev_hash: Some(h)`
/// fails with [`EventStoreError::Conflict`] if the chain tip is not `h`;
/// `read` returns events in `seq` order.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append `event` to the log. If `expected_prev_hash` is `Some`, the
    /// append is a compare-and-swap against the current chain tip.
    async fn append(
        &self,
        event: Event,
        expected_prev_hash: Option<&str>,
    ) -> Result<AppendResult, EventStoreError>;

    /// Read events with `seq >= from_seq`, optionally filtered to a single
    /// aggregate.
    async fn read(
        &self,
        aggregate_id: Option<&str>,
        from_seq: u64,
    ) -> Result<Vec<Event>, EventStoreError>;

    /// The hash at the current chain tip (`ZERO_HASH` for an empty log).
    async fn get_last_hash(&self) -> Result<String, EventStoreError>;

    /// The hash recorded for the event at `seq`, if any.
    async fn get_event_hash(&self, seq: u64) -> Result<Option<String>, EventStoreError>;

    /// Append `event`, retrying against the observed chain tip whenever a
    /// concurrent writer wins the race, up to [`DEFAULT_MAX_RETRIES`]
    /// attempts.
    ///
    /// This is provided as a default method (rather than per-backend) since
    /// the retry policy is a pure function of `append`'s CAS contract and
    /// does not depend on backend internals.
    async fn append_with_retry(&self, event: Event) -> Result<AppendResult, EventStoreError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let expected = self.get_last_hash().await?;
            match self.append(event.clone(), Some(&expected)).await {
                Ok(result) => return Ok(result),
                Err(EventStoreError::Conflict { expected, actual }) => {
                    warn!(attempt, expected, actual, "append conflict, retrying");
                    if attempt >= DEFAULT_MAX_RETRIES {
                        return Err(EventStoreError::RetriesExhausted { attempts: attempt });
                    }
                    continue;
                }
                Err(other) => return Err(other),
            }
        }
    }
}
