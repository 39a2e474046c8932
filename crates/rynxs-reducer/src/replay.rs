//! Reconstructing state by folding a reducer over a stored event log.
//!
//! Grounded in `engine/replay/runner.py`.

use crate::error::ReducerError;
use crate::reducer::Reducer;
use crate::state::State;
use rynxs_store_core::EventStore;

/// The outcome of a replay run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayResult {
    /// The state after folding every event read.
    pub state: State,
    /// How many events were folded.
    pub applied_count: u64,
}

/// Replay every event in `store` (optionally restricted to `aggregate_id`,
/// and stopping at `to_seq` inclusive) through `reducer`, starting from the
/// empty state.
pub async fn replay(
    store: &dyn EventStore,
    reducer: &Reducer,
    aggregate_id: Option<&str>,
    to_seq: Option<u64>,
) -> Result<ReplayResult, ReducerError> {
    replay_from(store, reducer, State::initial(), aggregate_id, 0, to_seq).await
}

/// Replay starting from a prior `checkpoint_state` rather than the empty
/// state, reading only events with `seq >= from_seq`.
///
/// This is the checkpoint-accelerated path: a caller that has a signed
/// checkpoint at `seq = from_seq - 1` can skip re-folding every event since
/// the beginning of the log.
pub async fn replay_from(
    store: &dyn EventStore,
    reducer: &Reducer,
    checkpoint_state: State,
    aggregate_id: Option<&str>,
    from_seq: u64,
    to_seq: Option<u64>,
) -> Result<ReplayResult, ReducerError> {
    let events = store.read(aggregate_id, from_seq).await?;

    let mut state = checkpoint_state;
    let mut applied_count = 0u64;

    for event in events {
        if let Some(limit) = to_seq {
            if event.require_seq().unwrap_or(u64::MAX) > limit {
                break;
            }
        }
        state = reducer.apply(&state, &event)?;
        applied_count += 1;
    }

    Ok(ReplayResult { state, applied_count })
}
