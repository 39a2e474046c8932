//! Serializing/deserializing folded [`State`] for checkpoint storage.
//!
//! Grounded in `engine/checkpoint/snapshot.py`.

use crate::error::CheckpointError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rynxs_reducer::{state_hash, State};

/// Canonical JSON bytes of `state`, the form persisted (base64-encoded)
/// inside a [`crate::Checkpoint::state_bytes`].
pub fn serialize_state(state: &State) -> Result<Vec<u8>, CheckpointError> {
    Ok(state.canonical_bytes()?)
}

/// `SHA-256(canonical_json(state))`, hex-encoded. Delegates to
/// [`rynxs_reducer::state_hash`] so the checkpoint's notion of state hash
/// never drifts from the reducer's own.
pub fn compute_state_hash(state: &State) -> Result<String, CheckpointError> {
    Ok(state_hash(state)?)
}

/// Base64-encode `state`'s canonical JSON bytes.
pub fn state_to_base64(state: &State) -> Result<String, CheckpointError> {
    Ok(BASE64.encode(serialize_state(state)?))
}

/// Decode and parse a base64-encoded canonical-JSON state snapshot.
pub fn state_from_base64(b64: &str) -> Result<State, CheckpointError> {
    let bytes = BASE64.decode(b64)?;
    let value: serde_json::Value = serde_json::from_slice(&bytes)?;
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn base64_round_trip_preserves_state() {
        let state = State::initial().with_agg("universe", json!({"x": 1}));
        let encoded = state_to_base64(&state).unwrap();
        let decoded = state_from_base64(&encoded).unwrap();
        assert_eq!(state, decoded);
    }

    #[test]
    fn compute_state_hash_matches_reducer_state_hash() {
        let state = State::initial().with_agg("universe", json!({"x": 1}));
        assert_eq!(
            compute_state_hash(&state).unwrap(),
            state_hash(&state).unwrap()
        );
    }

    #[test]
    fn differing_key_order_hashes_identically() {
        let a = State::initial().with_agg("universe", json!({"x": 1, "y": 2}));
        let b = State::initial().with_agg("universe", json!({"y": 2, "x": 1}));
        assert_eq!(compute_state_hash(&a).unwrap(), compute_state_hash(&b).unwrap());
    }
}
