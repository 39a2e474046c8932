//! Checking a checkpoint's signature and, optionally, its consistency with
//! the event log it claims to summarize.
//!
//! Grounded in `engine/checkpoint/verify.py`.

use crate::error::CheckpointError;
use crate::model::Checkpoint;
use crate::signer::VerifyingKey;
use crate::snapshot::{compute_state_hash, state_from_base64};
use rynxs_reducer::{replay, Reducer};
use rynxs_store_core::store::EventStore;
use serde::Serialize;

/// The outcome of checking a checkpoint, broken down by which property
/// failed so a caller can tell a bad signature apart from a merely stale
/// (but honestly signed) snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    /// Whether every check this call performed passed.
    pub valid: bool,
    /// Whether `checkpoint.signature` verifies against `signing_payload()`.
    pub signature_valid: bool,
    /// Whether `SHA-256(canonical_json(decoded state_bytes))` equals
    /// `checkpoint.state_hash`.
    pub state_hash_valid: bool,
    /// Whether the log actually has an event at `event_index` carrying
    /// `checkpoint.event_hash`.
    pub event_hash_valid: bool,
    /// Whether replaying the log up to `event_index` independently
    /// reproduces `checkpoint.state_hash`. Only computed by
    /// [`verify_full`].
    pub replay_state_valid: bool,
    /// The first failure encountered, if any.
    pub error: Option<String>,
}

/// Check only the signature: does `checkpoint.signature` verify against
/// [`Checkpoint::signing_payload`] under `verifying_key`, and does the
/// checkpoint's own `pubkey_id` actually name that key?
pub fn verify_signature(checkpoint: &Checkpoint, verifying_key: &VerifyingKey) -> Result<VerificationResult, CheckpointError> {
    let mut result = VerificationResult::default();

    let expected_pubkey_id = verifying_key.get_pubkey_id()?;
    if checkpoint.pubkey_id != expected_pubkey_id {
        result.error = Some(format!(
            "pubkey_id mismatch: checkpoint names {}, verifying key is {}",
            checkpoint.pubkey_id, expected_pubkey_id
        ));
        return Ok(result);
    }

    result.signature_valid = verifying_key.verify_base64(&checkpoint.signing_payload(), &checkpoint.signature)?;
    result.valid = result.signature_valid;
    if !result.signature_valid {
        result.error = Some("signature does not verify".to_string());
    }
    Ok(result)
}

/// Check the signature, the `state_bytes`/`state_hash` pairing, that the
/// claimed event actually exists in `store`, and that independently
/// replaying `store` through `reducer` up to `event_index` reproduces the
/// same state hash.
pub async fn verify_full(
    checkpoint: &Checkpoint,
    verifying_key: &VerifyingKey,
    store: &dyn EventStore,
    reducer: &Reducer,
) -> Result<VerificationResult, CheckpointError> {
    let mut result = verify_signature(checkpoint, verifying_key)?;

    result.state_hash_valid = match state_from_base64(&checkpoint.state_bytes) {
        Ok(state) => compute_state_hash(&state)? == checkpoint.state_hash,
        Err(_) => false,
    };

    result.event_hash_valid = store
        .get_event_hash(checkpoint.event_index)
        .await
        .map(|maybe_hash| maybe_hash.as_deref() == Some(checkpoint.event_hash.as_str()))
        .unwrap_or(false);

    let replayed = replay(store, reducer, None, Some(checkpoint.event_index)).await;
    result.replay_state_valid = match replayed {
        Ok(replayed) => compute_state_hash(&replayed.state)? == checkpoint.state_hash,
        Err(_) => false,
    };

    result.valid = result.signature_valid && result.state_hash_valid && result.event_hash_valid && result.replay_state_valid;
    if !result.valid && result.error.is_none() {
        result.error = Some("one or more consistency checks failed".to_string());
    }
    Ok(result)
}

/// Dispatch to [`verify_signature`] (`mode == "signature"`) or
/// [`verify_full`] (`mode == "full"`, requiring `store` and `reducer`).
pub async fn verify_checkpoint(
    checkpoint: &Checkpoint,
    verifying_key: &VerifyingKey,
    store: Option<&dyn EventStore>,
    reducer: Option<&Reducer>,
    mode: &str,
) -> Result<VerificationResult, CheckpointError> {
    match mode {
        "signature" => verify_signature(checkpoint, verifying_key),
        "full" => match (store, reducer) {
            (Some(store), Some(reducer)) => verify_full(checkpoint, verifying_key, store, reducer).await,
            _ => Err(CheckpointError::MissingReplayContext),
        },
        other => Err(CheckpointError::UnknownMode(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::SigningKey;
    use crate::snapshot::state_to_base64;
    use rynxs_events::Event;
    use rynxs_reducer::{HandlerMode, State};
    use rynxs_store_core::memory::MemoryEventStore;
    use serde_json::json;

    fn signed_checkpoint(signing: &SigningKey, event_index: u64, event_hash: &str, state: &State) -> Checkpoint {
        let mut cp = Checkpoint {
            version: 1,
            event_index,
            event_hash: event_hash.to_string(),
            state_hash: compute_state_hash(state).unwrap(),
            state_bytes: state_to_base64(state).unwrap(),
            created_at_logical: 0,
            pubkey_id: signing.get_pubkey_id().unwrap(),
            signature: String::new(),
            meta: json!({}),
        };
        cp.signature = signing.sign_base64(&cp.signing_payload()).unwrap();
        cp
    }

    #[test]
    fn verify_signature_accepts_a_correctly_signed_checkpoint() {
        let signing = SigningKey::generate();
        let state = State::initial().with_agg("universe", json!({"x": 1}));
        let cp = signed_checkpoint(&signing, 3, "deadbeef", &state);
        let result = verify_signature(&cp, &signing.verifying_key()).unwrap();
        assert!(result.valid);
        assert!(result.signature_valid);
    }

    #[test]
    fn verify_signature_rejects_wrong_key() {
        let signing = SigningKey::generate();
        let other = SigningKey::generate();
        let state = State::initial().with_agg("universe", json!({"x": 1}));
        let cp = signed_checkpoint(&signing, 3, "deadbeef", &state);
        let result = verify_signature(&cp, &other.verifying_key()).unwrap();
        assert!(!result.valid);
        assert!(result.error.is_some());
    }

    #[test]
    fn verify_signature_rejects_tampered_state_hash() {
        let signing = SigningKey::generate();
        let state = State::initial().with_agg("universe", json!({"x": 1}));
        let mut cp = signed_checkpoint(&signing, 3, "deadbeef", &state);
        cp.state_hash = "tampered".to_string();
        let result = verify_signature(&cp, &signing.verifying_key()).unwrap();
        assert!(!result.valid);
    }

    #[tokio::test]
    async fn verify_full_confirms_replay_matches_checkpoint() {
        let store = MemoryEventStore::new();
        let reducer = Reducer::with_universe_handlers(HandlerMode::Strict);
        let ev = Event::new("AgentObserved", "ns/a", 1, json!({"name": "a", "namespace": "ns", "spec_hash": "h", "spec": {}}));
        let appended = store.append_with_retry(ev).await.unwrap();

        let replayed = replay(&store, &reducer, None, None).await.unwrap();
        let signing = SigningKey::generate();
        let cp = signed_checkpoint(&signing, appended.seq, &appended.event_hash, &replayed.state);

        let result = verify_full(&cp, &signing.verifying_key(), &store, &reducer).await.unwrap();
        assert!(result.valid, "{:?}", result);
    }

    #[tokio::test]
    async fn verify_checkpoint_full_mode_requires_context() {
        let signing = SigningKey::generate();
        let state = State::initial();
        let cp = signed_checkpoint(&signing, 0, "x", &state);
        let err = verify_checkpoint(&cp, &signing.verifying_key(), None, None, "full")
            .await
            .unwrap_err();
        assert!(matches!(err, CheckpointError::MissingReplayContext));
    }
}
