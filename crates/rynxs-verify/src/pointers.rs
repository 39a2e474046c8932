//! Verifying a log's hash chain and, for every `ActionsDecided` event, that
//! its `trigger_event_*` fields actually point at the event they claim to.
//!
//! Grounded in `engine/verify/pointers.py::verify_actions_decided_pointers`.
//! The original reads a JSONL log file directly and recomputes the chain as
//! it goes; here that recomputation runs over any [`EventStore`] backend
//! instead of a specific file format, using [`hash_event`] the same way the
//! store itself does on append.

use crate::error::VerifyError;
use rynxs_events::{hash_event, Event, HashVersion, ZERO_HASH};
use rynxs_store_core::store::EventStore;
use serde::Serialize;
use std::collections::BTreeMap;

/// The outcome of checking a log's hash chain and `ActionsDecided` pointers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PointerVerificationResult {
    /// Whether the chain and every pointer it contains checked out.
    pub valid: bool,
    /// Number of `ActionsDecided` events whose pointers were checked before
    /// a failure (or the end of the log) was reached.
    pub checked: u64,
    /// The first failure encountered, if any.
    pub error: Option<String>,
    /// The `seq` of the event that failed verification, if any.
    pub mismatch_seq: Option<u64>,
    /// What was expected at the point of failure.
    pub expected: Option<String>,
    /// What was actually found at the point of failure.
    pub actual: Option<String>,
}

impl PointerVerificationResult {
    fn failure(checked: u64, seq: Option<u64>, error: &str, expected: Option<String>, actual: Option<String>) -> Self {
        PointerVerificationResult {
            valid: false,
            checked,
            error: Some(error.to_string()),
            mismatch_seq: seq,
            expected,
            actual,
        }
    }
}

/// Recompute the hash chain for every event in `store` and, for each
/// `ActionsDecided` event, confirm its `trigger_event_seq`/`trigger_event_hash`/
/// `trigger_event_type`/`trigger_spec_hash` fields actually match the event
/// they claim as their trigger.
///
/// Each record's hash is recomputed under the codec version *that record
/// itself* carries (its `hash_version` tag, inferred the same way the store
/// backends infer it on read), not a single version assumed for the whole
/// log — a log written under `RYNXS_HASH_VERSION=v1` verifies the same as
/// one written under the v2 default.
pub async fn verify_actions_decided_pointers(
    store: &dyn EventStore,
) -> Result<PointerVerificationResult, VerifyError> {
    let events = store.read(None, 0).await?;

    let mut seq_to_hash: BTreeMap<u64, String> = BTreeMap::new();
    let mut seq_to_event: BTreeMap<u64, Event> = BTreeMap::new();
    let mut prev_hash = ZERO_HASH.to_string();
    let mut checked = 0u64;

    for event in &events {
        let seq = event.seq.unwrap_or(0);
        let hash_version = HashVersion::from_record_tag(event.hash_version.as_deref());
        let computed_hash = hash_event(&prev_hash, event, hash_version);

        let stored_hash = store.get_event_hash(seq).await?;
        if stored_hash.as_deref() != Some(computed_hash.as_str()) {
            return Ok(PointerVerificationResult::failure(
                checked,
                Some(seq),
                "event_hash mismatch",
                Some(computed_hash),
                stored_hash,
            ));
        }

        seq_to_hash.insert(seq, computed_hash.clone());
        seq_to_event.insert(seq, event.clone());
        prev_hash = computed_hash;

        if event.event_type != "ActionsDecided" {
            continue;
        }

        let payload = &event.payload;
        let trigger_seq = payload.get("trigger_event_seq").and_then(serde_json::Value::as_u64);
        let trigger_hash = payload.get("trigger_event_hash").and_then(serde_json::Value::as_str);
        let trigger_type = payload.get("trigger_event_type").and_then(serde_json::Value::as_str);
        let trigger_spec_hash = payload.get("trigger_spec_hash").and_then(serde_json::Value::as_str);

        let trigger_seq = match trigger_seq {
            Some(s) => s,
            None => {
                return Ok(PointerVerificationResult::failure(
                    checked,
                    Some(seq),
                    "missing trigger_event_seq",
                    None,
                    None,
                ))
            }
        };

        let expected_hash = seq_to_hash.get(&trigger_seq).cloned();
        let expected_event = seq_to_event.get(&trigger_seq).cloned();
        let (expected_hash, expected_event) = match (expected_hash, expected_event) {
            (Some(h), Some(e)) => (h, e),
            _ => {
                return Ok(PointerVerificationResult::failure(
                    checked,
                    Some(seq),
                    "trigger_seq not found",
                    Some(trigger_seq.to_string()),
                    None,
                ))
            }
        };

        if trigger_hash != Some(expected_hash.as_str()) {
            return Ok(PointerVerificationResult::failure(
                checked,
                Some(seq),
                "trigger_event_hash mismatch",
                Some(expected_hash),
                trigger_hash.map(str::to_string),
            ));
        }

        if trigger_type != Some(expected_event.event_type.as_str()) {
            return Ok(PointerVerificationResult::failure(
                checked,
                Some(seq),
                "trigger_event_type mismatch",
                Some(expected_event.event_type.clone()),
                trigger_type.map(str::to_string),
            ));
        }

        if let Some(trigger_spec_hash) = trigger_spec_hash {
            let expected_spec_hash = expected_event.payload.get("spec_hash").and_then(serde_json::Value::as_str);
            if Some(trigger_spec_hash) != expected_spec_hash {
                return Ok(PointerVerificationResult::failure(
                    checked,
                    Some(seq),
                    "trigger_spec_hash mismatch",
                    expected_spec_hash.map(str::to_string),
                    Some(trigger_spec_hash.to_string()),
                ));
            }
        }

        checked += 1;
    }

    Ok(PointerVerificationResult {
        valid: true,
        checked,
        error: None,
        mismatch_seq: None,
        expected: None,
        actual: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rynxs_store_core::memory::MemoryEventStore;
    use serde_json::json;

    #[tokio::test]
    async fn valid_chain_with_correct_pointer_passes() {
        let store = MemoryEventStore::new();
        let observed = store
            .append_with_retry(Event::new("AgentObserved", "ns/a", 1, json!({"spec_hash": "h1"})))
            .await
            .unwrap();

        let decided_event = Event::new(
            "ActionsDecided",
            "universe",
            2,
            json!({
                "trigger_event_seq": observed.seq,
                "trigger_event_hash": observed.event_hash,
                "trigger_event_type": "AgentObserved",
                "trigger_spec_hash": "h1",
                "action_ids": [],
            }),
        );
        store.append_with_retry(decided_event).await.unwrap();

        let result = verify_actions_decided_pointers(&store).await.unwrap();
        assert!(result.valid, "{:?}", result);
        assert_eq!(result.checked, 1);
    }

    #[tokio::test]
    async fn wrong_trigger_hash_is_detected() {
        let store = MemoryEventStore::new();
        let observed = store
            .append_with_retry(Event::new("AgentObserved", "ns/a", 1, json!({"spec_hash": "h1"})))
            .await
            .unwrap();

        let decided_event = Event::new(
            "ActionsDecided",
            "universe",
            2,
            json!({
                "trigger_event_seq": observed.seq,
                "trigger_event_hash": "wrong-hash",
                "trigger_event_type": "AgentObserved",
                "action_ids": [],
            }),
        );
        store.append_with_retry(decided_event).await.unwrap();

        let result = verify_actions_decided_pointers(&store).await.unwrap();
        assert!(!result.valid);
        assert_eq!(result.error.as_deref(), Some("trigger_event_hash mismatch"));
    }
}
