//! Assembling an auditable "decision proof": everything needed to convince
//! a third party that a given `ActionsDecided` event was triggered
//! correctly, and that the actions it named were actually applied as
//! claimed.
//!
//! Grounded in `engine/verify/proof.py::build_decision_proof`. The original
//! reads one JSONL file path directly; here the same assembly runs over any
//! [`EventStore`] backend, matching the store-abstracted style the rest of
//! this workspace already uses.

use crate::error::VerifyError;
use crate::pointers::verify_actions_decided_pointers;
use rynxs_checkpoint::{verify_signature, CheckpointStore, VerifyingKey};
use rynxs_events::Event;
use rynxs_store_core::store::EventStore;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A single applied-or-failed action's recorded outcome, or a marker that no
/// such record was ever found for an action id the decision claimed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActionResult {
    /// Whether no `ActionApplied`/`ActionFailed` record exists for this
    /// action id at all.
    pub missing: bool,
    /// `"ActionApplied"` or `"ActionFailed"`.
    pub event_type: Option<String>,
    /// The event's `result_code`.
    pub result_code: Option<String>,
    /// `"{kind}/{namespace}/{name}"` of the resource the action targeted.
    pub resource_ref: Option<String>,
    /// `"create"`, `"patch"`, or `"noop"`, for a successful apply.
    pub operation: Option<String>,
    /// Whether the apply was a no-op (desired already matched observed).
    pub noop: Option<bool>,
    /// The external API's status code, if the event recorded one.
    pub status_code: Option<Value>,
    /// Hash of the normalized desired resource shape.
    pub desired_hash: Option<String>,
    /// Hash of the normalized observed resource shape, for a patch/noop.
    pub observed_hash: Option<String>,
    /// The stable error classification, for a failed apply.
    pub error: Option<Value>,
}

/// Which event triggered the `ActionsDecided` this proof covers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TriggerEventInfo {
    /// The trigger event's `seq`.
    pub seq: Option<u64>,
    /// The trigger event's hash-chain hash.
    pub hash: Option<String>,
    /// The trigger event's wire type tag.
    pub event_type: Option<String>,
    /// The trigger event's `spec_hash`, if it carried one.
    pub spec_hash: Option<String>,
}

/// The `ActionsDecided` event's own payload, projected for the proof.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActionsDecidedInfo {
    /// Hash of the canonical action set the decision layer derived.
    pub actions_hash: Option<String>,
    /// Stable ids of every action the decision layer derived.
    pub action_ids: Vec<String>,
    /// The raw action records themselves.
    pub actions: Vec<Value>,
    /// The trigger event hash the decision claims to be responding to.
    pub trigger_event_hash: Option<String>,
    /// The trigger event type the decision claims to be responding to.
    pub trigger_event_type: Option<String>,
    /// The trigger event's `spec_hash`, as recorded by the decision layer.
    pub trigger_spec_hash: Option<String>,
}

/// Information about the nearest checkpoint at or before the trigger event,
/// if a checkpoint directory was supplied.
#[derive(Debug, Clone, Serialize)]
pub struct CheckpointInfo {
    /// Path to the checkpoint file used.
    pub path: PathBuf,
    /// The checkpoint's `event_index`.
    pub event_index: u64,
    /// The checkpoint's `event_hash`.
    pub event_hash: String,
    /// The checkpoint's `state_hash`.
    pub state_hash: String,
    /// The checkpoint's claimed `pubkey_id`.
    pub pubkey_id: String,
    /// Whether the checkpoint's signature verified, if a public key was
    /// supplied to check it against.
    pub signature_valid: Option<bool>,
    /// An error encountered while loading the key or checking the
    /// signature, if any.
    pub error: Option<String>,
}

/// Whether a proof's internal consistency checks (pointer chain, trigger
/// fields, action-id coverage) all passed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProofVerificationResult {
    /// Whether every check passed.
    pub valid: bool,
    /// Every failure encountered (unlike [`crate::pointers::PointerVerificationResult`],
    /// proof verification collects all failures rather than stopping at the
    /// first).
    pub errors: Vec<String>,
}

/// The full assembled proof for one `ActionsDecided` event.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionProof {
    /// Whether the proof could be assembled and every check passed.
    pub valid: bool,
    /// Why assembly failed, if it did (e.g. no matching `ActionsDecided`).
    pub error: Option<String>,
    /// Internal-consistency verification, if assembly succeeded.
    pub verification: Option<ProofVerificationResult>,
    /// The event that triggered this decision.
    pub trigger_event: Option<TriggerEventInfo>,
    /// The decision layer's own recorded output.
    pub actions_decided: Option<ActionsDecidedInfo>,
    /// Outcome of every action the decision named, by action id.
    pub action_results: BTreeMap<String, ActionResult>,
    /// The nearest checkpoint at or before the trigger event, if requested.
    pub checkpoint: Option<CheckpointInfo>,
}

fn failed_proof(error: &str) -> DecisionProof {
    DecisionProof {
        valid: false,
        error: Some(error.to_string()),
        verification: None,
        trigger_event: None,
        actions_decided: None,
        action_results: BTreeMap::new(),
        checkpoint: None,
    }
}

/// Assemble a decision proof for the `ActionsDecided` event triggered by
/// `at_seq` (or, if `at_seq` is `None`, the first `ActionsDecided` event in
/// the log).
pub async fn build_decision_proof(
    store: &dyn EventStore,
    at_seq: Option<u64>,
    checkpoints_dir: Option<&Path>,
    pubkey_path: Option<&Path>,
) -> Result<DecisionProof, VerifyError> {
    let events = store.read(None, 0).await?;

    let mut seq_to_event: BTreeMap<u64, Event> = BTreeMap::new();
    let mut seq_to_hash: BTreeMap<u64, String> = BTreeMap::new();
    for event in &events {
        let seq = event.seq.unwrap_or(0);
        seq_to_event.insert(seq, event.clone());
        if let Some(hash) = store.get_event_hash(seq).await? {
            seq_to_hash.insert(seq, hash);
        }
    }

    let decided = events.iter().find(|ev| {
        if ev.event_type != "ActionsDecided" {
            return false;
        }
        match at_seq {
            None => true,
            Some(target) => ev.payload.get("trigger_event_seq").and_then(Value::as_u64) == Some(target),
        }
    });

    let decided = match decided {
        Some(ev) => ev,
        None => return Ok(failed_proof("ActionsDecided not found for given seq")),
    };

    let payload = &decided.payload;
    let trigger_seq = payload.get("trigger_event_seq").and_then(Value::as_u64);
    let trigger_event = trigger_seq.and_then(|seq| seq_to_event.get(&seq));
    let trigger_hash = trigger_seq.and_then(|seq| seq_to_hash.get(&seq).cloned());

    let mut all_results: BTreeMap<String, ActionResult> = BTreeMap::new();
    for event in &events {
        if event.event_type != "ActionApplied" && event.event_type != "ActionFailed" {
            continue;
        }
        let p = &event.payload;
        let action_id = match p.get("action_id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => continue,
        };
        all_results.insert(
            action_id,
            ActionResult {
                missing: false,
                event_type: Some(event.event_type.clone()),
                result_code: p.get("result_code").and_then(Value::as_str).map(str::to_string),
                resource_ref: p.get("resource_ref").and_then(Value::as_str).map(str::to_string),
                operation: p.get("operation").and_then(Value::as_str).map(str::to_string),
                noop: p.get("noop").and_then(Value::as_bool),
                status_code: p.get("status_code").cloned(),
                desired_hash: p.get("desired_hash").and_then(Value::as_str).map(str::to_string),
                observed_hash: p.get("observed_hash").and_then(Value::as_str).map(str::to_string),
                error: p.get("error").cloned(),
            },
        );
    }

    let action_ids: Vec<String> = payload
        .get("action_ids")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();

    let mut action_results = BTreeMap::new();
    for aid in &action_ids {
        let result = all_results.get(aid).cloned().unwrap_or(ActionResult {
            missing: true,
            ..Default::default()
        });
        action_results.insert(aid.clone(), result);
    }

    let checkpoint_info = if let Some(dir) = checkpoints_dir {
        build_checkpoint_info(dir, trigger_seq.unwrap_or(0), pubkey_path)?
    } else {
        None
    };

    let verification = verify_proof(payload, trigger_event, trigger_hash.as_deref(), &action_results, store).await?;

    Ok(DecisionProof {
        valid: verification.valid,
        error: None,
        verification: Some(verification),
        trigger_event: Some(TriggerEventInfo {
            seq: trigger_seq,
            hash: trigger_hash,
            event_type: trigger_event.map(|e| e.event_type.clone()),
            spec_hash: trigger_event.and_then(|e| e.payload.get("spec_hash")).and_then(Value::as_str).map(str::to_string),
        }),
        actions_decided: Some(ActionsDecidedInfo {
            actions_hash: payload.get("actions_hash").and_then(Value::as_str).map(str::to_string),
            action_ids,
            actions: payload.get("actions").and_then(Value::as_array).cloned().unwrap_or_default(),
            trigger_event_hash: payload.get("trigger_event_hash").and_then(Value::as_str).map(str::to_string),
            trigger_event_type: payload.get("trigger_event_type").and_then(Value::as_str).map(str::to_string),
            trigger_spec_hash: payload.get("trigger_spec_hash").and_then(Value::as_str).map(str::to_string),
        }),
        action_results,
        checkpoint: checkpoint_info,
    })
}

fn build_checkpoint_info(dir: &Path, trigger_seq: u64, pubkey_path: Option<&Path>) -> Result<Option<CheckpointInfo>, VerifyError> {
    let store = CheckpointStore::new(dir);
    let cp_path = match store.find_at_or_before(trigger_seq)? {
        Some(p) => p,
        None => return Ok(None),
    };
    let cp = store.load(&cp_path)?;

    let mut info = CheckpointInfo {
        path: cp_path,
        event_index: cp.event_index,
        event_hash: cp.event_hash.clone(),
        state_hash: cp.state_hash.clone(),
        pubkey_id: cp.pubkey_id.clone(),
        signature_valid: None,
        error: None,
    };

    if let Some(pubkey_path) = pubkey_path {
        match VerifyingKey::load_from_file(pubkey_path) {
            Ok(key) => match verify_signature(&cp, &key) {
                Ok(result) => {
                    info.signature_valid = Some(result.signature_valid);
                    info.error = result.error;
                }
                Err(e) => {
                    info.signature_valid = Some(false);
                    info.error = Some(e.to_string());
                }
            },
            Err(e) => {
                info.signature_valid = Some(false);
                info.error = Some(e.to_string());
            }
        }
    }

    Ok(Some(info))
}

async fn verify_proof(
    decided_payload: &Value,
    trigger_event: Option<&Event>,
    trigger_hash: Option<&str>,
    action_results: &BTreeMap<String, ActionResult>,
    store: &dyn EventStore,
) -> Result<ProofVerificationResult, VerifyError> {
    let mut errors = Vec::new();

    let pointer_result = verify_actions_decided_pointers(store).await?;
    if !pointer_result.valid {
        errors.push(pointer_result.error.unwrap_or_else(|| "pointer verification failed".to_string()));
    }

    let decided_trigger_hash = decided_payload.get("trigger_event_hash").and_then(Value::as_str);
    if decided_trigger_hash != trigger_hash {
        errors.push("trigger_event_hash mismatch".to_string());
    }

    let decided_trigger_type = decided_payload.get("trigger_event_type").and_then(Value::as_str);
    let actual_trigger_type = trigger_event.map(|e| e.event_type.as_str());
    if decided_trigger_type != actual_trigger_type {
        errors.push("trigger_event_type mismatch".to_string());
    }

    if let Some(decided_spec_hash) = decided_payload.get("trigger_spec_hash").and_then(Value::as_str) {
        let expected = trigger_event.and_then(|e| e.payload.get("spec_hash")).and_then(Value::as_str);
        if Some(decided_spec_hash) != expected {
            errors.push("trigger_spec_hash mismatch".to_string());
        }
    }

    if let Some(action_ids) = decided_payload.get("action_ids").and_then(Value::as_array) {
        for aid in action_ids.iter().filter_map(Value::as_str) {
            match action_results.get(aid) {
                Some(r) if !r.missing => {}
                _ => errors.push(format!("missing action_result for {aid}")),
            }
        }
    }

    let valid = errors.is_empty();
    Ok(ProofVerificationResult { valid, errors })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rynxs_store_core::memory::MemoryEventStore;
    use serde_json::json;

    #[tokio::test]
    async fn builds_a_valid_proof_for_a_fully_applied_decision() {
        let store = MemoryEventStore::new();
        let observed = store
            .append_with_retry(Event::new("AgentObserved", "ns/a", 1, json!({"spec_hash": "h1"})))
            .await
            .unwrap();

        let decided = store
            .append_with_retry(Event::new(
                "ActionsDecided",
                "universe",
                2,
                json!({
                    "trigger_event_seq": observed.seq,
                    "trigger_event_hash": observed.event_hash,
                    "trigger_event_type": "AgentObserved",
                    "trigger_spec_hash": "h1",
                    "action_ids": ["a1"],
                    "actions": [],
                }),
            ))
            .await
            .unwrap();

        store
            .append_with_retry(Event::new(
                "ActionApplied",
                "universe",
                3,
                json!({"action_id": "a1", "result_code": "OK", "operation": "create"}),
            ))
            .await
            .unwrap();

        let proof = build_decision_proof(&store, Some(observed.seq), None, None).await.unwrap();
        assert!(proof.valid, "{:?}", proof);
        assert_eq!(proof.action_results.get("a1").unwrap().missing, false);
        let _ = decided;
    }

    #[tokio::test]
    async fn missing_action_result_fails_verification() {
        let store = MemoryEventStore::new();
        let observed = store
            .append_with_retry(Event::new("AgentObserved", "ns/a", 1, json!({"spec_hash": "h1"})))
            .await
            .unwrap();

        store
            .append_with_retry(Event::new(
                "ActionsDecided",
                "universe",
                2,
                json!({
                    "trigger_event_seq": observed.seq,
                    "trigger_event_hash": observed.event_hash,
                    "trigger_event_type": "AgentObserved",
                    "action_ids": ["missing-action"],
                    "actions": [],
                }),
            ))
            .await
            .unwrap();

        let proof = build_decision_proof(&store, Some(observed.seq), None, None).await.unwrap();
        assert!(!proof.valid);
        assert!(proof
            .verification
            .unwrap()
            .errors
            .iter()
            .any(|e| e.contains("missing-action")));
    }

    #[tokio::test]
    async fn no_matching_decision_reports_failure() {
        let store = MemoryEventStore::new();
        let proof = build_decision_proof(&store, Some(1), None, None).await.unwrap();
        assert!(!proof.valid);
        assert_eq!(proof.error.as_deref(), Some("ActionsDecided not found for given seq"));
    }
}
