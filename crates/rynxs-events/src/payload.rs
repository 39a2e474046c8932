//! Typed, serde-checked builders for `Event::payload`.
//!
//! `Event::payload` is kept as a `serde_json::Value` so the canonical codec
//! and hash chain stay representation-agnostic across every event kind. The
//! structs below exist so callers that build an event don't hand-assemble
//! that `Value` with `serde_json::json!` and risk a stray key typo; they
//! serialize into the exact same shape the untyped builders already produce,
//! so the wire format is unaffected. Grounded in `toka-store-core`'s
//! `EventPayload` marker-trait pattern, generalized here from "any
//! serializable payload" to "any payload that round-trips through canonical
//! JSON."

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

/// Marker for a type that can serve as an `Event::payload`.
pub trait EventPayload: Serialize + DeserializeOwned {
    /// Serialize into the `Value` shape stored on `Event::payload`.
    fn into_value(self) -> Result<Value, serde_json::Error>
    where
        Self: Sized,
    {
        serde_json::to_value(self)
    }
}

impl<T> EventPayload for T where T: Serialize + DeserializeOwned {}

/// Typed view of an `AgentObserved` payload, as built by the adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentObservedPayload {
    /// The agent's name.
    pub name: String,
    /// The agent's namespace.
    pub namespace: String,
    /// Normalized labels, restricted to the adapter's stable allowlist.
    pub labels: Value,
    /// Normalized annotations, with tooling-owned prefixes stripped.
    pub annotations: Value,
    /// The agent's spec after defaulting, in canonical form.
    pub spec: Value,
    /// First 16 hex chars of `SHA-256(canonical_json(spec))`.
    pub spec_hash: String,
    /// The adapter clock's reading at the moment this event was built.
    pub observed_logical_time: i64,
}

/// Typed view of an `ActionsDecided` payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionsDecidedPayload {
    /// Sequence number of the event that triggered this decision.
    pub trigger_event_seq: u64,
    /// Hash of the event that triggered this decision.
    pub trigger_event_hash: String,
    /// Wire type of the event that triggered this decision.
    pub trigger_event_type: String,
    /// `spec_hash` of the triggering `AgentObserved` event, if applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_spec_hash: Option<String>,
    /// Hash of the canonical action list this event records.
    pub actions_hash: String,
    /// Stable ids of every action this event records, in decided order.
    pub action_ids: Vec<String>,
}

/// Typed view of an `ActionApplied` payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionAppliedPayload {
    /// The applied action's stable id.
    pub action_id: String,
    /// The applied action's type (`EnsureConfigMap`, ...).
    pub action_type: String,
    /// The action's target aggregate.
    pub target: String,
    /// Always `"success"` for this payload kind.
    pub status: String,
    /// Outcome reason code (`CREATED`, `PATCHED`, `ALREADY_MATCHED`, ...).
    pub result_code: String,
    /// `"{Kind}/{namespace}/{name}"` of the resource acted on.
    pub resource_ref: String,
    /// Which resource-API call was made (`create`, `patch`, `noop`, `skip`).
    pub operation: String,
    /// Whether the call changed nothing in the cluster.
    pub noop: bool,
    /// HTTP-style status code for the operation, or `0` for a skip.
    pub status_code: i64,
    /// Hash of the action's desired state.
    pub desired_hash: String,
    /// Hash of the resource's observed state, if read back.
    #[serde(default)]
    pub observed_hash: Option<String>,
}

/// Typed view of an `ActionFailed` payload. `error` carries the serialized
/// `StableError` shape from `rynxs-executor`, kept as `Value` here so this
/// crate never depends on the executor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionFailedPayload {
    /// The failed action's stable id.
    pub action_id: String,
    /// The failed action's type.
    pub action_type: String,
    /// The action's target aggregate.
    pub target: String,
    /// `"{Kind}/{namespace}/{name}"` of the resource the action targeted.
    pub resource_ref: String,
    /// Hash of the action's desired state.
    pub desired_hash: String,
    /// Stable taxonomy code classifying the failure.
    pub result_code: String,
    /// Serialized `StableError` describing what went wrong.
    pub error: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Event;
    use serde_json::json;

    #[test]
    fn agent_observed_payload_round_trips_through_value() {
        let payload = AgentObservedPayload {
            name: "a".to_string(),
            namespace: "ns".to_string(),
            labels: json!({}),
            annotations: json!({}),
            spec: json!({"role": "worker"}),
            spec_hash: "deadbeefcafebabe".to_string(),
            observed_logical_time: 1,
        };
        let value = payload.clone().into_value().unwrap();
        let event = Event::new("AgentObserved", "ns/a", 1, value);
        assert_eq!(event.payload["name"], "a");
        assert_eq!(event.payload["spec_hash"], "deadbeefcafebabe");

        let back: AgentObservedPayload = serde_json::from_value(event.payload).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn action_applied_payload_omits_absent_observed_hash() {
        let payload = ActionAppliedPayload {
            action_id: "a1".to_string(),
            action_type: "EnsureConfigMap".to_string(),
            target: "a-spec".to_string(),
            status: "success".to_string(),
            result_code: "NO_API".to_string(),
            resource_ref: "ConfigMap/ns/a".to_string(),
            operation: "skip".to_string(),
            noop: true,
            status_code: 0,
            desired_hash: "hash".to_string(),
            observed_hash: None,
        };
        let value = payload.into_value().unwrap();
        assert_eq!(value["observed_hash"], Value::Null);
    }
}
