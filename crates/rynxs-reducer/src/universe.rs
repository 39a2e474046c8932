//! `UniverseState`: the cross-aggregate domain state the operator's four
//! built-in handlers fold into, stored as the single value at
//! [`crate::reducer::Reducer`]'s `global_aggregate_id` slot.
//!
//! Grounded in `engine/core/state.py::UniverseState` and
//! `operator/universe_operator/reducer_handlers.py`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The latest observed spec snapshot recorded for one agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRecord {
    /// Agent name, as observed.
    pub name: Option<String>,
    /// Agent namespace, as observed.
    pub namespace: Option<String>,
    /// First 16 hex chars of the SHA-256 of the normalized, canonical spec.
    pub spec_hash: Option<String>,
    /// The normalized, canonical spec itself.
    pub spec: Option<Value>,
    /// Allowlisted, sorted labels.
    #[serde(default)]
    pub labels: Value,
}

/// One action as recorded inside a `desired[agent_id]` entry — a thin
/// fingerprint view, not the full action descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredAction {
    /// The action's type tag (`EnsureConfigMap`, ...).
    pub action_type: Option<String>,
    /// `namespace/name` target.
    pub target: Option<String>,
    /// `stable_id(action_type, target, canonical_json(params))`.
    pub fingerprint: String,
}

/// The decided action set for one agent, plus the pointers binding it back
/// to the triggering event (Invariant 2 in spec.md §3).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Desired {
    /// `action_id -> DesiredAction`, keyed the same way `applied` is.
    pub actions: BTreeMap<String, DesiredAction>,
    /// Hash of the canonical actions list, as recorded by the decision event.
    pub actions_hash: Option<String>,
    /// `event_hash` of the event that triggered this decision.
    pub trigger_event_hash: Option<String>,
    /// `type` of the triggering event.
    pub trigger_event_type: Option<String>,
    /// `spec_hash` carried by the triggering event's payload, if any.
    pub trigger_spec_hash: Option<String>,
    /// `seq` of the triggering event.
    pub trigger_event_seq: Option<u64>,
}

/// Outcome of a successfully applied action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applied {
    /// The action's type tag.
    pub action_type: Option<String>,
    /// `namespace/name` target.
    pub target: Option<String>,
    /// The executor's result code (e.g. `"CREATED"`, `"ALREADY_MATCHED"`).
    pub result_code: String,
    /// `seq` of the `ActionApplied` event.
    pub applied_seq: Option<u64>,
}

/// One recorded action failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// The action id that failed.
    pub action_id: Option<String>,
    /// The stable error taxonomy's `code`, if available, else the raw
    /// `result_code` the executor attached.
    pub result_code: Option<String>,
    /// Stable error code (`K8S_NOT_FOUND`, ...).
    pub error_code: Option<String>,
    /// The originating error's type tag.
    pub error_type: Option<String>,
    /// HTTP-style status, if the API surfaced one.
    pub error_status: Option<Value>,
    /// Human-readable reason, if the API surfaced one.
    pub error_reason: Option<String>,
    /// `seq` of the `ActionFailed` event.
    pub failed_seq: Option<u64>,
}

/// Minimal deterministic domain state for the operator, stored as a single
/// aggregate (`"universe"`) in `State::aggregates`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniverseState {
    /// `aggregate_id -> latest observed agent record`.
    #[serde(default)]
    pub agents: BTreeMap<String, AgentRecord>,
    /// `aggregate_id -> last recorded spec_hash`, for change detection.
    #[serde(default)]
    pub last_seen_spec_hash: BTreeMap<String, String>,
    /// `agent_id -> desired action set`.
    #[serde(default)]
    pub desired: BTreeMap<String, Desired>,
    /// `action_id -> applied outcome`.
    #[serde(default)]
    pub applied: BTreeMap<String, Applied>,
    /// Ordered list of recorded failures.
    #[serde(default)]
    pub failures: Vec<Failure>,
}

impl UniverseState {
    /// The empty starting state.
    pub fn initial() -> Self {
        UniverseState::default()
    }

    /// Load a `UniverseState` from the opaque `Value` the reducer's global
    /// aggregate slot holds (or the initial state if the slot is empty).
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(v) => serde_json::from_value(v.clone()).unwrap_or_default(),
            None => UniverseState::default(),
        }
    }

    /// Render back to the `Value` form stored in `State::aggregates`.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).expect("UniverseState always serializes to Value")
    }
}
