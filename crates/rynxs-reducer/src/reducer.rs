//! The `Reducer`: a registry of pure per-event-type handlers folded into a
//! single designated aggregate slot.
//!
//! Grounded in `engine/core/reducer.py::Reducer`, generalized per
//! `operator/universe_operator/reducer_handlers.py` and confirmed by
//! `engine/tests/test_operator_determinism.py`'s `Reducer(global_aggregate_id=
//! UNIVERSE_AGG_ID)` construction: every built-in handler folds into one
//! shared aggregate (conventionally `"universe"`) rather than the triggering
//! event's own `aggregate_id`, so cross-aggregate invariants (Invariant 2,
//! spec.md §3) can be checked against a single state value.

use crate::error::ReducerError;
use crate::universe::{AgentRecord, Applied, Desired, DesiredAction, Failure, UniverseState};
use rynxs_events::Event;
use rynxs_types::canonical::{canonical_string, canonicalize};
use rynxs_types::ids::stable_id;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::state::State;

/// How [`Reducer::apply`] behaves when it encounters a wire event-type tag
/// with no registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerMode {
    /// Fail with [`ReducerError::NoHandler`]. Used by the live executor/replay
    /// path, where an unrecognized event means this binary is stale.
    Strict,
    /// Pass the aggregate's current value through unchanged. Used by
    /// auditing/verification tooling that must still make progress over logs
    /// written by a newer version of this engine.
    Lenient,
}

/// A pure function `(current aggregate value, event) -> new aggregate value`.
pub type Handler = Arc<dyn Fn(Option<&Value>, &Event) -> Result<Value, ReducerError> + Send + Sync>;

/// Registry of event handlers, all folding into one designated aggregate.
pub struct Reducer {
    global_aggregate_id: String,
    handlers: BTreeMap<String, Handler>,
    mode: HandlerMode,
}

impl Reducer {
    /// An empty reducer with no handlers registered, folding into
    /// `global_aggregate_id`.
    pub fn new(global_aggregate_id: impl Into<String>, mode: HandlerMode) -> Self {
        Reducer {
            global_aggregate_id: global_aggregate_id.into(),
            handlers: BTreeMap::new(),
            mode,
        }
    }

    /// A reducer pre-registered with the four built-in `UniverseState`
    /// handlers (`AgentObserved`, `ActionsDecided`, `ActionApplied`,
    /// `ActionFailed`), folding into `"universe"`.
    pub fn with_universe_handlers(mode: HandlerMode) -> Self {
        let mut reducer = Reducer::new("universe", mode);
        reducer.register("AgentObserved", Arc::new(on_agent_observed));
        reducer.register("ActionsDecided", Arc::new(on_actions_decided));
        reducer.register("ActionApplied", Arc::new(on_action_applied));
        reducer.register("ActionFailed", Arc::new(on_action_failed));
        reducer
    }

    /// The aggregate id every handled event folds into.
    pub fn global_aggregate_id(&self) -> &str {
        &self.global_aggregate_id
    }

    /// Register (or replace) the handler for `event_type`.
    pub fn register(
        &mut self,
        event_type: impl Into<String>,
        handler: Handler,
    ) {
        self.handlers.insert(event_type.into(), handler);
    }

    /// Fold `event` into `state`, returning the new state.
    ///
    /// All handled event types update the single `global_aggregate_id` slot;
    /// events with no registered handler are rejected in
    /// [`HandlerMode::Strict`] or passed through unchanged in
    /// [`HandlerMode::Lenient`].
    pub fn apply(&self, state: &State, event: &Event) -> Result<State, ReducerError> {
        let handler = match self.handlers.get(&event.event_type) {
            Some(h) => h,
            None => match self.mode {
                HandlerMode::Strict => {
                    return Err(ReducerError::NoHandler(event.event_type.clone()))
                }
                HandlerMode::Lenient => return Ok(state.clone()),
            },
        };

        let current = state.get_agg(&self.global_aggregate_id);
        let next = handler(current, event)?;
        Ok(state.with_agg(&self.global_aggregate_id, next))
    }
}

fn load_state(current: Option<&Value>) -> UniverseState {
    UniverseState::from_value(current)
}

fn action_fingerprint(action: &Value) -> Result<String, ReducerError> {
    let params = action.get("params").cloned().unwrap_or(Value::Object(Default::default()));
    let canonical = canonicalize(&params)?;
    let params_json = canonical_string(&canonical)?;
    let action_type = action.get("action_type").and_then(Value::as_str).unwrap_or("");
    let target = action.get("target").and_then(Value::as_str).unwrap_or("");
    Ok(stable_id(&[action_type, target, &params_json]))
}

fn on_agent_observed(current: Option<&Value>, event: &Event) -> Result<Value, ReducerError> {
    let mut state = load_state(current);
    let agent_id = event.aggregate_id.clone();
    let payload = &event.payload;

    let record = AgentRecord {
        name: payload.get("name").and_then(Value::as_str).map(str::to_string),
        namespace: payload.get("namespace").and_then(Value::as_str).map(str::to_string),
        spec_hash: payload.get("spec_hash").and_then(Value::as_str).map(str::to_string),
        spec: payload.get("spec").cloned(),
        labels: payload.get("labels").cloned().unwrap_or(Value::Object(Default::default())),
    };
    let spec_hash = payload
        .get("spec_hash")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    state.agents.insert(agent_id.clone(), record);
    state.last_seen_spec_hash.insert(agent_id, spec_hash);

    Ok(state.to_value())
}

fn on_actions_decided(current: Option<&Value>, event: &Event) -> Result<Value, ReducerError> {
    let mut state = load_state(current);
    let payload = &event.payload;

    let agent_id = payload
        .get("agent_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| event.aggregate_id.clone());

    let actions = payload.get("actions").and_then(Value::as_array).cloned().unwrap_or_default();
    let mut action_map = BTreeMap::new();
    for action in &actions {
        let action_id = action_fingerprint(action)?;
        action_map.insert(
            action_id.clone(),
            DesiredAction {
                action_type: action.get("action_type").and_then(Value::as_str).map(str::to_string),
                target: action.get("target").and_then(Value::as_str).map(str::to_string),
                fingerprint: action_id,
            },
        );
    }

    let desired = Desired {
        actions: action_map,
        actions_hash: payload.get("actions_hash").and_then(Value::as_str).map(str::to_string),
        trigger_event_hash: payload.get("trigger_event_hash").and_then(Value::as_str).map(str::to_string),
        trigger_event_type: payload.get("trigger_event_type").and_then(Value::as_str).map(str::to_string),
        trigger_spec_hash: payload.get("trigger_spec_hash").and_then(Value::as_str).map(str::to_string),
        trigger_event_seq: payload.get("trigger_event_seq").and_then(Value::as_u64),
    };

    state.desired.insert(agent_id, desired);
    Ok(state.to_value())
}

fn on_action_applied(current: Option<&Value>, event: &Event) -> Result<Value, ReducerError> {
    let mut state = load_state(current);
    let payload = &event.payload;

    let action_id = match payload.get("action_id").and_then(Value::as_str) {
        Some(id) => id.to_string(),
        None => return Ok(state.to_value()),
    };

    let applied = Applied {
        action_type: payload.get("action_type").and_then(Value::as_str).map(str::to_string),
        target: payload.get("target").and_then(Value::as_str).map(str::to_string),
        result_code: payload
            .get("result_code")
            .and_then(Value::as_str)
            .unwrap_or("OK")
            .to_string(),
        applied_seq: event.seq,
    };

    state.applied.insert(action_id, applied);
    Ok(state.to_value())
}

fn on_action_failed(current: Option<&Value>, event: &Event) -> Result<Value, ReducerError> {
    let mut state = load_state(current);
    let payload = &event.payload;
    let error = payload.get("error").cloned().unwrap_or(Value::Object(Default::default()));

    let failure = Failure {
        action_id: payload.get("action_id").and_then(Value::as_str).map(str::to_string),
        result_code: payload
            .get("result_code")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| error.get("code").and_then(Value::as_str).map(str::to_string)),
        error_code: error.get("code").and_then(Value::as_str).map(str::to_string),
        error_type: error.get("type").and_then(Value::as_str).map(str::to_string),
        error_status: error.get("status").cloned(),
        error_reason: error.get("reason").and_then(Value::as_str).map(str::to_string),
        failed_seq: event.seq,
    };

    state.failures.push(failure);
    Ok(state.to_value())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn observed(agent: &str, seq: u64, spec_hash: &str) -> Event {
        Event::new(
            "AgentObserved",
            agent,
            0,
            json!({"name": "a", "namespace": "ns", "spec_hash": spec_hash, "spec": {}, "labels": {}}),
        )
        .with_seq(seq)
    }

    #[test]
    fn agent_observed_folds_into_global_aggregate_not_event_aggregate() {
        let reducer = Reducer::with_universe_handlers(HandlerMode::Strict);
        let state = State::initial();
        let ev = observed("ns/a", 1, "deadbeef");

        let next = reducer.apply(&state, &ev).unwrap();

        assert!(next.get_agg("ns/a").is_none());
        let universe = next.get_agg("universe").expect("universe slot populated");
        let us = UniverseState::from_value(Some(universe));
        assert_eq!(us.agents.get("ns/a").unwrap().spec_hash.as_deref(), Some("deadbeef"));
    }

    #[test]
    fn strict_mode_rejects_unknown_event_type() {
        let reducer = Reducer::with_universe_handlers(HandlerMode::Strict);
        let state = State::initial();
        let ev = Event::new("SomethingNew", "ns/a", 0, json!({})).with_seq(1);

        assert!(matches!(reducer.apply(&state, &ev), Err(ReducerError::NoHandler(_))));
    }

    #[test]
    fn lenient_mode_passes_unknown_event_through() {
        let reducer = Reducer::with_universe_handlers(HandlerMode::Lenient);
        let state = State::initial();
        let ev = Event::new("SomethingNew", "ns/a", 0, json!({})).with_seq(1);

        let next = reducer.apply(&state, &ev).unwrap();
        assert_eq!(next, state);
    }

    #[test]
    fn replay_is_deterministic_regardless_of_key_order_in_payload() {
        let reducer = Reducer::with_universe_handlers(HandlerMode::Strict);
        let a = reducer.apply(&State::initial(), &observed("ns/a", 1, "h1")).unwrap();
        let b = reducer.apply(&a, &observed("ns/b", 2, "h2")).unwrap();

        let reducer2 = Reducer::with_universe_handlers(HandlerMode::Strict);
        let a2 = reducer2.apply(&State::initial(), &observed("ns/a", 1, "h1")).unwrap();
        let b2 = reducer2.apply(&a2, &observed("ns/b", 2, "h2")).unwrap();

        assert_eq!(b, b2);
    }

    #[test]
    fn actions_decided_fingerprints_actions_deterministically() {
        let reducer = Reducer::with_universe_handlers(HandlerMode::Strict);
        let ev = Event::new(
            "ActionsDecided",
            "universe",
            0,
            json!({
                "agent_id": "ns/a",
                "actions": [{"action_type": "EnsureConfigMap", "target": "ns/cm", "params": {"b": 2, "a": 1}}],
                "actions_hash": "h",
                "trigger_event_hash": "eh",
                "trigger_event_type": "AgentObserved",
                "trigger_spec_hash": "sh",
                "trigger_event_seq": 1,
            }),
        )
        .with_seq(2);

        let next = reducer.apply(&State::initial(), &ev).unwrap();
        let universe = next.get_agg("universe").unwrap();
        let us = UniverseState::from_value(Some(universe));
        let desired = us.desired.get("ns/a").unwrap();
        assert_eq!(desired.actions.len(), 1);
    }
}
