//! Translating Kubernetes-style agent objects into deterministic
//! `AgentObserved` events.
//!
//! Grounded in `operator/universe_operator/engine_adapter.py::EngineAdapter`.

use crate::clock::DeterministicClock;
use rynxs_events::{AgentObservedPayload, Event};
use rynxs_types::canonical::{canonical_string, canonicalize, CodecError};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Stable label keys allowed to survive into an event payload. Anything else
/// is dropped so controller-internal or operator-injected labels never leak
/// into the hash-critical payload.
const STABLE_LABEL_KEYS: &[&str] = &["app", "team", "policy", "role", "network-policy"];

/// Annotation key prefixes stripped from the payload because they are
/// written by tooling (`kubectl apply`, the Deployment controller) rather
/// than by the user, and change without any semantic change to the agent.
const BLOCKED_ANNOTATION_PREFIXES: &[&str] = &["kubectl.kubernetes.io/", "deployment.kubernetes.io/"];

/// Translates Kubernetes-shaped agent objects to `AgentObserved` events,
/// normalizing away every field that would make two semantically identical
/// objects hash differently.
pub struct EngineAdapter {
    clock: DeterministicClock,
}

impl EngineAdapter {
    /// Build an adapter starting from the given clock.
    pub fn new(clock: DeterministicClock) -> Self {
        EngineAdapter { clock }
    }

    /// The adapter's current logical time, without advancing it.
    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Translate one agent observation into an `AgentObserved` event.
    ///
    /// Advances the adapter's clock by exactly one tick per call, so two
    /// calls in sequence never produce the same timestamp even if the
    /// caller passes identical arguments.
    pub fn observe_agent(
        &mut self,
        name: &str,
        namespace: &str,
        spec: &Value,
        labels: Option<&Value>,
        annotations: Option<&Value>,
    ) -> Result<Event, CodecError> {
        let normalized_labels = normalize_labels(labels);
        let normalized_annotations = normalize_annotations(annotations);
        let canonical_spec = normalize_agent_spec(spec)?;

        let spec_str = canonical_string(&canonical_spec)?;
        let spec_hash = hex::encode(Sha256::digest(spec_str.as_bytes()));
        let spec_hash: String = spec_hash.chars().take(16).collect();

        self.clock = self.clock.tick(1);
        let logical_time = self.clock.now();

        let payload = AgentObservedPayload {
            name: name.to_string(),
            namespace: namespace.to_string(),
            labels: normalized_labels,
            annotations: normalized_annotations,
            spec: canonical_spec,
            spec_hash,
            observed_logical_time: logical_time,
        };
        let payload = serde_json::to_value(payload).expect("AgentObservedPayload always serializes to Value");

        let aggregate_id = format!("{namespace}/{name}");

        let meta = serde_json::json!({"source": "kubernetes", "resource": "agents"});

        Ok(Event::new("AgentObserved", aggregate_id, logical_time, payload).with_meta(meta))
    }
}

fn normalize_labels(labels: Option<&Value>) -> Value {
    let mut out = Map::new();
    if let Some(Value::Object(map)) = labels {
        let mut keys: Vec<&String> = map.keys().collect();
        keys.sort();
        for key in keys {
            if STABLE_LABEL_KEYS.contains(&key.as_str()) {
                out.insert(key.clone(), map[key].clone());
            }
        }
    }
    Value::Object(out)
}

fn normalize_annotations(annotations: Option<&Value>) -> Value {
    let mut out = Map::new();
    if let Some(Value::Object(map)) = annotations {
        let mut keys: Vec<&String> = map.keys().collect();
        keys.sort();
        for key in keys {
            if !BLOCKED_ANNOTATION_PREFIXES.iter().any(|p| key.starts_with(p)) {
                out.insert(key.clone(), map[key].clone());
            }
        }
    }
    Value::Object(out)
}

fn set_default(map: &mut Map<String, Value>, key: &str, value: Value) {
    let missing_or_null = match map.get(key) {
        None => true,
        Some(Value::Null) => true,
        _ => false,
    };
    if missing_or_null {
        map.insert(key.to_string(), value);
    }
}

fn take_object(map: &mut Map<String, Value>, key: &str) -> Map<String, Value> {
    match map.remove(key) {
        Some(Value::Object(m)) => m,
        _ => Map::new(),
    }
}

/// Apply the agent spec's defaulting rules so that K8s-level defaulting
/// drift (a field the apiserver fills in on one cluster but not another)
/// never produces two different `spec_hash`es for the same logical spec.
fn normalize_agent_spec(spec: &Value) -> Result<Value, CodecError> {
    let mut norm = match spec {
        Value::Object(m) => m.clone(),
        _ => Map::new(),
    };

    set_default(&mut norm, "role", Value::String("worker".to_string()));

    let mut permissions = take_object(&mut norm, "permissions");
    set_default(&mut permissions, "canAssignTasks", Value::Bool(false));
    set_default(&mut permissions, "canAccessAuditLogs", Value::Bool(false));
    set_default(&mut permissions, "canManageTeam", Value::Bool(false));
    norm.insert("permissions".to_string(), Value::Object(permissions));

    let mut image = take_object(&mut norm, "image");
    set_default(&mut image, "tag", Value::String("latest".to_string()));
    set_default(&mut image, "verify", Value::Bool(false));
    norm.insert("image".to_string(), Value::Object(image));

    let mut workspace = take_object(&mut norm, "workspace");
    set_default(&mut workspace, "size", Value::String("1Gi".to_string()));
    norm.insert("workspace".to_string(), Value::Object(workspace));

    canonicalize(&Value::Object(norm))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn observe_agent_drops_unstable_labels_and_blocked_annotations() {
        let mut adapter = EngineAdapter::new(DeterministicClock::new());
        let event = adapter
            .observe_agent(
                "a",
                "ns",
                &json!({}),
                Some(&json!({"app": "x", "secret-internal": "y"})),
                Some(&json!({"kubectl.kubernetes.io/last-applied-configuration": "{}", "owner": "bob"})),
            )
            .unwrap();

        assert_eq!(event.payload["labels"], json!({"app": "x"}));
        assert_eq!(event.payload["annotations"], json!({"owner": "bob"}));
    }

    #[test]
    fn observe_agent_applies_spec_defaults() {
        let mut adapter = EngineAdapter::new(DeterministicClock::new());
        let event = adapter.observe_agent("a", "ns", &json!({}), None, None).unwrap();

        assert_eq!(event.payload["spec"]["role"], "worker");
        assert_eq!(event.payload["spec"]["image"]["tag"], "latest");
        assert_eq!(event.payload["spec"]["image"]["verify"], false);
        assert_eq!(event.payload["spec"]["workspace"]["size"], "1Gi");
        assert_eq!(event.payload["spec"]["permissions"]["canManageTeam"], false);
    }

    #[test]
    fn observe_agent_is_deterministic_for_equivalent_specs() {
        let mut a1 = EngineAdapter::new(DeterministicClock::new());
        let mut a2 = EngineAdapter::new(DeterministicClock::new());

        let e1 = a1
            .observe_agent("a", "ns", &json!({"role": "worker"}), None, None)
            .unwrap();
        let e2 = a2.observe_agent("a", "ns", &json!({}), None, None).unwrap();

        assert_eq!(e1.payload["spec_hash"], e2.payload["spec_hash"]);
    }

    #[test]
    fn observe_agent_sets_aggregate_id_and_advances_clock() {
        let mut adapter = EngineAdapter::new(DeterministicClock::new());
        let first = adapter.observe_agent("a", "ns", &json!({}), None, None).unwrap();
        let second = adapter.observe_agent("b", "ns", &json!({}), None, None).unwrap();

        assert_eq!(first.aggregate_id, "ns/a");
        assert_eq!(second.aggregate_id, "ns/b");
        assert!(second.ts > first.ts);
    }

    #[test]
    fn spec_hash_is_16_hex_chars() {
        let mut adapter = EngineAdapter::new(DeterministicClock::new());
        let event = adapter.observe_agent("a", "ns", &json!({}), None, None).unwrap();
        let hash = event.payload["spec_hash"].as_str().unwrap();
        assert_eq!(hash.len(), 16);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
