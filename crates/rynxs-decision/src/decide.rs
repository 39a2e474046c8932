//! The decision function itself: `(state, event) -> actions`.
//!
//! Grounded in `operator/universe_operator/decision_layer.py::DecisionLayer`.
//! Pure: no I/O, no side effects, no randomness. The current `state` is
//! accepted (mirroring the original signature) but the built-in
//! `AgentObserved` decision does not yet consult it — every decision is
//! derivable from the triggering event alone.

use crate::action::Action;
use rynxs_events::Event;
use rynxs_reducer::State;
use rynxs_types::canonical::{canonical_string, canonicalize};
use serde_json::{json, Value};

/// Registry-free decision layer: reads the built-in event-type dispatch
/// (`AgentObserved` -> four `Ensure*` actions, everything else -> none) and
/// applies the canonical stable sort before returning.
#[derive(Debug, Default, Clone, Copy)]
pub struct DecisionLayer;

impl DecisionLayer {
    /// Build a decision layer. Stateless, so construction never fails.
    pub fn new() -> Self {
        DecisionLayer
    }

    /// Decide which actions, if any, `event` implies given `state`.
    pub fn decide(&self, state: &State, event: &Event) -> Vec<Action> {
        let actions = match event.event_type.as_str() {
            "AgentObserved" => decide_agent_observed(state, event),
            "ActionApplied" | "ActionFailed" => Vec::new(),
            _ => Vec::new(),
        };
        stable_sort(actions)
    }
}

fn stable_sort(mut actions: Vec<Action>) -> Vec<Action> {
    actions.sort_by(|a, b| {
        let a_key = sort_key(a);
        let b_key = sort_key(b);
        a_key.cmp(&b_key)
    });
    actions
}

fn sort_key(action: &Action) -> (String, String, String) {
    let params_json = canonicalize(&action.params)
        .and_then(|c| canonical_string(&c))
        .unwrap_or_else(|_| format!("{:?}", action.params));
    (action.action_type.clone(), action.target.clone(), params_json)
}

fn decide_agent_observed(_state: &State, event: &Event) -> Vec<Action> {
    let mut actions = Vec::new();
    let payload = &event.payload;

    let name = payload.get("name").and_then(Value::as_str).unwrap_or_default();
    let namespace = payload.get("namespace").and_then(Value::as_str).unwrap_or_default();
    let spec = payload.get("spec").cloned().unwrap_or(Value::Object(Default::default()));

    // 1. ConfigMap carrying the agent's canonical spec for the runtime to read.
    let spec_json = canonicalize(&spec)
        .and_then(|c| canonical_string(&c))
        .unwrap_or_else(|_| "{}".to_string());
    actions.push(Action::ensure_config_map(
        &format!("{name}-spec"),
        namespace,
        json!({"agent.json": spec_json}),
    ));

    // 2. PVC for the agent's workspace.
    let workspace = spec.get("workspace").cloned().unwrap_or(Value::Object(Default::default()));
    let size = workspace.get("size").and_then(Value::as_str).unwrap_or("1Gi");
    let storage_class = workspace.get("storageClassName").and_then(Value::as_str);
    actions.push(Action::ensure_pvc(
        &format!("{name}-workspace"),
        namespace,
        size,
        storage_class,
    ));

    // 3. Deployment running the agent runtime.
    let image_spec = spec.get("image").cloned().unwrap_or(Value::Object(Default::default()));
    let image_repo = image_spec
        .get("repository")
        .and_then(Value::as_str)
        .unwrap_or("rynxs/universal-agent-runtime");
    let image_tag = image_spec.get("tag").and_then(Value::as_str).unwrap_or("latest");
    let image = format!("{image_repo}:{image_tag}");
    let image_verify = image_spec.get("verify").and_then(Value::as_bool).unwrap_or(false);

    let deployment_spec = json!({
        "replicas": 1,
        "image": image,
        "image_verify": image_verify,
        "env": [
            {"name": "AGENT_NAME", "value": name},
            {"name": "AGENT_NAMESPACE", "value": namespace},
        ],
        "runtime_class": "gvisor",
        "volumes": [
            {"name": "workspace", "pvc": format!("{name}-workspace")},
            {"name": "agent-spec", "configmap": format!("{name}-spec")},
        ],
        "volume_mounts": [
            {"name": "workspace", "mount_path": "/workspace"},
            {"name": "agent-spec", "mount_path": "/config", "read_only": true},
        ],
    });
    let deployment_spec = canonicalize(&deployment_spec).unwrap_or(deployment_spec);

    actions.push(Action::ensure_deployment(
        &format!("{name}-runtime"),
        namespace,
        deployment_spec,
    ));

    // 4. NetworkPolicy, scoped by role/permissions.
    let role = spec.get("role").and_then(Value::as_str).unwrap_or("worker");
    let can_assign_tasks = spec
        .get("permissions")
        .and_then(|p| p.get("canAssignTasks"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let pod_selector = json!({"app": "universe-agent", "agent": name});
    if role == "director" || role == "manager" || can_assign_tasks {
        actions.push(Action::ensure_network_policy(
            &format!("{name}-allow-egress"),
            namespace,
            pod_selector,
            "allow-egress",
        ));
    } else {
        actions.push(Action::ensure_network_policy(
            &format!("{name}-deny-egress"),
            namespace,
            pod_selector,
            "deny-egress",
        ));
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn observed(spec: Value) -> Event {
        Event::new(
            "AgentObserved",
            "ns/a",
            0,
            json!({"name": "a", "namespace": "ns", "spec": spec}),
        )
        .with_seq(1)
    }

    #[test]
    fn agent_observed_produces_four_actions_for_a_worker() {
        let layer = DecisionLayer::new();
        let actions = layer.decide(&State::initial(), &observed(json!({})));
        assert_eq!(actions.len(), 4);

        let types: Vec<&str> = actions.iter().map(|a| a.action_type.as_str()).collect();
        assert!(types.contains(&"EnsureConfigMap"));
        assert!(types.contains(&"EnsurePVC"));
        assert!(types.contains(&"EnsureDeployment"));
        assert!(types.contains(&"EnsureNetworkPolicy"));
    }

    #[test]
    fn director_role_gets_allow_egress_policy() {
        let layer = DecisionLayer::new();
        let actions = layer.decide(&State::initial(), &observed(json!({"role": "director"})));
        let policy = actions.iter().find(|a| a.action_type == "EnsureNetworkPolicy").unwrap();
        assert_eq!(policy.params["policy_type"], "allow-egress");
    }

    #[test]
    fn worker_role_gets_deny_egress_policy() {
        let layer = DecisionLayer::new();
        let actions = layer.decide(&State::initial(), &observed(json!({"role": "worker"})));
        let policy = actions.iter().find(|a| a.action_type == "EnsureNetworkPolicy").unwrap();
        assert_eq!(policy.params["policy_type"], "deny-egress");
    }

    #[test]
    fn actions_are_sorted_deterministically() {
        let layer = DecisionLayer::new();
        let actions = layer.decide(&State::initial(), &observed(json!({})));
        let mut sorted = actions.clone();
        sorted.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
        assert_eq!(actions, sorted);
    }

    #[test]
    fn action_applied_and_failed_produce_no_actions() {
        let layer = DecisionLayer::new();
        let applied = Event::new("ActionApplied", "universe", 0, json!({})).with_seq(1);
        let failed = Event::new("ActionFailed", "universe", 1, json!({})).with_seq(2);
        assert!(layer.decide(&State::initial(), &applied).is_empty());
        assert!(layer.decide(&State::initial(), &failed).is_empty());
    }
}
