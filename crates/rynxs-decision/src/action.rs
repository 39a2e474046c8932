//! The `Action` type the decision layer emits and the executor consumes.

use rynxs_types::canonical::{canonical_string, canonicalize};
use rynxs_types::ids::stable_id;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One unit of desired, idempotent work for the executor to reconcile
/// against the external resource API.
///
/// `action_type` and `target` (`namespace/name`) identify *what* to ensure;
/// `params` carries the desired shape. Two `Action`s with the same
/// `action_type`, `target`, and canonical `params` always produce the same
/// [`Action::id`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// `EnsureConfigMap`, `EnsurePVC`, `EnsureDeployment`, `EnsureNetworkPolicy`.
    pub action_type: String,
    /// `namespace/name` of the resource this action ensures.
    pub target: String,
    /// Action-type-specific desired parameters.
    pub params: Value,
}

impl Action {
    /// `stable_id(action_type, target, canonical_json(params))` — a
    /// fingerprint stable across replays and equal for two actions that
    /// describe the same desired resource state.
    pub fn id(&self) -> Result<String, rynxs_types::canonical::CodecError> {
        let canonical = canonicalize(&self.params)?;
        let params_json = canonical_string(&canonical)?;
        Ok(stable_id(&[&self.action_type, &self.target, &params_json]))
    }

    /// Ensure a `ConfigMap` named `{namespace}/{name}` exists with `data`.
    pub fn ensure_config_map(name: &str, namespace: &str, data: Value) -> Action {
        Action {
            action_type: "EnsureConfigMap".to_string(),
            target: format!("{namespace}/{name}"),
            params: json!({"name": name, "namespace": namespace, "data": data}),
        }
    }

    /// Ensure a `PersistentVolumeClaim` named `{namespace}/{name}` exists.
    pub fn ensure_pvc(name: &str, namespace: &str, size: &str, storage_class: Option<&str>) -> Action {
        let mut params = json!({"name": name, "namespace": namespace, "size": size});
        if let Some(sc) = storage_class {
            params["storage_class"] = Value::String(sc.to_string());
        }
        Action {
            action_type: "EnsurePVC".to_string(),
            target: format!("{namespace}/{name}"),
            params,
        }
    }

    /// Ensure a `Deployment` named `{namespace}/{name}` exists with `spec`.
    pub fn ensure_deployment(name: &str, namespace: &str, spec: Value) -> Action {
        Action {
            action_type: "EnsureDeployment".to_string(),
            target: format!("{namespace}/{name}"),
            params: json!({"name": name, "namespace": namespace, "spec": spec}),
        }
    }

    /// Ensure a `NetworkPolicy` named `{namespace}/{name}` exists.
    pub fn ensure_network_policy(
        name: &str,
        namespace: &str,
        pod_selector: Value,
        policy_type: &str,
    ) -> Action {
        Action {
            action_type: "EnsureNetworkPolicy".to_string(),
            target: format!("{namespace}/{name}"),
            params: json!({
                "name": name,
                "namespace": namespace,
                "pod_selector": pod_selector,
                "policy_type": policy_type,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_stable_across_identical_actions() {
        let a = Action::ensure_config_map("x-spec", "ns", json!({"agent.json": "{}"}));
        let b = Action::ensure_config_map("x-spec", "ns", json!({"agent.json": "{}"}));
        assert_eq!(a.id().unwrap(), b.id().unwrap());
    }

    #[test]
    fn id_differs_when_params_differ() {
        let a = Action::ensure_config_map("x-spec", "ns", json!({"agent.json": "{}"}));
        let b = Action::ensure_config_map("x-spec", "ns", json!({"agent.json": "{\"a\":1}"}));
        assert_ne!(a.id().unwrap(), b.id().unwrap());
    }
}
