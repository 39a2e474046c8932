//! Applying decided actions to the external resource API and logging
//! `ActionApplied`/`ActionFailed` feedback events.
//!
//! Grounded in `operator/universe_operator/executor_layer.py::ExecutorLayer`.
//! This is the only place in the engine where side effects happen; it is
//! kept as small and mechanical as possible so the rest of the pipeline
//! stays pure and replayable.

use crate::error::{stable_error, ApiError, ExecutorError};
use crate::normalize::{hash_obj, normalize_deployment_spec, normalize_network_policy_spec, normalize_pvc_spec};
use crate::resource_api::ResourceApi;
use rynxs_adapter::DeterministicClock;
use rynxs_decision::Action;
use rynxs_events::{ActionAppliedPayload, ActionFailedPayload, Event};
use rynxs_store_core::EventStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// The outcome of applying a single action against the resource API.
struct ApplyOutcome {
    resource_ref: String,
    operation: &'static str,
    noop: bool,
    status_code: i64,
    reason_code: &'static str,
    desired_hash: String,
    observed_hash: Option<String>,
}

/// Applies decided actions and appends feedback events describing the
/// outcome of each.
pub struct ExecutorLayer {
    store: Arc<dyn EventStore>,
    clock: DeterministicClock,
    resource_api: Arc<dyn ResourceApi>,
    leader_elector: Option<Arc<dyn crate::leader::LeaderElector>>,
    writer_id: Option<String>,
}

impl ExecutorLayer {
    /// Build an executor writing feedback to `store`, applying actions
    /// against `resource_api`, with no leadership check (single-instance
    /// use) and no writer-id tag.
    pub fn new(store: Arc<dyn EventStore>, clock: DeterministicClock, resource_api: Arc<dyn ResourceApi>) -> Self {
        ExecutorLayer {
            store,
            clock,
            resource_api,
            leader_elector: None,
            writer_id: None,
        }
    }

    /// Attach a leadership check, consulted immediately after each
    /// side-effecting call (see [`crate::leader::LeaderElector`]).
    pub fn with_leader_elector(mut self, elector: Arc<dyn crate::leader::LeaderElector>) -> Self {
        self.leader_elector = Some(elector);
        self
    }

    /// Tag every feedback event's metadata with `writer_id`, for
    /// multi-writer deployments distinguishing which process emitted which
    /// feedback.
    pub fn with_writer_id(mut self, writer_id: impl Into<String>) -> Self {
        self.writer_id = Some(writer_id.into());
        self
    }

    fn meta_with_writer(&self, mut meta: Value) -> Value {
        if let Some(writer_id) = &self.writer_id {
            if let Value::Object(map) = &mut meta {
                map.entry("writer_id").or_insert_with(|| Value::String(writer_id.clone()));
            }
        }
        meta
    }

    /// Apply every action in `actions`, in order, appending one feedback
    /// event per action unless leadership is lost mid-sequence (in which
    /// case remaining actions are abandoned and no event is logged for the
    /// action that triggered the check).
    pub async fn apply(&mut self, actions: &[Action]) -> Result<Vec<Event>, ExecutorError> {
        let mut feedback = Vec::with_capacity(actions.len());

        for action in actions {
            let action_id = action.id()?;

            match self.apply_action(action).await {
                Ok(outcome) => {
                    // Post-apply leadership check: detects late leadership
                    // loss after the side effect already landed. This is a
                    // mitigation, not a fence — a lease can still expire in
                    // the window between the side effect and this check.
                    if let Some(elector) = &self.leader_elector {
                        if !elector.is_leader() {
                            warn!(
                                action_type = %action.action_type,
                                "leadership lost after applying action, aborting remaining actions"
                            );
                            break;
                        }
                    }

                    self.clock = self.clock.tick(1);
                    let payload = ActionAppliedPayload {
                        action_id,
                        action_type: action.action_type.clone(),
                        target: action.target.clone(),
                        status: "success".to_string(),
                        result_code: outcome.reason_code.to_string(),
                        resource_ref: outcome.resource_ref,
                        operation: outcome.operation.to_string(),
                        noop: outcome.noop,
                        status_code: outcome.status_code,
                        desired_hash: outcome.desired_hash,
                        observed_hash: outcome.observed_hash,
                    };
                    let payload = serde_json::to_value(payload).expect("ActionAppliedPayload always serializes to Value");
                    let meta = self.meta_with_writer(json!({"executor": "k8s"}));
                    let event = Event::new("ActionApplied", action.target.clone(), self.clock.now(), payload)
                        .with_meta(meta);
                    let result = self.store.append_with_retry(event).await?;
                    info!(action_type = %action.action_type, target = %action.target, "action applied");
                    feedback.push(result.event);
                }
                Err(api_err) => {
                    let stable = stable_error(&api_err);
                    let desired_hash = self.desired_hash(action)?;
                    let resource_ref = resource_ref(action);

                    self.clock = self.clock.tick(1);
                    let payload = ActionFailedPayload {
                        action_id,
                        action_type: action.action_type.clone(),
                        target: action.target.clone(),
                        resource_ref,
                        desired_hash,
                        result_code: stable.code.clone(),
                        error: serde_json::to_value(&stable).expect("StableError always serializes to Value"),
                    };
                    let payload = serde_json::to_value(payload).expect("ActionFailedPayload always serializes to Value");
                    let meta = self.meta_with_writer(json!({"executor": "k8s"}));
                    let event = Event::new("ActionFailed", action.target.clone(), self.clock.now(), payload)
                        .with_meta(meta);
                    let result = self.store.append_with_retry(event).await?;
                    feedback.push(result.event);
                }
            }
        }

        Ok(feedback)
    }

    fn desired_hash(&self, action: &Action) -> Result<String, ExecutorError> {
        let hash = match action.action_type.as_str() {
            "EnsureDeployment" => {
                let spec = action.params.get("spec").cloned().unwrap_or(Value::Null);
                hash_obj(&normalize_deployment_spec(&spec))?
            }
            "EnsureNetworkPolicy" => hash_obj(&normalize_network_policy_spec(&action.params))?,
            "EnsureConfigMap" => {
                let data = action.params.get("data").cloned().unwrap_or(Value::Null);
                hash_obj(&data)?
            }
            "EnsurePVC" => hash_obj(&normalize_pvc_spec(&action.params))?,
            _ => hash_obj(&action.params)?,
        };
        Ok(hash)
    }

    async fn apply_action(&self, action: &Action) -> Result<ApplyOutcome, ApiError> {
        match action.action_type.as_str() {
            "EnsureConfigMap" => self.ensure_config_map(action).await,
            "EnsurePVC" => self.ensure_pvc(action).await,
            "EnsureDeployment" => self.ensure_deployment(action).await,
            "EnsureNetworkPolicy" => self.ensure_network_policy(action).await,
            other => Err(ApiError::opaque(format!("UnknownActionType({other})"))),
        }
    }

    async fn ensure_config_map(&self, action: &Action) -> Result<ApplyOutcome, ApiError> {
        let resource_ref = resource_ref(action);
        let desired_hash = self.desired_hash(action).map_err(|_| ApiError::opaque("CodecError"))?;

        if !self.resource_api.available() {
            return Ok(ApplyOutcome {
                resource_ref,
                operation: "skip",
                noop: true,
                status_code: 0,
                reason_code: "NO_API",
                desired_hash,
                observed_hash: None,
            });
        }

        let name = action.params["name"].as_str().unwrap_or_default();
        let namespace = action.params["namespace"].as_str().unwrap_or_default();
        let data = action.params.get("data").cloned().unwrap_or(Value::Null);

        match self.resource_api.create_config_map(namespace, name, &data).await {
            Ok(()) => Ok(ApplyOutcome {
                resource_ref,
                operation: "create",
                noop: false,
                status_code: 201,
                reason_code: "CREATED",
                desired_hash: desired_hash.clone(),
                observed_hash: Some(desired_hash),
            }),
            Err(err) if err.status == Some(409) => {
                let existing = self.resource_api.read_config_map(namespace, name).await?;
                let observed_hash = hash_obj(&existing).map_err(|_| ApiError::opaque("CodecError"))?;
                if observed_hash == desired_hash {
                    Ok(ApplyOutcome {
                        resource_ref,
                        operation: "noop",
                        noop: true,
                        status_code: 304,
                        reason_code: "ALREADY_MATCHED",
                        desired_hash,
                        observed_hash: Some(observed_hash),
                    })
                } else {
                    self.resource_api.patch_config_map(namespace, name, &data).await?;
                    Ok(ApplyOutcome {
                        resource_ref,
                        operation: "patch",
                        noop: false,
                        status_code: 200,
                        reason_code: "PATCHED",
                        desired_hash,
                        observed_hash: Some(observed_hash),
                    })
                }
            }
            Err(err) => Err(err),
        }
    }

    async fn ensure_pvc(&self, action: &Action) -> Result<ApplyOutcome, ApiError> {
        let resource_ref = resource_ref(action);
        let desired_hash = self.desired_hash(action).map_err(|_| ApiError::opaque("CodecError"))?;

        if !self.resource_api.available() {
            return Ok(ApplyOutcome {
                resource_ref,
                operation: "skip",
                noop: true,
                status_code: 0,
                reason_code: "NO_API",
                desired_hash,
                observed_hash: None,
            });
        }

        let name = action.params["name"].as_str().unwrap_or_default();
        let namespace = action.params["namespace"].as_str().unwrap_or_default();
        let size = action.params["size"].as_str().unwrap_or_default();
        let storage_class = action.params.get("storage_class").and_then(Value::as_str);

        match self.resource_api.create_pvc(namespace, name, size, storage_class).await {
            Ok(()) => Ok(ApplyOutcome {
                resource_ref,
                operation: "create",
                noop: false,
                status_code: 201,
                reason_code: "CREATED",
                desired_hash: desired_hash.clone(),
                observed_hash: Some(desired_hash),
            }),
            Err(err) if err.status == Some(409) => {
                // PVCs are immutable after creation: a conflict always means
                // "already exists", never "needs a patch".
                let existing = self.resource_api.read_pvc(namespace, name).await?;
                let observed_hash = hash_obj(&normalize_pvc_spec(&existing)).map_err(|_| ApiError::opaque("CodecError"))?;
                Ok(ApplyOutcome {
                    resource_ref,
                    operation: "noop",
                    noop: true,
                    status_code: 304,
                    reason_code: "IMMUTABLE_EXISTS",
                    desired_hash,
                    observed_hash: Some(observed_hash),
                })
            }
            Err(err) => Err(err),
        }
    }

    async fn ensure_deployment(&self, action: &Action) -> Result<ApplyOutcome, ApiError> {
        let resource_ref = resource_ref(action);
        let desired_hash = self.desired_hash(action).map_err(|_| ApiError::opaque("CodecError"))?;

        if !self.resource_api.available() {
            return Ok(ApplyOutcome {
                resource_ref,
                operation: "skip",
                noop: true,
                status_code: 0,
                reason_code: "NO_API",
                desired_hash,
                observed_hash: None,
            });
        }

        let name = action.params["name"].as_str().unwrap_or_default();
        let namespace = action.params["namespace"].as_str().unwrap_or_default();
        let spec = action.params.get("spec").cloned().unwrap_or(Value::Null);

        match self.resource_api.create_deployment(namespace, name, &spec).await {
            Ok(()) => Ok(ApplyOutcome {
                resource_ref,
                operation: "create",
                noop: false,
                status_code: 201,
                reason_code: "CREATED",
                desired_hash: desired_hash.clone(),
                observed_hash: Some(desired_hash),
            }),
            Err(err) if err.status == Some(409) => {
                let existing = self.resource_api.read_deployment(namespace, name).await?;
                let observed_hash =
                    hash_obj(&normalize_deployment_spec(&existing)).map_err(|_| ApiError::opaque("CodecError"))?;
                if observed_hash == desired_hash {
                    Ok(ApplyOutcome {
                        resource_ref,
                        operation: "noop",
                        noop: true,
                        status_code: 304,
                        reason_code: "ALREADY_MATCHED",
                        desired_hash,
                        observed_hash: Some(observed_hash),
                    })
                } else {
                    self.resource_api.patch_deployment(namespace, name, &spec).await?;
                    Ok(ApplyOutcome {
                        resource_ref,
                        operation: "patch",
                        noop: false,
                        status_code: 200,
                        reason_code: "PATCHED",
                        desired_hash,
                        observed_hash: Some(observed_hash),
                    })
                }
            }
            Err(err) => Err(err),
        }
    }

    async fn ensure_network_policy(&self, action: &Action) -> Result<ApplyOutcome, ApiError> {
        let resource_ref = resource_ref(action);
        let desired_hash = self.desired_hash(action).map_err(|_| ApiError::opaque("CodecError"))?;

        if !self.resource_api.available() {
            return Ok(ApplyOutcome {
                resource_ref,
                operation: "skip",
                noop: true,
                status_code: 0,
                reason_code: "NO_API",
                desired_hash,
                observed_hash: None,
            });
        }

        let name = action.params["name"].as_str().unwrap_or_default();
        let namespace = action.params["namespace"].as_str().unwrap_or_default();
        let pod_selector = action.params.get("pod_selector").cloned().unwrap_or(Value::Null);
        let policy_type = action.params["policy_type"].as_str().unwrap_or_default();

        match self
            .resource_api
            .create_network_policy(namespace, name, &pod_selector, policy_type)
            .await
        {
            Ok(()) => Ok(ApplyOutcome {
                resource_ref,
                operation: "create",
                noop: false,
                status_code: 201,
                reason_code: "CREATED",
                desired_hash: desired_hash.clone(),
                observed_hash: Some(desired_hash),
            }),
            Err(err) if err.status == Some(409) => {
                let existing = self.resource_api.read_network_policy(namespace, name).await?;
                let observed_hash =
                    hash_obj(&normalize_network_policy_spec(&existing)).map_err(|_| ApiError::opaque("CodecError"))?;
                if observed_hash == desired_hash {
                    Ok(ApplyOutcome {
                        resource_ref,
                        operation: "noop",
                        noop: true,
                        status_code: 304,
                        reason_code: "ALREADY_MATCHED",
                        desired_hash,
                        observed_hash: Some(observed_hash),
                    })
                } else {
                    self.resource_api
                        .patch_network_policy(namespace, name, &pod_selector, policy_type)
                        .await?;
                    Ok(ApplyOutcome {
                        resource_ref,
                        operation: "patch",
                        noop: false,
                        status_code: 200,
                        reason_code: "PATCHED",
                        desired_hash,
                        observed_hash: Some(observed_hash),
                    })
                }
            }
            Err(err) => Err(err),
        }
    }
}

fn resource_ref(action: &Action) -> String {
    let kind = match action.action_type.as_str() {
        "EnsureConfigMap" => "ConfigMap",
        "EnsurePVC" => "PersistentVolumeClaim",
        "EnsureDeployment" => "Deployment",
        "EnsureNetworkPolicy" => "NetworkPolicy",
        _ => "Unknown",
    };
    let name = action.params.get("name").and_then(Value::as_str).unwrap_or_default();
    let namespace = action.params.get("namespace").and_then(Value::as_str).unwrap_or_default();
    format!("{kind}/{namespace}/{name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource_api::{FakeResourceApi, NullResourceApi};
    use rynxs_store_core::MemoryEventStore;

    fn cm_action() -> Action {
        Action::ensure_config_map("a-spec", "ns", json!({"agent.json": "{}"}))
    }

    #[tokio::test]
    async fn null_resource_api_yields_no_api_skip() {
        let store: Arc<dyn EventStore> = Arc::new(MemoryEventStore::new());
        let mut executor = ExecutorLayer::new(store, DeterministicClock::new(), Arc::new(NullResourceApi));

        let feedback = executor.apply(&[cm_action()]).await.unwrap();
        assert_eq!(feedback.len(), 1);
        assert_eq!(feedback[0].event_type, "ActionApplied");
        assert_eq!(feedback[0].payload["result_code"], "NO_API");
    }

    #[tokio::test]
    async fn first_apply_creates_then_second_is_noop() {
        let store: Arc<dyn EventStore> = Arc::new(MemoryEventStore::new());
        let api = Arc::new(FakeResourceApi::new());
        let mut executor = ExecutorLayer::new(store, DeterministicClock::new(), api);

        let first = executor.apply(&[cm_action()]).await.unwrap();
        assert_eq!(first[0].payload["result_code"], "CREATED");

        let second = executor.apply(&[cm_action()]).await.unwrap();
        assert_eq!(second[0].payload["result_code"], "ALREADY_MATCHED");
    }

    #[tokio::test]
    async fn differing_params_trigger_a_patch() {
        let store: Arc<dyn EventStore> = Arc::new(MemoryEventStore::new());
        let api = Arc::new(FakeResourceApi::new());
        let mut executor = ExecutorLayer::new(store, DeterministicClock::new(), api);

        executor.apply(&[cm_action()]).await.unwrap();

        let changed = Action::ensure_config_map("a-spec", "ns", json!({"agent.json": "{\"x\":1}"}));
        let second = executor.apply(&[changed]).await.unwrap();
        assert_eq!(second[0].payload["result_code"], "PATCHED");
    }

    #[tokio::test]
    async fn pvc_conflict_is_always_immutable_exists() {
        let store: Arc<dyn EventStore> = Arc::new(MemoryEventStore::new());
        let api = Arc::new(FakeResourceApi::new());
        let mut executor = ExecutorLayer::new(store, DeterministicClock::new(), api);

        let action = Action::ensure_pvc("a-workspace", "ns", "1Gi", None);
        executor.apply(&[action.clone()]).await.unwrap();
        let second = executor.apply(&[action]).await.unwrap();
        assert_eq!(second[0].payload["result_code"], "IMMUTABLE_EXISTS");
    }

    struct NeverLeader;
    impl crate::leader::LeaderElector for NeverLeader {
        fn is_leader(&self) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn losing_leadership_after_apply_aborts_without_logging_success() {
        let store: Arc<dyn EventStore> = Arc::new(MemoryEventStore::new());
        let api = Arc::new(FakeResourceApi::new());
        let mut executor = ExecutorLayer::new(store, DeterministicClock::new(), api)
            .with_leader_elector(Arc::new(NeverLeader));

        let feedback = executor.apply(&[cm_action()]).await.unwrap();
        assert!(feedback.is_empty());
    }
}
