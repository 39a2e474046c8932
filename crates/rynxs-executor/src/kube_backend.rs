//! A live Kubernetes-backed [`ResourceApi`], behind the `kube-backend`
//! feature.
//!
//! Grounded in `executor_layer.py`'s use of `client.CoreV1Api`,
//! `client.AppsV1Api`, and `client.NetworkingV1Api` — `kube` + `k8s-openapi`
//! are the idiomatic Rust equivalent of the original's `kubernetes` Python
//! client. This module is supplementary plumbing: it introduces no new
//! decision or executor semantics, only a backend that actually talks to a
//! cluster.

use crate::error::ApiError;
use crate::normalize::normalize_deployment_spec;
use crate::resource_api::ResourceApi;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Capabilities, ConfigMap, ConfigMapVolumeSource, Container, EnvVar,
    PersistentVolumeClaim, PersistentVolumeClaimSpec, PersistentVolumeClaimVolumeSource, PodSpec,
    PodTemplateSpec, ResourceRequirements, SecurityContext, Volume, VolumeMount,
};
use k8s_openapi::api::networking::v1::{NetworkPolicy, NetworkPolicyEgressRule, NetworkPolicySpec};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::api::{Patch, PatchParams, PostParams};
use kube::{Api, Client};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// A [`ResourceApi`] that applies actions against a real cluster through a
/// `kube::Client`.
pub struct KubeResourceApi {
    client: Client,
}

impl KubeResourceApi {
    /// Wrap an already-initialized client. Building the client itself (the
    /// equivalent of the original's try/except around `client.CoreV1Api()`)
    /// is the caller's responsibility, so a connection failure can be
    /// handled the same way the original falls back to `NullResourceApi`.
    pub fn new(client: Client) -> Self {
        KubeResourceApi { client }
    }

    fn config_maps(&self, namespace: &str) -> Api<ConfigMap> {
        Api::namespaced(self.client.clone(), namespace)
    }
    fn pvcs(&self, namespace: &str) -> Api<PersistentVolumeClaim> {
        Api::namespaced(self.client.clone(), namespace)
    }
    fn deployments(&self, namespace: &str) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), namespace)
    }
    fn network_policies(&self, namespace: &str) -> Api<NetworkPolicy> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn build_pod_spec(spec: &Value) -> PodSpec {
        let env: Vec<EnvVar> = spec
            .get("env")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .map(|e| EnvVar {
                name: e.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
                value: e.get("value").and_then(Value::as_str).map(str::to_string),
                ..Default::default()
            })
            .collect();

        let volume_mounts: Vec<VolumeMount> = spec
            .get("volume_mounts")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .map(|vm| VolumeMount {
                name: vm.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
                mount_path: vm.get("mount_path").and_then(Value::as_str).unwrap_or_default().to_string(),
                read_only: vm.get("read_only").and_then(Value::as_bool),
                ..Default::default()
            })
            .collect();

        let volumes: Vec<Volume> = spec
            .get("volumes")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|vol| {
                let name = vol.get("name").and_then(Value::as_str)?.to_string();
                if let Some(pvc) = vol.get("pvc").and_then(Value::as_str) {
                    Some(Volume {
                        name,
                        persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                            claim_name: pvc.to_string(),
                            ..Default::default()
                        }),
                        ..Default::default()
                    })
                } else {
                    vol.get("configmap").and_then(Value::as_str).map(|cm| Volume {
                        name,
                        config_map: Some(ConfigMapVolumeSource {
                            name: Some(cm.to_string()),
                            ..Default::default()
                        }),
                        ..Default::default()
                    })
                }
            })
            .collect();

        let container = Container {
            name: "runtime".to_string(),
            image: spec.get("image").and_then(Value::as_str).map(str::to_string),
            env: Some(env),
            volume_mounts: Some(volume_mounts),
            security_context: Some(SecurityContext {
                run_as_non_root: Some(true),
                read_only_root_filesystem: Some(true),
                allow_privilege_escalation: Some(false),
                capabilities: Some(Capabilities {
                    drop: Some(vec!["ALL".to_string()]),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };

        PodSpec {
            runtime_class_name: Some(
                spec.get("runtime_class")
                    .and_then(Value::as_str)
                    .unwrap_or("gvisor")
                    .to_string(),
            ),
            containers: vec![container],
            volumes: Some(volumes),
            ..Default::default()
        }
    }

    fn policy_type_parts(policy_type: &str) -> Result<(Vec<String>, Vec<NetworkPolicyEgressRule>), ApiError> {
        match policy_type {
            "allow-egress" => Ok((vec!["Egress".to_string()], vec![NetworkPolicyEgressRule::default()])),
            "deny-egress" => Ok((vec!["Egress".to_string()], Vec::new())),
            other => Err(ApiError::opaque(format!("UnknownPolicyType({other})"))),
        }
    }
}

fn map_err(err: kube::Error) -> ApiError {
    match err {
        kube::Error::Api(resp) => ApiError::with_status("ApiException", resp.code as i64, resp.reason),
        other => ApiError::opaque(format!("{other:?}")),
    }
}

fn value_to_string_map(value: &Value) -> BTreeMap<String, String> {
    value
        .as_object()
        .map(|m| {
            m.iter()
                .map(|(k, v)| (k.clone(), v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

fn string_map_to_value(map: &BTreeMap<String, String>) -> Value {
    Value::Object(map.iter().map(|(k, v)| (k.clone(), Value::String(v.clone()))).collect())
}

#[async_trait]
impl ResourceApi for KubeResourceApi {
    async fn create_config_map(&self, namespace: &str, name: &str, data: &Value) -> Result<(), ApiError> {
        let cm = ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            data: Some(value_to_string_map(data)),
            ..Default::default()
        };
        self.config_maps(namespace)
            .create(&PostParams::default(), &cm)
            .await
            .map(|_| ())
            .map_err(map_err)
    }

    async fn read_config_map(&self, namespace: &str, name: &str) -> Result<Value, ApiError> {
        let cm = self.config_maps(namespace).get(name).await.map_err(map_err)?;
        Ok(string_map_to_value(&cm.data.unwrap_or_default()))
    }

    async fn patch_config_map(&self, namespace: &str, name: &str, data: &Value) -> Result<(), ApiError> {
        let patch = json!({"data": data});
        self.config_maps(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map(|_| ())
            .map_err(map_err)
    }

    async fn create_pvc(
        &self,
        namespace: &str,
        name: &str,
        size: &str,
        storage_class: Option<&str>,
    ) -> Result<(), ApiError> {
        let mut requests = BTreeMap::new();
        requests.insert("storage".to_string(), Quantity(size.to_string()));
        let pvc = PersistentVolumeClaim {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            spec: Some(PersistentVolumeClaimSpec {
                access_modes: Some(vec!["ReadWriteOnce".to_string()]),
                resources: Some(ResourceRequirements {
                    requests: Some(requests),
                    ..Default::default()
                }),
                storage_class_name: storage_class.map(str::to_string),
                ..Default::default()
            }),
            ..Default::default()
        };
        self.pvcs(namespace)
            .create(&PostParams::default(), &pvc)
            .await
            .map(|_| ())
            .map_err(map_err)
    }

    async fn read_pvc(&self, namespace: &str, name: &str) -> Result<Value, ApiError> {
        let pvc = self.pvcs(namespace).get(name).await.map_err(map_err)?;
        let spec = pvc.spec.unwrap_or_default();
        let size = spec
            .resources
            .as_ref()
            .and_then(|r| r.requests.as_ref())
            .and_then(|m| m.get("storage"))
            .map(|q| q.0.clone());
        Ok(json!({"size": size, "storage_class": spec.storage_class_name}))
    }

    async fn create_deployment(&self, namespace: &str, name: &str, spec: &Value) -> Result<(), ApiError> {
        let mut labels = BTreeMap::new();
        labels.insert("app".to_string(), "universe-agent".to_string());
        let replicas = spec.get("replicas").and_then(Value::as_i64).map(|r| r as i32);

        let dep = Deployment {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                labels: Some(labels.clone()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas,
                selector: LabelSelector {
                    match_labels: Some(labels.clone()),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels),
                        ..Default::default()
                    }),
                    spec: Some(Self::build_pod_spec(spec)),
                },
                ..Default::default()
            }),
            ..Default::default()
        };

        self.deployments(namespace)
            .create(&PostParams::default(), &dep)
            .await
            .map(|_| ())
            .map_err(map_err)
    }

    async fn read_deployment(&self, namespace: &str, name: &str) -> Result<Value, ApiError> {
        let dep = self.deployments(namespace).get(name).await.map_err(map_err)?;
        let spec = dep.spec.unwrap_or_default();
        let pod_spec = spec.template.spec.unwrap_or_default();
        let container = pod_spec.containers.first();

        let env: Vec<Value> = container
            .and_then(|c| c.env.as_ref())
            .into_iter()
            .flatten()
            .map(|e| json!({"name": e.name, "value": e.value}))
            .collect();

        let volume_mounts: Vec<Value> = container
            .and_then(|c| c.volume_mounts.as_ref())
            .into_iter()
            .flatten()
            .map(|vm| json!({"name": vm.name, "mount_path": vm.mount_path, "read_only": vm.read_only.unwrap_or(false)}))
            .collect();

        let volumes: Vec<Value> = pod_spec
            .volumes
            .iter()
            .flatten()
            .filter_map(|v| {
                if let Some(pvc) = &v.persistent_volume_claim {
                    Some(json!({"name": v.name, "pvc": pvc.claim_name}))
                } else {
                    v.config_map
                        .as_ref()
                        .and_then(|cm| cm.name.clone())
                        .map(|cm_name| json!({"name": v.name, "configmap": cm_name}))
                }
            })
            .collect();

        let observed = json!({
            "replicas": spec.replicas,
            "image": container.and_then(|c| c.image.clone()),
            "env": env,
            "runtime_class": pod_spec.runtime_class_name,
            "volume_mounts": volume_mounts,
            "volumes": volumes,
        });
        Ok(normalize_deployment_spec(&observed))
    }

    async fn patch_deployment(&self, namespace: &str, name: &str, spec: &Value) -> Result<(), ApiError> {
        let mut labels = BTreeMap::new();
        labels.insert("app".to_string(), "universe-agent".to_string());
        let pod_spec = Self::build_pod_spec(spec);
        let pod_spec_json =
            serde_json::to_value(&pod_spec).map_err(|e| ApiError::opaque(format!("CodecError({e})")))?;
        let patch = json!({
            "spec": {
                "replicas": spec.get("replicas").and_then(Value::as_i64),
                "template": {
                    "metadata": {"labels": labels},
                    "spec": pod_spec_json,
                },
            }
        });
        self.deployments(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map(|_| ())
            .map_err(map_err)
    }

    async fn create_network_policy(
        &self,
        namespace: &str,
        name: &str,
        pod_selector: &Value,
        policy_type: &str,
    ) -> Result<(), ApiError> {
        let (policy_types, egress) = Self::policy_type_parts(policy_type)?;
        let match_labels = value_to_string_map(pod_selector);
        let np = NetworkPolicy {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            spec: Some(NetworkPolicySpec {
                pod_selector: LabelSelector {
                    match_labels: Some(match_labels),
                    ..Default::default()
                },
                policy_types: Some(policy_types),
                egress: Some(egress),
                ..Default::default()
            }),
        };
        self.network_policies(namespace)
            .create(&PostParams::default(), &np)
            .await
            .map(|_| ())
            .map_err(map_err)
    }

    async fn read_network_policy(&self, namespace: &str, name: &str) -> Result<Value, ApiError> {
        let np = self.network_policies(namespace).get(name).await.map_err(map_err)?;
        let spec = np.spec.unwrap_or_default();
        let policy_types = spec.policy_types.unwrap_or_default();
        let egress = spec.egress.unwrap_or_default();
        let policy_type = if policy_types.iter().any(|t| t == "Egress") {
            if egress.is_empty() {
                "deny-egress"
            } else {
                "allow-egress"
            }
        } else {
            "unknown"
        };
        let pod_selector = string_map_to_value(&spec.pod_selector.match_labels.unwrap_or_default());
        Ok(json!({"pod_selector": pod_selector, "policy_type": policy_type}))
    }

    async fn patch_network_policy(
        &self,
        namespace: &str,
        name: &str,
        pod_selector: &Value,
        policy_type: &str,
    ) -> Result<(), ApiError> {
        let (policy_types, egress) = Self::policy_type_parts(policy_type)?;
        let match_labels = value_to_string_map(pod_selector);
        let patch = json!({
            "spec": {
                "podSelector": {"matchLabels": match_labels},
                "policyTypes": policy_types,
                "egress": egress,
            }
        });
        self.network_policies(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map(|_| ())
            .map_err(map_err)
    }
}
