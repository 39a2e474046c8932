//! The external resource API the executor applies actions against,
//! abstracted so the core never depends on a live Kubernetes client.

use crate::error::ApiError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// The four resource kinds the decision layer ensures.
#[async_trait]
pub trait ResourceApi: Send + Sync {
    /// Whether this backend is actually reachable. `false` short-circuits
    /// every `ensure_*` call to a `NO_API` skip outcome, mirroring the
    /// original's "K8s API client init failed" fallback.
    fn available(&self) -> bool {
        true
    }

    /// Create a `ConfigMap`. `Err` with `status: Some(409)` means it already
    /// exists.
    async fn create_config_map(&self, namespace: &str, name: &str, data: &Value) -> Result<(), ApiError>;
    /// Read a `ConfigMap`'s `data` map.
    async fn read_config_map(&self, namespace: &str, name: &str) -> Result<Value, ApiError>;
    /// Patch an existing `ConfigMap`'s `data` map.
    async fn patch_config_map(&self, namespace: &str, name: &str, data: &Value) -> Result<(), ApiError>;

    /// Create a `PersistentVolumeClaim`.
    async fn create_pvc(
        &self,
        namespace: &str,
        name: &str,
        size: &str,
        storage_class: Option<&str>,
    ) -> Result<(), ApiError>;
    /// Read a PVC's normalized `{size, storage_class}` spec.
    async fn read_pvc(&self, namespace: &str, name: &str) -> Result<Value, ApiError>;

    /// Create a `Deployment`.
    async fn create_deployment(&self, namespace: &str, name: &str, spec: &Value) -> Result<(), ApiError>;
    /// Read a Deployment's normalized spec.
    async fn read_deployment(&self, namespace: &str, name: &str) -> Result<Value, ApiError>;
    /// Patch an existing Deployment.
    async fn patch_deployment(&self, namespace: &str, name: &str, spec: &Value) -> Result<(), ApiError>;

    /// Create a `NetworkPolicy`.
    async fn create_network_policy(
        &self,
        namespace: &str,
        name: &str,
        pod_selector: &Value,
        policy_type: &str,
    ) -> Result<(), ApiError>;
    /// Read a NetworkPolicy's normalized `{pod_selector, policy_type}` spec.
    async fn read_network_policy(&self, namespace: &str, name: &str) -> Result<Value, ApiError>;
    /// Patch an existing NetworkPolicy.
    async fn patch_network_policy(
        &self,
        namespace: &str,
        name: &str,
        pod_selector: &Value,
        policy_type: &str,
    ) -> Result<(), ApiError>;
}

/// A `ResourceApi` that is never reachable. Every `ensure_*` call in
/// [`crate::executor::ExecutorLayer`] short-circuits to a `NO_API` skip
/// outcome without this trait's methods ever being invoked, matching the
/// original engine's behavior when its Kubernetes client fails to
/// initialize (e.g. running outside a cluster).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullResourceApi;

#[async_trait]
impl ResourceApi for NullResourceApi {
    fn available(&self) -> bool {
        false
    }

    async fn create_config_map(&self, _: &str, _: &str, _: &Value) -> Result<(), ApiError> {
        Err(ApiError::opaque("Unavailable"))
    }
    async fn read_config_map(&self, _: &str, _: &str) -> Result<Value, ApiError> {
        Err(ApiError::opaque("Unavailable"))
    }
    async fn patch_config_map(&self, _: &str, _: &str, _: &Value) -> Result<(), ApiError> {
        Err(ApiError::opaque("Unavailable"))
    }
    async fn create_pvc(&self, _: &str, _: &str, _: &str, _: Option<&str>) -> Result<(), ApiError> {
        Err(ApiError::opaque("Unavailable"))
    }
    async fn read_pvc(&self, _: &str, _: &str) -> Result<Value, ApiError> {
        Err(ApiError::opaque("Unavailable"))
    }
    async fn create_deployment(&self, _: &str, _: &str, _: &Value) -> Result<(), ApiError> {
        Err(ApiError::opaque("Unavailable"))
    }
    async fn read_deployment(&self, _: &str, _: &str) -> Result<Value, ApiError> {
        Err(ApiError::opaque("Unavailable"))
    }
    async fn patch_deployment(&self, _: &str, _: &str, _: &Value) -> Result<(), ApiError> {
        Err(ApiError::opaque("Unavailable"))
    }
    async fn create_network_policy(&self, _: &str, _: &str, _: &Value, _: &str) -> Result<(), ApiError> {
        Err(ApiError::opaque("Unavailable"))
    }
    async fn read_network_policy(&self, _: &str, _: &str) -> Result<Value, ApiError> {
        Err(ApiError::opaque("Unavailable"))
    }
    async fn patch_network_policy(&self, _: &str, _: &str, _: &Value, _: &str) -> Result<(), ApiError> {
        Err(ApiError::opaque("Unavailable"))
    }
}

/// An in-memory resource table, for tests that need to exercise
/// create/conflict/patch/noop semantics without a real cluster.
#[derive(Debug, Default)]
pub struct FakeResourceApi {
    config_maps: Mutex<HashMap<String, Value>>,
    pvcs: Mutex<HashMap<String, Value>>,
    deployments: Mutex<HashMap<String, Value>>,
    network_policies: Mutex<HashMap<String, Value>>,
}

impl FakeResourceApi {
    /// An empty resource table.
    pub fn new() -> Self {
        FakeResourceApi::default()
    }

    fn key(namespace: &str, name: &str) -> String {
        format!("{namespace}/{name}")
    }
}

#[async_trait]
impl ResourceApi for FakeResourceApi {
    async fn create_config_map(&self, namespace: &str, name: &str, data: &Value) -> Result<(), ApiError> {
        let mut map = self.config_maps.lock().expect("lock poisoned");
        let key = Self::key(namespace, name);
        if map.contains_key(&key) {
            return Err(ApiError::with_status("ApiException", 409, "AlreadyExists"));
        }
        map.insert(key, data.clone());
        Ok(())
    }

    async fn read_config_map(&self, namespace: &str, name: &str) -> Result<Value, ApiError> {
        let map = self.config_maps.lock().expect("lock poisoned");
        map.get(&Self::key(namespace, name))
            .cloned()
            .ok_or_else(|| ApiError::with_status("ApiException", 404, "NotFound"))
    }

    async fn patch_config_map(&self, namespace: &str, name: &str, data: &Value) -> Result<(), ApiError> {
        let mut map = self.config_maps.lock().expect("lock poisoned");
        map.insert(Self::key(namespace, name), data.clone());
        Ok(())
    }

    async fn create_pvc(
        &self,
        namespace: &str,
        name: &str,
        size: &str,
        storage_class: Option<&str>,
    ) -> Result<(), ApiError> {
        let mut map = self.pvcs.lock().expect("lock poisoned");
        let key = Self::key(namespace, name);
        if map.contains_key(&key) {
            return Err(ApiError::with_status("ApiException", 409, "AlreadyExists"));
        }
        map.insert(
            key,
            serde_json::json!({"size": size, "storage_class": storage_class}),
        );
        Ok(())
    }

    async fn read_pvc(&self, namespace: &str, name: &str) -> Result<Value, ApiError> {
        let map = self.pvcs.lock().expect("lock poisoned");
        map.get(&Self::key(namespace, name))
            .cloned()
            .ok_or_else(|| ApiError::with_status("ApiException", 404, "NotFound"))
    }

    async fn create_deployment(&self, namespace: &str, name: &str, spec: &Value) -> Result<(), ApiError> {
        let mut map = self.deployments.lock().expect("lock poisoned");
        let key = Self::key(namespace, name);
        if map.contains_key(&key) {
            return Err(ApiError::with_status("ApiException", 409, "AlreadyExists"));
        }
        map.insert(key, spec.clone());
        Ok(())
    }

    async fn read_deployment(&self, namespace: &str, name: &str) -> Result<Value, ApiError> {
        let map = self.deployments.lock().expect("lock poisoned");
        map.get(&Self::key(namespace, name))
            .cloned()
            .ok_or_else(|| ApiError::with_status("ApiException", 404, "NotFound"))
    }

    async fn patch_deployment(&self, namespace: &str, name: &str, spec: &Value) -> Result<(), ApiError> {
        let mut map = self.deployments.lock().expect("lock poisoned");
        map.insert(Self::key(namespace, name), spec.clone());
        Ok(())
    }

    async fn create_network_policy(
        &self,
        namespace: &str,
        name: &str,
        pod_selector: &Value,
        policy_type: &str,
    ) -> Result<(), ApiError> {
        let mut map = self.network_policies.lock().expect("lock poisoned");
        let key = Self::key(namespace, name);
        if map.contains_key(&key) {
            return Err(ApiError::with_status("ApiException", 409, "AlreadyExists"));
        }
        map.insert(
            key,
            serde_json::json!({"pod_selector": pod_selector, "policy_type": policy_type}),
        );
        Ok(())
    }

    async fn read_network_policy(&self, namespace: &str, name: &str) -> Result<Value, ApiError> {
        let map = self.network_policies.lock().expect("lock poisoned");
        map.get(&Self::key(namespace, name))
            .cloned()
            .ok_or_else(|| ApiError::with_status("ApiException", 404, "NotFound"))
    }

    async fn patch_network_policy(
        &self,
        namespace: &str,
        name: &str,
        pod_selector: &Value,
        policy_type: &str,
    ) -> Result<(), ApiError> {
        let mut map = self.network_policies.lock().expect("lock poisoned");
        map.insert(
            Self::key(namespace, name),
            serde_json::json!({"pod_selector": pod_selector, "policy_type": policy_type}),
        );
        Ok(())
    }
}
