//! Normalizing desired/observed resource shapes before hashing, so that
//! fields the executor itself fills in deterministically (or that survive
//! round-tripping through the resource API in a different order) never
//! cause a false "drifted" result.
//!
//! Grounded in `executor_layer.py`'s `_normalize_*_spec` helpers.

use rynxs_types::canonical::{canonical_bytes, canonicalize, CodecError};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// `SHA-256(canonical_json(obj))`, hex-encoded. `obj` is treated as `{}`
/// when `Value::Null`, matching the original's `obj if obj is not None else {}`.
pub fn hash_obj(obj: &Value) -> Result<String, CodecError> {
    let obj = if obj.is_null() {
        Value::Object(Default::default())
    } else {
        obj.clone()
    };
    let canon = canonicalize(&obj)?;
    let bytes = canonical_bytes(&canon)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Strip `image_verify` (an executor-only hint, not part of the resource's
/// identity) and sort `env`/`volume_mounts`/`volumes` by stable keys so
/// list-ordering nondeterminism never drifts the hash.
pub fn normalize_deployment_spec(spec: &Value) -> Value {
    let mut spec = match spec {
        Value::Object(m) => m.clone(),
        _ => serde_json::Map::new(),
    };
    spec.remove("image_verify");

    if let Some(Value::Array(mut env)) = spec.remove("env") {
        env.sort_by_key(|e| e.get("name").and_then(Value::as_str).unwrap_or("").to_string());
        spec.insert("env".to_string(), Value::Array(env));
    } else {
        spec.insert("env".to_string(), Value::Array(Vec::new()));
    }

    if let Some(Value::Array(mut mounts)) = spec.remove("volume_mounts") {
        mounts.sort_by_key(|v| {
            (
                v.get("name").and_then(Value::as_str).unwrap_or("").to_string(),
                v.get("mount_path").and_then(Value::as_str).unwrap_or("").to_string(),
            )
        });
        spec.insert("volume_mounts".to_string(), Value::Array(mounts));
    } else {
        spec.insert("volume_mounts".to_string(), Value::Array(Vec::new()));
    }

    if let Some(Value::Array(mut volumes)) = spec.remove("volumes") {
        volumes.sort_by_key(|v| v.get("name").and_then(Value::as_str).unwrap_or("").to_string());
        spec.insert("volumes".to_string(), Value::Array(volumes));
    } else {
        spec.insert("volumes".to_string(), Value::Array(Vec::new()));
    }

    Value::Object(spec)
}

/// Project an `EnsureNetworkPolicy` action's params down to the fields that
/// actually determine the resource's desired identity.
pub fn normalize_network_policy_spec(params: &Value) -> Value {
    serde_json::json!({
        "pod_selector": params.get("pod_selector").cloned().unwrap_or(Value::Object(Default::default())),
        "policy_type": params.get("policy_type").cloned().unwrap_or(Value::Null),
    })
}

/// Project an `EnsurePVC` action's params down to the fields that determine
/// the claim's desired identity.
pub fn normalize_pvc_spec(params: &Value) -> Value {
    serde_json::json!({
        "size": params.get("size").cloned().unwrap_or(Value::Null),
        "storage_class": params.get("storage_class").cloned().unwrap_or(Value::Null),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deployment_normalization_is_order_independent() {
        let a = json!({
            "env": [{"name": "B", "value": "2"}, {"name": "A", "value": "1"}],
            "volume_mounts": [],
            "volumes": [],
            "image_verify": true,
        });
        let b = json!({
            "env": [{"name": "A", "value": "1"}, {"name": "B", "value": "2"}],
            "volume_mounts": [],
            "volumes": [],
        });
        assert_eq!(
            hash_obj(&normalize_deployment_spec(&a)).unwrap(),
            hash_obj(&normalize_deployment_spec(&b)).unwrap()
        );
    }

    #[test]
    fn hash_obj_treats_null_as_empty_object() {
        assert_eq!(hash_obj(&Value::Null).unwrap(), hash_obj(&json!({})).unwrap());
    }
}
