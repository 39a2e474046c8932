//! The generic `State` container every reducer application folds over.

use rynxs_types::canonical::{canonical_bytes, CodecError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Immutable state container: a monotonic version counter plus a sorted map
/// of aggregate id to that aggregate's opaque state value.
///
/// Mirrors `engine/core/state.py::State`. `aggregates` is a `BTreeMap` (not
/// a `HashMap`) so canonical serialization never has to re-sort it — the
/// wire format spec.md requires ("canonical serialization sorts keys") falls
/// out of the container choice itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// Incremented by one on every successful `with_agg`.
    pub version: u64,
    /// Aggregate id -> that aggregate's current value.
    pub aggregates: BTreeMap<String, Value>,
}

impl State {
    /// The empty, version-0 state every replay starts from.
    pub fn initial() -> Self {
        State::default()
    }

    /// Look up an aggregate's current value, if any has been recorded.
    pub fn get_agg(&self, aggregate_id: &str) -> Option<&Value> {
        self.aggregates.get(aggregate_id)
    }

    /// Return a new state with `aggregate_id` set to `value` and `version`
    /// incremented by one. The receiver is left untouched.
    pub fn with_agg(&self, aggregate_id: &str, value: Value) -> State {
        let mut aggregates = self.aggregates.clone();
        aggregates.insert(aggregate_id.to_string(), value);
        State {
            version: self.version + 1,
            aggregates,
        }
    }

    /// Canonical JSON bytes of this state, the sole input to [`state_hash`].
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, CodecError> {
        let value = serde_json::to_value(self).expect("State always serializes to Value");
        canonical_bytes(&value)
    }
}

/// `SHA-256(canonical_json(state))`, hex-encoded — spec.md's `state_hash`.
pub fn state_hash(state: &State) -> Result<String, CodecError> {
    let bytes = state.canonical_bytes()?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn with_agg_increments_version_and_preserves_others() {
        let s0 = State::initial();
        let s1 = s0.with_agg("universe", json!({"a": 1}));
        let s2 = s1.with_agg("other", json!({"b": 2}));

        assert_eq!(s2.version, 2);
        assert_eq!(s2.get_agg("universe"), Some(&json!({"a": 1})));
        assert_eq!(s2.get_agg("other"), Some(&json!({"b": 2})));
    }

    #[test]
    fn state_hash_is_deterministic_and_order_independent() {
        let a = State::initial().with_agg("universe", json!({"x": 1, "y": 2}));
        let b = State::initial().with_agg("universe", json!({"y": 2, "x": 1}));
        assert_eq!(state_hash(&a).unwrap(), state_hash(&b).unwrap());
    }
}
