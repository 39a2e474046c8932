//! Deterministic, hash-stable JSON rendering.
//!
//! Mirrors the original engine's `canonicalize()` / `canonical_json_bytes()`
//! pair: object keys are sorted, the output carries no insignificant
//! whitespace, and any `Number` that is not an exact integer is rejected
//! rather than silently re-rendered (floating point formatting is not
//! portable across languages/runtimes, so it is simply kept out of anything
//! that feeds the hash chain).

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Errors produced while canonicalizing a JSON value.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    /// A `serde_json::Number` carried a fractional or exponent component.
    #[error("non-integer numeric value is not permitted in a hash-critical payload: {0}")]
    NonIntegerFloat(String),

    /// A `serde_json::Number` did not fit in an `i64`/`u64` (NaN/Infinity are
    /// represented this way by some encoders).
    #[error("numeric value is not representable as a canonical integer: {0}")]
    UnrepresentableNumber(String),
}

/// Recursively rebuild `value` with object keys sorted and integer-only
/// numbers, producing a `Value` tree that will serialize identically
/// regardless of the order fields were inserted in.
pub fn canonicalize(value: &Value) -> Result<Value, CodecError> {
    match value {
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(value.clone()),
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                Ok(Value::Number(n.clone()))
            } else if n.is_f64() {
                Err(CodecError::NonIntegerFloat(n.to_string()))
            } else {
                Err(CodecError::UnrepresentableNumber(n.to_string()))
            }
        }
        Value::Array(items) => {
            let canon = items
                .iter()
                .map(canonicalize)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(canon))
        }
        Value::Object(map) => {
            // BTreeMap sorts keys for us; we still rebuild into a serde_json
            // Map so the caller gets a plain Value back.
            let sorted: BTreeMap<String, Value> = map
                .iter()
                .map(|(k, v)| canonicalize(v).map(|cv| (k.clone(), cv)))
                .collect::<Result<_, _>>()?;
            let mut out = Map::with_capacity(sorted.len());
            for (k, v) in sorted {
                out.insert(k, v);
            }
            Ok(Value::Object(out))
        }
    }
}

/// Canonicalize `value` and render it as a compact, sorted-key JSON string.
pub fn canonical_string(value: &Value) -> Result<String, CodecError> {
    let canon = canonicalize(value)?;
    // serde_json's default Serializer already omits insignificant
    // whitespace; sorting happened above, so this is the canonical form.
    Ok(serde_json::to_string(&canon).expect("canonicalized value always serializes"))
}

/// Canonicalize `value` and render it as UTF-8 bytes, the form that feeds
/// directly into the hash chain.
pub fn canonical_bytes(value: &Value) -> Result<Vec<u8>, CodecError> {
    canonical_string(value).map(String::into_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_object_keys() {
        let v = json!({"b": 1, "a": 2, "c": {"z": 1, "y": 2}});
        let s = canonical_string(&v).unwrap();
        assert_eq!(s, r#"{"a":2,"b":1,"c":{"y":2,"z":1}}"#);
    }

    #[test]
    fn preserves_array_order() {
        let v = json!({"xs": [3, 1, 2]});
        let s = canonical_string(&v).unwrap();
        assert_eq!(s, r#"{"xs":[3,1,2]}"#);
    }

    #[test]
    fn rejects_floats() {
        let v = json!({"a": 1.5});
        assert!(matches!(canonicalize(&v), Err(CodecError::NonIntegerFloat(_))));
    }

    #[test]
    fn is_idempotent() {
        let v = json!({"b": [1, {"y": 1, "x": 2}], "a": null});
        let once = canonical_string(&v).unwrap();
        let twice = canonical_string(&serde_json::from_str(&once).unwrap()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn two_orderings_of_same_object_produce_identical_bytes() {
        let a = json!({"a": 1, "b": 2});
        let b = json!({"b": 2, "a": 1});
        assert_eq!(canonical_bytes(&a).unwrap(), canonical_bytes(&b).unwrap());
    }
}
