//! Property: canonical rendering is insensitive to object-key insertion
//! order and stable across repeated invocations.
//!
//! Grounded in `original_source/engine/core/canonical.py`'s own property
//! suite (`test_canonical_determinism.py`), adapted to `proptest`.

use proptest::prelude::*;
use rynxs_types::canonical::{canonical_bytes, canonicalize};
use serde_json::Value;

/// Build an arbitrary JSON tree restricted to the integer-only, no-float
/// subset the codec accepts, bounded in depth so the strategy terminates.
fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Number(n.into())),
        "[a-z]{0,8}".prop_map(Value::String),
    ];
    leaf.prop_recursive(4, 64, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Re-insert an object's entries in reverse key order, recursively. Arrays
/// and scalars are left untouched since the codec must preserve array
/// order but must NOT care about object insertion order.
fn shuffle_dict_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().map(|(k, v)| (k.clone(), shuffle_dict_keys(v))).collect();
            entries.reverse();
            Value::Object(entries.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(shuffle_dict_keys).collect()),
        other => other.clone(),
    }
}

proptest! {
    /// P1: canonical_bytes(v) == canonical_bytes(shuffle_dict_keys(v)).
    #[test]
    fn canonical_bytes_ignores_object_insertion_order(v in arb_value()) {
        let shuffled = shuffle_dict_keys(&v);
        prop_assert_eq!(canonical_bytes(&v), canonical_bytes(&shuffled));
    }

    /// P1: 100 independent invocations on the same value produce byte-equal
    /// output (no per-process or per-call nondeterminism, e.g. from hash-map
    /// iteration order sneaking back in).
    #[test]
    fn canonical_bytes_is_repeatable(v in arb_value()) {
        let first = canonical_bytes(&v);
        for _ in 0..100 {
            prop_assert_eq!(canonical_bytes(&v), first.clone());
        }
    }

    /// Canonicalizing twice is the same as canonicalizing once: feeding a
    /// canonical value back through the codec is a no-op.
    #[test]
    fn canonicalize_is_idempotent(v in arb_value()) {
        let once = canonicalize(&v).unwrap();
        let twice = canonicalize(&once).unwrap();
        prop_assert_eq!(once, twice);
    }
}
