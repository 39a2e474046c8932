//! Hash-chain integrity: deriving `event_hash` from `prev_hash` plus an
//! event's hash-critical fields, in a way that is stable across the two
//! supported on-disk encodings.

use crate::event::Event;
use rynxs_types::canonical::canonical_bytes;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// The chain's starting value, used as `prev_hash` for the first event in a
/// log.
pub const ZERO_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Which hash-chain encoding a given event (or an entire log) uses.
///
/// v1 is the legacy encoding: `meta` is always folded into the hashed
/// payload, even when absent. v2 tags the hashed payload with an explicit
/// `hash_version` field and only includes `meta` when it is present and
/// non-empty. New logs default to v2; v1 logs remain readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashVersion {
    /// Legacy encoding.
    V1,
    /// Current encoding (default for new appends).
    V2,
}

impl HashVersion {
    /// Parse the `RYNXS_HASH_VERSION` environment value (`"v1"` or `"v2"`,
    /// case-insensitive). Anything else, including unset, falls back to the
    /// default.
    pub fn from_env_str(raw: Option<&str>) -> Self {
        match raw.map(str::to_ascii_lowercase).as_deref() {
            Some("v1") => HashVersion::V1,
            _ => HashVersion::V2,
        }
    }

    /// The wire tag written into v2 hashed payloads.
    pub fn as_tag(&self) -> &'static str {
        match self {
            HashVersion::V1 => "v1",
            HashVersion::V2 => "v2",
        }
    }

    /// Infer the encoding a stored record used from its own `hash_version`
    /// tag: absent or anything other than `"v2"` means v1. Lets a reader
    /// recompute each record's hash under the version it was actually
    /// written with, rather than assuming one version for an entire log.
    pub fn from_record_tag(tag: Option<&str>) -> Self {
        match tag {
            Some("v2") => HashVersion::V2,
            _ => HashVersion::V1,
        }
    }
}

impl Default for HashVersion {
    fn default() -> Self {
        HashVersion::V2
    }
}

/// A chained log record: the previous hash, this event's resulting hash, and
/// the exact field subset that was hashed to produce it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    /// Hash of the previous record in the chain (`ZERO_HASH` for the first).
    pub prev_hash: String,
    /// This record's resulting hash.
    pub event_hash: String,
    /// The event, as the subset of fields that were actually hashed.
    pub event: Value,
}

/// Build the JSON value that gets hashed for `event` under `hash_version`.
///
/// v1 always includes `meta` (even `null`); v2 includes a `hash_version` tag
/// and only includes `meta` when it is `Some` and not an empty object/array.
pub fn event_dict_for_hash(event: &Event, hash_version: HashVersion) -> Value {
    let mut obj = serde_json::Map::new();
    obj.insert("type".to_string(), json!(event.event_type));
    obj.insert("aggregate_id".to_string(), json!(event.aggregate_id));
    obj.insert("ts".to_string(), json!(event.ts));
    obj.insert("payload".to_string(), event.payload.clone());
    if let Some(seq) = event.seq {
        obj.insert("seq".to_string(), json!(seq));
    }

    match hash_version {
        HashVersion::V1 => {
            obj.insert("meta".to_string(), event.meta.clone().unwrap_or(Value::Null));
        }
        HashVersion::V2 => {
            obj.insert("hash_version".to_string(), json!(hash_version.as_tag()));
            if let Some(meta) = &event.meta {
                if is_truthy(meta) {
                    obj.insert("meta".to_string(), meta.clone());
                }
            }
        }
    }

    Value::Object(obj)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Object(m) => !m.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::String(s) => !s.is_empty(),
        Value::Number(_) => true,
    }
}

/// `SHA-256(prev_hash_utf8_bytes ‖ canonical_json_bytes(event_dict_for_hash(event)))`,
/// hex-encoded.
pub fn hash_event(prev_hash: &str, event: &Event, hash_version: HashVersion) -> String {
    let data = event_dict_for_hash(event, hash_version);
    let canon = canonical_bytes(&data).expect("hash-critical event payload must be canonicalizable");

    let mut hasher = Sha256::new();
    hasher.update(prev_hash.as_bytes());
    hasher.update(&canon);
    hex::encode(hasher.finalize())
}

/// Build the chained record for `event` given the chain's current tip hash.
pub fn chain_record(prev_hash: &str, event: &Event, hash_version: HashVersion) -> Record {
    let event_hash = hash_event(prev_hash, event, hash_version);
    Record {
        prev_hash: prev_hash.to_string(),
        event_hash,
        event: event_dict_for_hash(event, hash_version),
    }
}
