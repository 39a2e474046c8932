//! The `Checkpoint` record: a periodic, signed snapshot of reducer state.

use rynxs_types::canonical::{canonical_string, CodecError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A signed snapshot of folded state at a particular point in the event log.
///
/// Mirrors `engine/checkpoint/model.py::Checkpoint`. Replaying from the
/// nearest checkpoint at or before a target `seq` lets the reducer skip
/// every earlier event instead of folding the whole log from scratch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Checkpoint format version.
    pub version: u32,
    /// The `seq` of the last event folded into `state_hash`.
    pub event_index: u64,
    /// The hash-chain tip at `event_index`.
    pub event_hash: String,
    /// `state_hash` of the folded state at `event_index`.
    pub state_hash: String,
    /// Base64-encoded canonical JSON of the folded state.
    pub state_bytes: String,
    /// Logical clock reading at checkpoint creation time.
    pub created_at_logical: i64,
    /// Truncated SHA-256 of the signer's public key PEM, identifying which
    /// key produced `signature`.
    pub pubkey_id: String,
    /// Base64-encoded Ed25519 signature over [`Checkpoint::signing_payload`].
    pub signature: String,
    /// Free-form metadata, never covered by the signature.
    #[serde(default)]
    pub meta: Value,
}

impl Checkpoint {
    /// The subset of fields the signature actually covers. `state_bytes`,
    /// `signature`, and `meta` are deliberately excluded — see the
    /// workspace grounding ledger's note on the resulting state-bytes
    /// divergence this leaves open.
    pub fn signing_payload(&self) -> Value {
        json!({
            "version": self.version,
            "event_index": self.event_index,
            "event_hash": self.event_hash,
            "state_hash": self.state_hash,
            "created_at_logical": self.created_at_logical,
            "pubkey_id": self.pubkey_id,
        })
    }

    /// Render as canonical JSON text, the form persisted to disk.
    pub fn to_json(&self) -> Result<String, CodecError> {
        let value = serde_json::to_value(self).expect("Checkpoint always serializes to Value");
        canonical_string(&value)
    }

    /// Parse a checkpoint back from its on-disk JSON form.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Checkpoint {
        Checkpoint {
            version: 1,
            event_index: 10,
            event_hash: "abc".into(),
            state_hash: "def".into(),
            state_bytes: "base64stuff".into(),
            created_at_logical: 42,
            pubkey_id: "pk".into(),
            signature: "sig".into(),
            meta: json!({"note": "x"}),
        }
    }

    #[test]
    fn signing_payload_excludes_state_bytes_signature_and_meta() {
        let payload = sample().signing_payload();
        assert!(payload.get("state_bytes").is_none());
        assert!(payload.get("signature").is_none());
        assert!(payload.get("meta").is_none());
        assert_eq!(payload["event_index"], 10);
        assert_eq!(payload["pubkey_id"], "pk");
    }

    #[test]
    fn to_json_from_json_round_trips() {
        let cp = sample();
        let s = cp.to_json().unwrap();
        let back = Checkpoint::from_json(&s).unwrap();
        assert_eq!(cp, back);
    }
}
