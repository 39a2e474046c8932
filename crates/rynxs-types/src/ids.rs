//! Stable identifier derivation.

use sha2::{Digest, Sha256};

/// Join `parts` with `|` and return the lowercase hex SHA-256 digest.
///
/// This is used wherever the engine needs a deterministic fingerprint from a
/// handful of already-canonical strings (action ids, `spec_hash`, `pubkey_id`
/// truncations, etc). Callers are responsible for canonicalizing any part
/// that is itself structured data before passing it in.
pub fn stable_id(parts: &[&str]) -> String {
    let joined = parts.join("|");
    let digest = Sha256::digest(joined.as_bytes());
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_across_calls() {
        let a = stable_id(&["EnsureConfigMap", "ns/name", "{}"]);
        let b = stable_id(&["EnsureConfigMap", "ns/name", "{}"]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn sensitive_to_part_boundaries() {
        // "ab" + "" must not collide with "a" + "b" once joined with "|".
        let a = stable_id(&["ab", ""]);
        let b = stable_id(&["a", "b"]);
        assert_ne!(a, b);
    }
}
