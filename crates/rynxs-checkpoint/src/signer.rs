//! Ed25519 keypairs for checkpoint signing/verification, and the default
//! on-disk key path the CLI falls back to.
//!
//! Grounded in `engine/checkpoint/signer.py`. The original wraps Python's
//! `cryptography` Ed25519 classes; here that's `ed25519_dalek::{SigningKey,
//! VerifyingKey}`, PEM-encoded the same way via the `pkcs8` feature so key
//! files this binary writes and reads look like any other Ed25519 PEM.

use crate::error::CheckpointError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::pkcs8::spki::{DecodePublicKey, EncodePublicKey};
use ed25519_dalek::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use ed25519_dalek::{Signature, Signer, Verifier};
use rynxs_types::canonical::canonical_bytes;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Number of hex characters of the public-key-PEM SHA-256 digest kept as a
/// key identifier, matching the original's truncation.
const PUBKEY_ID_LEN: usize = 16;

/// An Ed25519 private key used to sign checkpoints.
#[derive(Clone)]
pub struct SigningKey {
    inner: ed25519_dalek::SigningKey,
}

impl SigningKey {
    /// Generate a fresh keypair from the system CSPRNG.
    pub fn generate() -> Self {
        let inner = ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng);
        SigningKey { inner }
    }

    /// Load a PEM-encoded private key from `path`.
    pub fn load_from_file(path: &Path) -> Result<Self, CheckpointError> {
        let pem = std::fs::read_to_string(path)?;
        let inner = ed25519_dalek::SigningKey::from_pkcs8_pem(&pem)
            .map_err(|e| CheckpointError::Signature(e.to_string()))?;
        Ok(SigningKey { inner })
    }

    /// Write this key's PEM encoding to `path` (and, if `public_path` is
    /// given, the matching public key PEM alongside it).
    pub fn save_to_file(&self, path: &Path, public_path: Option<&Path>) -> Result<(), CheckpointError> {
        let pem = self
            .inner
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| CheckpointError::Signature(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, pem.as_str())?;
        restrict_to_owner(path)?;

        if let Some(pub_path) = public_path {
            let verifying = self.verifying_key();
            verifying.save_to_file(pub_path)?;
        }
        Ok(())
    }

    /// The corresponding public key.
    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey {
            inner: self.inner.verifying_key(),
        }
    }

    /// Sign the canonical JSON encoding of `payload`.
    pub fn sign(&self, payload: &serde_json::Value) -> Result<Vec<u8>, CheckpointError> {
        let bytes = canonical_bytes(payload)?;
        Ok(self.inner.sign(&bytes).to_bytes().to_vec())
    }

    /// [`SigningKey::sign`], base64-encoded.
    pub fn sign_base64(&self, payload: &serde_json::Value) -> Result<String, CheckpointError> {
        Ok(BASE64.encode(self.sign(payload)?))
    }

    /// This key's [`VerifyingKey::get_pubkey_id`].
    pub fn get_pubkey_id(&self) -> Result<String, CheckpointError> {
        self.verifying_key().get_pubkey_id()
    }

    /// This key's public PEM encoding.
    pub fn get_public_key_pem(&self) -> Result<String, CheckpointError> {
        self.verifying_key().get_public_key_pem()
    }
}

/// An Ed25519 public key used to verify checkpoint signatures.
#[derive(Clone)]
pub struct VerifyingKey {
    inner: ed25519_dalek::VerifyingKey,
}

impl VerifyingKey {
    /// Load a PEM-encoded public key from `path`.
    pub fn load_from_file(path: &Path) -> Result<Self, CheckpointError> {
        let pem = std::fs::read_to_string(path)?;
        let inner = ed25519_dalek::VerifyingKey::from_public_key_pem(&pem)
            .map_err(|e| CheckpointError::Signature(e.to_string()))?;
        Ok(VerifyingKey { inner })
    }

    /// Write this key's PEM encoding to `path`.
    pub fn save_to_file(&self, path: &Path) -> Result<(), CheckpointError> {
        let pem = self
            .inner
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CheckpointError::Signature(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, pem)?;
        Ok(())
    }

    /// Derive a verifying key from its matching signing key.
    pub fn from_signing_key(signing: &SigningKey) -> Self {
        signing.verifying_key()
    }

    /// Check `signature` against the canonical JSON encoding of `payload`.
    pub fn verify(&self, payload: &serde_json::Value, signature: &[u8]) -> Result<bool, CheckpointError> {
        let bytes = canonical_bytes(payload)?;
        let sig_bytes: [u8; 64] = signature
            .try_into()
            .map_err(|_| CheckpointError::Signature("signature must be 64 bytes".to_string()))?;
        let sig = Signature::from_bytes(&sig_bytes);
        Ok(self.inner.verify(&bytes, &sig).is_ok())
    }

    /// [`VerifyingKey::verify`] against a base64-encoded signature.
    pub fn verify_base64(&self, payload: &serde_json::Value, signature_b64: &str) -> Result<bool, CheckpointError> {
        let sig_bytes = BASE64.decode(signature_b64)?;
        self.verify(payload, &sig_bytes)
    }

    /// First [`PUBKEY_ID_LEN`] hex characters of `SHA-256(public_key_pem)`,
    /// used to tag which key produced a signature without embedding the
    /// full key in every checkpoint.
    pub fn get_pubkey_id(&self) -> Result<String, CheckpointError> {
        let pem = self.get_public_key_pem()?;
        let digest = Sha256::digest(pem.as_bytes());
        Ok(hex::encode(digest)[..PUBKEY_ID_LEN].to_string())
    }

    /// This key's PEM encoding.
    pub fn get_public_key_pem(&self) -> Result<String, CheckpointError> {
        self.inner
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CheckpointError::Signature(e.to_string()))
    }
}

#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// `~/.rynxs/keys/checkpoint_ed25519`, the default private-key location
/// used when no path is given explicitly.
pub fn get_default_key_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".rynxs")
        .join("keys")
        .join("checkpoint_ed25519")
}

/// Ensure a keypair exists at `key_path` (or the default path), generating
/// one if it doesn't, and return `(private_path, public_path)`.
pub fn ensure_keypair(key_path: Option<&Path>) -> Result<(PathBuf, PathBuf), CheckpointError> {
    let priv_path = key_path
        .map(Path::to_path_buf)
        .unwrap_or_else(get_default_key_path);
    let pub_path = priv_path.with_extension("pub");

    if !priv_path.exists() {
        let signing = SigningKey::generate();
        signing.save_to_file(&priv_path, Some(&pub_path))?;
    }
    Ok((priv_path, pub_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sign_then_verify_round_trips() {
        let signing = SigningKey::generate();
        let verifying = signing.verifying_key();
        let payload = json!({"a": 1, "b": "x"});
        let sig = signing.sign_base64(&payload).unwrap();
        assert!(verifying.verify_base64(&payload, &sig).unwrap());
    }

    #[test]
    fn verify_fails_for_tampered_payload() {
        let signing = SigningKey::generate();
        let verifying = signing.verifying_key();
        let sig = signing.sign_base64(&json!({"a": 1})).unwrap();
        assert!(!verifying.verify_base64(&json!({"a": 2}), &sig).unwrap());
    }

    #[test]
    fn pubkey_id_is_stable_and_truncated() {
        let signing = SigningKey::generate();
        let id1 = signing.get_pubkey_id().unwrap();
        let id2 = signing.verifying_key().get_pubkey_id().unwrap();
        assert_eq!(id1, id2);
        assert_eq!(id1.len(), PUBKEY_ID_LEN);
    }

    #[test]
    fn ensure_keypair_generates_once_then_reuses() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("k");
        let (priv1, pub1) = ensure_keypair(Some(&key_path)).unwrap();
        let pem1 = std::fs::read_to_string(&priv1).unwrap();
        let (priv2, pub2) = ensure_keypair(Some(&key_path)).unwrap();
        let pem2 = std::fs::read_to_string(&priv2).unwrap();
        assert_eq!(priv1, priv2);
        assert_eq!(pub1, pub2);
        assert_eq!(pem1, pem2);
    }
}
