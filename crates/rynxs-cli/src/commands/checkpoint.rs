//! `rynxs checkpoint create|verify|generate-key` and `rynxs keygen`.

use crate::output::{emit, ExitCode};
use rynxs_checkpoint::{
    compute_state_hash, ensure_keypair, get_default_key_path, state_to_base64, verify_checkpoint, Checkpoint,
    CheckpointStore, SigningKey, VerifyingKey,
};
use rynxs_reducer::{replay as run_replay, HandlerMode, Reducer};
use rynxs_store_core::{EventStore, EventStoreError};
use rynxs_store_file::{FileEventStore, FileStoreConfig};
use serde::Serialize;
use std::path::PathBuf;

/// `rynxs keygen` and `rynxs checkpoint generate-key`: write a fresh Ed25519
/// signing keypair to `key` (or the default path) unless one is already
/// there.
pub fn generate_key(key: Option<PathBuf>, json: bool) -> ExitCode {
    let (priv_path, pub_path) = match ensure_keypair(key.as_deref()) {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("failed to generate signing key: {e}");
            return ExitCode::IoError;
        }
    };

    #[derive(Serialize)]
    struct KeygenOutput {
        private_key_path: String,
        public_key_path: String,
    }
    let output = KeygenOutput {
        private_key_path: priv_path.display().to_string(),
        public_key_path: pub_path.display().to_string(),
    };
    emit(&output, json, |o| {
        format!("private key: {}\npublic key:  {}", o.private_key_path, o.public_key_path)
    });

    ExitCode::Ok
}

/// `rynxs checkpoint create`.
pub async fn create(
    log: PathBuf,
    out: Option<PathBuf>,
    key: Option<PathBuf>,
    generate_key: bool,
    json: bool,
) -> ExitCode {
    if !log.exists() {
        eprintln!("log file not found: {}", log.display());
        return ExitCode::IoError;
    }

    let store = match FileEventStore::open(FileStoreConfig::from_env(&log)) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to open log: {e}");
            return ExitCode::from(&e);
        }
    };

    let reducer = Reducer::with_universe_handlers(HandlerMode::Lenient);
    let result = match run_replay(&store, &reducer, None, None).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("replay failed: {e}");
            return ExitCode::Invalid;
        }
    };
    if result.applied_count == 0 {
        eprintln!("log is empty, nothing to checkpoint");
        return ExitCode::Invalid;
    }

    let (event_index, event_hash) = match last_seq_and_hash(&store).await {
        Ok(v) => v,
        Err(e) => {
            eprintln!("failed to read log tail: {e}");
            return ExitCode::from(&e);
        }
    };

    let signing = if key.is_some() || generate_key {
        match ensure_keypair(key.as_deref()) {
            Ok((priv_path, _)) => match SigningKey::load_from_file(&priv_path) {
                Ok(k) => k,
                Err(e) => {
                    eprintln!("failed to load signing key: {e}");
                    return ExitCode::IoError;
                }
            },
            Err(e) => {
                eprintln!("failed to prepare signing key: {e}");
                return ExitCode::IoError;
            }
        }
    } else {
        eprintln!(
            "no --key given and --generate-key not set: signing with an ephemeral key that will not be saved (path would default to {})",
            get_default_key_path().display()
        );
        SigningKey::generate()
    };

    let state_bytes = match state_to_base64(&result.state) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("failed to encode state: {e}");
            return ExitCode::Invalid;
        }
    };
    let state_hash = match compute_state_hash(&result.state) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("failed to hash state: {e}");
            return ExitCode::Invalid;
        }
    };
    let pubkey_id = match signing.get_pubkey_id() {
        Ok(id) => id,
        Err(e) => {
            eprintln!("failed to derive pubkey id: {e}");
            return ExitCode::IoError;
        }
    };

    let mut cp = Checkpoint {
        version: 1,
        event_index,
        event_hash,
        state_hash,
        state_bytes,
        created_at_logical: event_index as i64,
        pubkey_id,
        signature: String::new(),
        meta: serde_json::json!({}),
    };
    cp.signature = match signing.sign_base64(&cp.signing_payload()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to sign checkpoint: {e}");
            return ExitCode::IoError;
        }
    };

    let saved_path = match &out {
        Some(path) => match std::fs::write(path, match cp.to_json() {
            Ok(s) => s,
            Err(e) => {
                eprintln!("failed to encode checkpoint: {e}");
                return ExitCode::Invalid;
            }
        }) {
            Ok(_) => path.clone(),
            Err(e) => {
                eprintln!("failed to write checkpoint: {e}");
                return ExitCode::IoError;
            }
        },
        None => {
            let store = CheckpointStore::new("checkpoints");
            match store.save(&cp) {
                Ok(p) => p,
                Err(e) => {
                    eprintln!("failed to save checkpoint: {e}");
                    return ExitCode::IoError;
                }
            }
        }
    };

    #[derive(Serialize)]
    struct CreateOutput<'a> {
        path: String,
        event_index: u64,
        event_hash: &'a str,
        state_hash: &'a str,
        pubkey_id: &'a str,
    }
    let output = CreateOutput {
        path: saved_path.display().to_string(),
        event_index: cp.event_index,
        event_hash: &cp.event_hash,
        state_hash: &cp.state_hash,
        pubkey_id: &cp.pubkey_id,
    };
    emit(&output, json, |o| {
        format!(
            "checkpoint written to {}\nevent_index={} event_hash={} state_hash={} pubkey_id={}",
            o.path, o.event_index, o.event_hash, o.state_hash, o.pubkey_id
        )
    });

    ExitCode::Ok
}

async fn last_seq_and_hash(store: &FileEventStore) -> Result<(u64, String), EventStoreError> {
    let hash = store.get_last_hash().await?;
    let events = store.read(None, 0).await?;
    let seq = events.last().and_then(|e| e.seq).unwrap_or(0);
    Ok((seq, hash))
}

/// `rynxs checkpoint verify`.
pub async fn verify(
    checkpoint_path: PathBuf,
    log: PathBuf,
    key: Option<PathBuf>,
    full: bool,
    json: bool,
) -> ExitCode {
    if full && key.is_none() {
        eprintln!("--full requires --key");
        return ExitCode::Invalid;
    }

    if !checkpoint_path.exists() {
        eprintln!("checkpoint file not found: {}", checkpoint_path.display());
        return ExitCode::IoError;
    }

    let cp_text = match std::fs::read_to_string(&checkpoint_path) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("failed to read checkpoint: {e}");
            return ExitCode::IoError;
        }
    };
    let cp = match Checkpoint::from_json(&cp_text) {
        Ok(cp) => cp,
        Err(e) => {
            eprintln!("failed to parse checkpoint: {e}");
            return ExitCode::Invalid;
        }
    };

    let verifying_key = match &key {
        Some(path) => match VerifyingKey::load_from_file(path) {
            Ok(k) => k,
            Err(e) => {
                eprintln!("failed to load verifying key: {e}");
                return ExitCode::IoError;
            }
        },
        None => {
            println!("no --key given: no verification performed, printing checkpoint contents only");
            emit(&cp, json, |cp| {
                format!(
                    "event_index={} event_hash={} state_hash={} pubkey_id={}",
                    cp.event_index, cp.event_hash, cp.state_hash, cp.pubkey_id
                )
            });
            return ExitCode::Ok;
        }
    };

    let result = if full {
        if !log.exists() {
            eprintln!("log file not found: {}", log.display());
            return ExitCode::IoError;
        }
        let store = match FileEventStore::open(FileStoreConfig::from_env(&log)) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("failed to open log: {e}");
                return ExitCode::from(&e);
            }
        };
        let reducer = Reducer::with_universe_handlers(HandlerMode::Lenient);
        match verify_checkpoint(&cp, &verifying_key, Some(&store), Some(&reducer), "full").await {
            Ok(r) => r,
            Err(e) => {
                eprintln!("verification failed: {e}");
                return ExitCode::Invalid;
            }
        }
    } else {
        match verify_checkpoint(&cp, &verifying_key, None, None, "signature").await {
            Ok(r) => r,
            Err(e) => {
                eprintln!("verification failed: {e}");
                return ExitCode::Invalid;
            }
        }
    };

    emit(&result, json, |r| format!("{r:#?}"));

    if result.valid {
        ExitCode::Ok
    } else {
        ExitCode::Invalid
    }
}
