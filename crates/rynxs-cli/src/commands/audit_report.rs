//! `rynxs audit-report`.

use crate::cli::OutputFormat;
use crate::output::ExitCode;
use rynxs_store_file::{FileEventStore, FileStoreConfig};
use rynxs_verify::{build_decision_proof, verify_actions_decided_pointers};
use std::path::PathBuf;

/// `rynxs audit-report`.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    log: PathBuf,
    _summary: bool,
    proof: bool,
    at_seq: Option<u64>,
    checkpoints: Option<PathBuf>,
    key: Option<PathBuf>,
    format: OutputFormat,
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

    if proof {
        let result = match build_decision_proof(&store, at_seq, checkpoints.as_deref(), key.as_deref()).await {
            Ok(p) => p,
            Err(e) => {
                eprintln!("failed to assemble decision proof: {e}");
                return ExitCode::Invalid;
            }
        };
        let valid = result.valid;
        render(&result, format);
        return if valid { ExitCode::Ok } else { ExitCode::Invalid };
    }

    let result = match verify_actions_decided_pointers(&store).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("failed to verify chain: {e}");
            return ExitCode::Invalid;
        }
    };
    let valid = result.valid;
    render(&result, format);
    if valid {
        ExitCode::Ok
    } else {
        ExitCode::Invalid
    }
}

fn render<T: serde::Serialize + std::fmt::Debug>(value: &T, format: OutputFormat) {
    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(value) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("failed to serialize report as JSON: {e}"),
        },
        OutputFormat::Md => {
            let json = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
            println!("# Audit report\n");
            if let serde_json::Value::Object(map) = json {
                for (k, v) in map {
                    println!("- **{k}**: {v}");
                }
            }
        }
        OutputFormat::Text => println!("{value:#?}"),
    }
}
