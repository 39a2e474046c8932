//! Argument parsing for the `rynxs` binary.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default path the event log commands open when `--log` isn't given,
/// matching `cli/commands/log.py`'s default.
pub const DEFAULT_LOG_PATH: &str = "/tmp/rynxs-logs/operator-events.log";

/// `rynxs`: inspect, replay, checkpoint, and audit a rynxs event log.
#[derive(Parser)]
#[command(name = "rynxs")]
#[command(about = "Deterministic, event-sourced execution engine for agent universe controllers")]
#[command(version)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error), or an `EnvFilter`
    /// expression via `RUST_LOG`.
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommand groups.
#[derive(Subcommand)]
pub enum Commands {
    /// Event log inspection: tail, inspect.
    #[command(subcommand)]
    Log(LogCommand),
    /// Signed checkpoint management: create, verify.
    #[command(subcommand)]
    Checkpoint(CheckpointCommand),
    /// Replay the event log and reconstruct state.
    Replay(ReplayArgs),
    /// Assemble and print an audit report for the log.
    AuditReport(AuditReportArgs),
    /// Generate an Ed25519 checkpoint signing keypair. Equivalent to
    /// `checkpoint generate-key`, provided as a top-level shortcut since
    /// key generation is a one-time setup step, not a log operation.
    Keygen(GenerateKeyArgs),
}

/// `rynxs log <tail|inspect>`.
#[derive(Subcommand)]
pub enum LogCommand {
    /// Show the most recent events in the log.
    Tail {
        /// Path to the event log file.
        #[arg(long, short = 'l', default_value = DEFAULT_LOG_PATH)]
        log: PathBuf,
        /// Show only the last N events.
        #[arg(long, short = 'n')]
        lines: Option<usize>,
        /// Output as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Show events matching filters, with full payloads on request.
    Inspect {
        /// Path to the event log file.
        #[arg(long, short = 'l', default_value = DEFAULT_LOG_PATH)]
        log: PathBuf,
        /// Only show events with `seq >= from`.
        #[arg(long = "from")]
        from_seq: Option<u64>,
        /// Only show events with `seq <= to`.
        #[arg(long = "to")]
        to_seq: Option<u64>,
        /// Only show events of this wire type (e.g. `AgentObserved`).
        #[arg(long = "event-type", short = 't')]
        event_type: Option<String>,
        /// Include each event's full payload.
        #[arg(long, short = 'p')]
        payload: bool,
        /// Output as JSON instead of text.
        #[arg(long)]
        json: bool,
    },
}

/// `rynxs checkpoint <create|generate-key|verify>`.
#[derive(Subcommand)]
pub enum CheckpointCommand {
    /// Replay the log and write a signed checkpoint of the resulting state.
    Create {
        /// Path to the event log file.
        #[arg(long, short = 'l', default_value = DEFAULT_LOG_PATH)]
        log: PathBuf,
        /// Output checkpoint file path. Defaults to an auto-named file
        /// under `./checkpoints/`.
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
        /// Path to an Ed25519 signing key (PKCS#8 PEM). Defaults to
        /// `~/.rynxs/keys/checkpoint_ed25519`.
        #[arg(long, short = 'k')]
        key: Option<PathBuf>,
        /// Generate a signing keypair at the resolved key path if one
        /// doesn't already exist.
        #[arg(long = "generate-key")]
        generate_key: bool,
        /// Output as JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Generate an Ed25519 checkpoint signing keypair at the given (or
    /// default) path, if one doesn't already exist there.
    GenerateKey(GenerateKeyArgs),
    /// Verify a checkpoint's signature, and optionally its consistency
    /// with the event log it claims to summarize.
    Verify {
        /// Path to the checkpoint file to verify.
        checkpoint_path: PathBuf,
        /// Path to the event log file (required for `--full`).
        #[arg(long, short = 'l', default_value = DEFAULT_LOG_PATH)]
        log: PathBuf,
        /// Path to the Ed25519 verifying key (SubjectPublicKeyInfo PEM).
        #[arg(long, short = 'k')]
        key: Option<PathBuf>,
        /// Full verification: signature + state hash + log's event hash +
        /// replay reproduces the signed state hash.
        #[arg(long)]
        full: bool,
        /// Output as JSON instead of text.
        #[arg(long)]
        json: bool,
    },
}

/// `rynxs keygen` / `rynxs checkpoint generate-key`.
#[derive(Parser)]
pub struct GenerateKeyArgs {
    /// Path to write the private key to. Defaults to
    /// `~/.rynxs/keys/checkpoint_ed25519`; the public key is written
    /// alongside it with a `.pub` extension.
    #[arg(long, short = 'k')]
    pub key: Option<PathBuf>,
    /// Output as JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

/// `rynxs replay`.
#[derive(Parser)]
pub struct ReplayArgs {
    /// Path to the event log file.
    #[arg(long, short = 'l', default_value = DEFAULT_LOG_PATH)]
    pub log: PathBuf,
    /// Replay only events with `seq <= until`.
    #[arg(long, short = 'u')]
    pub until: Option<u64>,
    /// Print the folded state's aggregates.
    #[arg(long, short = 's')]
    pub show_state: bool,
    /// Output as JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

/// `rynxs audit-report`.
#[derive(Parser)]
pub struct AuditReportArgs {
    /// Path to the event log file.
    #[arg(long, short = 'l', default_value = DEFAULT_LOG_PATH)]
    pub log: PathBuf,
    /// Print only the chain/pointer verification summary, skipping proof
    /// assembly.
    #[arg(long)]
    pub summary: bool,
    /// Assemble a full decision proof instead of the summary.
    #[arg(long)]
    pub proof: bool,
    /// The trigger event's `seq` to build the proof for (with `--proof`).
    /// Defaults to the first `ActionsDecided` event in the log.
    #[arg(long = "at-seq")]
    pub at_seq: Option<u64>,
    /// Directory of checkpoint files to consult for the nearest checkpoint
    /// to a proof's trigger event.
    #[arg(long)]
    pub checkpoints: Option<PathBuf>,
    /// Verifying key to check a consulted checkpoint's signature against.
    #[arg(long, short = 'k')]
    pub key: Option<PathBuf>,
    /// Output format.
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,
}

/// `--format` values for `audit-report`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Machine-readable JSON.
    Json,
    /// GitHub-flavored Markdown.
    Md,
    /// Plain text.
    Text,
}
