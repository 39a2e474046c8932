//! Entry point: parse arguments, init tracing, dispatch, map the result to
//! a process exit code.

use clap::Parser;
use rynxs_cli::cli::{CheckpointCommand, LogCommand};
use rynxs_cli::commands::{audit_report, checkpoint, log, replay};
use rynxs_cli::output::ExitCode;
use rynxs_cli::{Cli, Commands};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let exit = match cli.command {
        Commands::Log(LogCommand::Tail { log: path, lines, json }) => log::tail(path, lines, json).await,
        Commands::Log(LogCommand::Inspect {
            log: path,
            from_seq,
            to_seq,
            event_type,
            payload,
            json,
        }) => log::inspect(path, from_seq, to_seq, event_type, payload, json).await,
        Commands::Checkpoint(CheckpointCommand::Create {
            log: path,
            out,
            key,
            generate_key,
            json,
        }) => checkpoint::create(path, out, key, generate_key, json).await,
        Commands::Checkpoint(CheckpointCommand::GenerateKey(args)) => checkpoint::generate_key(args.key, args.json),
        Commands::Checkpoint(CheckpointCommand::Verify {
            checkpoint_path,
            log: path,
            key,
            full,
            json,
        }) => checkpoint::verify(checkpoint_path, path, key, full, json).await,
        Commands::Replay(args) => replay::run(args.log, args.until, args.show_state, args.json).await,
        Commands::Keygen(args) => checkpoint::generate_key(args.key, args.json),
        Commands::AuditReport(args) => {
            audit_report::run(
                args.log,
                args.summary,
                args.proof,
                args.at_seq,
                args.checkpoints,
                args.key,
                args.format,
            )
            .await
        }
    };

    std::process::exit(exit_code(exit));
}

fn exit_code(exit: ExitCode) -> i32 {
    exit.code()
}

fn init_tracing(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
