//! `rynxs log tail` and `rynxs log inspect`.

use crate::output::{emit, ExitCode, Table};
use rynxs_store_core::{EventStore, EventStoreError};
use rynxs_store_file::{FileEventStore, FileStoreConfig};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct AnnotatedEvent {
    seq: u64,
    hash: Option<String>,
    #[serde(rename = "type")]
    event_type: String,
    aggregate_id: String,
    ts: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<serde_json::Value>,
}

async fn load_annotated(log: &Path, from_seq: u64) -> Result<Vec<AnnotatedEvent>, EventStoreError> {
    let store = FileEventStore::open(FileStoreConfig::from_env(log))?;
    let events = store.read(None, from_seq).await?;
    let mut out = Vec::with_capacity(events.len());
    for event in events {
        let seq = event.seq.unwrap_or(0);
        let hash = store.get_event_hash(seq).await?;
        out.push(AnnotatedEvent {
            seq,
            hash,
            event_type: event.event_type,
            aggregate_id: event.aggregate_id,
            ts: event.ts,
            payload: None,
        });
    }
    Ok(out)
}

/// `rynxs log tail`.
pub async fn tail(log: PathBuf, lines: Option<usize>, json: bool) -> ExitCode {
    if !log.exists() {
        eprintln!("log file not found: {}", log.display());
        return ExitCode::IoError;
    }

    let events = match load_annotated(&log, 0).await {
        Ok(events) => events,
        Err(e) => {
            eprintln!("failed to read log: {e}");
            return ExitCode::from(&e);
        }
    };

    let selected: Vec<&AnnotatedEvent> = match lines {
        Some(n) => events.iter().rev().take(n).rev().collect(),
        None => events.iter().collect(),
    };

    if json {
        emit(&selected, true, |_| String::new());
    } else if selected.is_empty() {
        println!("(log is empty)");
    } else {
        let mut table = Table::new(&["SEQ", "HASH", "TYPE", "AGGREGATE", "TS"]);
        for event in &selected {
            table.push_row(vec![
                event.seq.to_string(),
                event.hash.as_deref().unwrap_or("-").chars().take(12).collect(),
                event.event_type.clone(),
                event.aggregate_id.clone(),
                event.ts.to_string(),
            ]);
        }
        print!("{table}");
    }

    ExitCode::Ok
}

/// `rynxs log inspect`.
#[allow(clippy::too_many_arguments)]
pub async fn inspect(
    log: PathBuf,
    from_seq: Option<u64>,
    to_seq: Option<u64>,
    event_type: Option<String>,
    payload: bool,
    json: bool,
) -> ExitCode {
    if !log.exists() {
        eprintln!("log file not found: {}", log.display());
        return ExitCode::IoError;
    }

    let mut events = match load_annotated(&log, from_seq.unwrap_or(0)).await {
        Ok(events) => events,
        Err(e) => {
            eprintln!("failed to read log: {e}");
            return ExitCode::from(&e);
        }
    };

    if let Some(to) = to_seq {
        events.retain(|e| e.seq <= to);
    }
    if let Some(ty) = &event_type {
        events.retain(|e| &e.event_type == ty);
    }

    let store = match FileEventStore::open(FileStoreConfig::from_env(&log)) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to open log: {e}");
            return ExitCode::from(&e);
        }
    };
    if payload {
        let raw = match store.read(None, from_seq.unwrap_or(0)).await {
            Ok(events) => events,
            Err(e) => {
                eprintln!("failed to read log: {e}");
                return ExitCode::from(&e);
            }
        };
        let raw_by_seq: std::collections::BTreeMap<u64, serde_json::Value> =
            raw.into_iter().map(|e| (e.seq.unwrap_or(0), e.payload)).collect();
        for event in &mut events {
            event.payload = raw_by_seq.get(&event.seq).cloned();
        }
    }

    if json {
        emit(&events, true, |_| String::new());
    } else if events.is_empty() {
        println!("(no matching events)");
    } else {
        for event in &events {
            println!(
                "seq={} hash={} type={} aggregate={} ts={}",
                event.seq,
                event.hash.as_deref().unwrap_or("-"),
                event.event_type,
                event.aggregate_id,
                event.ts
            );
            if let Some(p) = &event.payload {
                println!("  payload: {p}");
            }
        }
    }

    ExitCode::Ok
}
