//! `rynxs replay`.

use crate::output::{emit, ExitCode};
use rynxs_reducer::{replay as run_replay, state_hash, HandlerMode, Reducer};
use rynxs_store_core::EventStore;
use rynxs_store_file::{FileEventStore, FileStoreConfig};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Serialize)]
struct ReplaySummary {
    events_applied: u64,
    state_version: u64,
    state_hash: String,
    event_type_counts: BTreeMap<String, u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aggregates: Option<BTreeMap<String, Value>>,
}

/// `rynxs replay`.
pub async fn run(log: PathBuf, until: Option<u64>, show_state: bool, json: bool) -> ExitCode {
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
    let result = match run_replay(&store, &reducer, None, until).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("replay failed: {e}");
            return ExitCode::Invalid;
        }
    };

    let hash = match state_hash(&result.state) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("failed to hash replayed state: {e}");
            return ExitCode::Invalid;
        }
    };

    let mut event_type_counts = BTreeMap::new();
    for event in store.read(None, 0).await.unwrap_or_default() {
        if let Some(limit) = until {
            if event.seq.unwrap_or(0) > limit {
                continue;
            }
        }
        *event_type_counts.entry(event.event_type.clone()).or_insert(0u64) += 1;
    }

    let summary = ReplaySummary {
        events_applied: result.applied_count,
        state_version: result.state.version,
        state_hash: hash,
        event_type_counts,
        aggregates: show_state.then(|| result.state.aggregates.clone()),
    };

    emit(&summary, json, |s| {
        let mut out = format!(
            "events applied: {}\nstate version: {}\nstate hash: {}\n",
            s.events_applied, s.state_version, s.state_hash
        );
        out.push_str("event type counts:\n");
        for (ty, count) in &s.event_type_counts {
            out.push_str(&format!("  {ty}: {count}\n"));
        }
        if let Some(aggregates) = &s.aggregates {
            out.push_str("aggregates:\n");
            for (id, value) in aggregates {
                out.push_str(&format!("  {id}: {value}\n"));
            }
        }
        out
    });

    ExitCode::Ok
}
