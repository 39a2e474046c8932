//! The `FileEventStore` itself.

use crate::config::FileStoreConfig;
use crate::segments::{self, Head};
use async_trait::async_trait;
use fs2::FileExt;
use rynxs_events::integrity::{chain_record, hash_event, HashVersion, Record, ZERO_HASH};
use rynxs_events::Event;
use rynxs_store_core::{AppendResult, EventStore, EventStoreError};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Segmented, advisory-locked JSONL event store.
///
/// Every `append` opens the active file, takes an OS-level exclusive lock,
/// rotates if the file has grown past `max_bytes`, writes one canonical JSON
/// line, `fsync`s, and releases the lock — matching the original's
/// `flock`-per-append discipline so multiple writer processes sharing a log
/// path stay safe. Calls block the calling thread for the duration of the
/// lock hold; callers that need to keep their async runtime responsive
/// under contention should run against this store from a `spawn_blocking`
/// task of their own, or accept that single-writer use (the expected
/// deployment shape) never blocks.
pub struct FileEventStore {
    config: FileStoreConfig,
}

impl FileEventStore {
    /// Open (creating if necessary) a file-backed store at `config.path`.
    pub fn open(config: FileStoreConfig) -> Result<Self, EventStoreError> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        if !config.path.exists() {
            File::create(&config.path)?;
        }
        Ok(FileEventStore { config })
    }

    /// The configured active log path.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    fn ordered_paths(&self, head: &Head) -> Vec<PathBuf> {
        let mut paths = segments::existing_segment_paths(&self.config.path, head);
        paths.sort();
        paths.push(self.config.path.clone());
        paths
    }

    fn read_tail(&self) -> Result<(Option<u64>, String), EventStoreError> {
        let head = segments::read_head(&self.config.path)?;
        let last_in_active = last_record_in(&self.config.path)?;
        match last_in_active {
            Some(record) => {
                let seq = record_seq(&record)?;
                Ok((Some(seq), record.event_hash))
            }
            None => Ok((head.last_seq, head.last_hash)),
        }
    }

    fn should_rotate(&self, additional_bytes: u64) -> Result<bool, EventStoreError> {
        let meta = fs::metadata(&self.config.path)?;
        Ok(meta.len() + additional_bytes > self.config.max_bytes)
    }

    fn rotate(&self, head: &mut Head) -> Result<(), EventStoreError> {
        let target = segments::segment_path(&self.config.path, head.segment_index);
        fs::rename(&self.config.path, &target)?;
        File::create(&self.config.path)?;
        head.segment_index += 1;
        segments::write_head(&self.config.path, head)?;
        segments::prune_segments(&self.config.path, head, self.config.max_segments)?;
        info!(segment = ?target, "rotated active log segment");
        Ok(())
    }

    fn append_blocking(
        &self,
        event: Event,
        expected_prev_hash: Option<String>,
    ) -> Result<AppendResult, EventStoreError> {
        let file = OpenOptions::new().append(true).read(true).open(&self.config.path)?;
        file.lock_exclusive()?;
        let result = self.append_locked(&file, event, expected_prev_hash);
        let _ = FileExt::unlock(&file);
        result
    }

    fn append_locked(
        &self,
        file: &File,
        event: Event,
        expected_prev_hash: Option<String>,
    ) -> Result<AppendResult, EventStoreError> {
        let mut head = segments::read_head(&self.config.path)?;
        let (tail_seq, tail_hash) = self.read_tail()?;
        head.last_seq = tail_seq;
        head.last_hash = tail_hash.clone();

        if let Some(expected) = &expected_prev_hash {
            if expected != &tail_hash {
                return Err(EventStoreError::Conflict {
                    expected: expected.clone(),
                    actual: tail_hash,
                });
            }
        }

        let seq = tail_seq.map_or(0, |s| s + 1);
        let event = event.with_seq(seq);
        let record = chain_record(&tail_hash, &event, self.config.hash_version);
        let line = serde_json::to_string(&record)?;
        let line_bytes = line.len() as u64 + 1;

        if self.should_rotate(line_bytes)? {
            self.rotate(&mut head)?;
        }

        let mut writer = file;
        writeln!(writer, "{line}")?;
        writer.flush()?;
        writer.sync_all()?;

        head.last_seq = Some(seq);
        head.last_hash = record.event_hash.clone();
        segments::write_head(&self.config.path, &head)?;

        debug!(seq, event_hash = %record.event_hash, "appended event");

        Ok(AppendResult {
            event,
            seq,
            event_hash: record.event_hash,
            prev_hash: tail_hash,
            committed: true,
            conflict: false,
            observed_prev_hash: None,
        })
    }

    fn read_records(&self) -> Result<Vec<Record>, EventStoreError> {
        let head = segments::read_head(&self.config.path)?;
        let mut records = Vec::new();
        for path in self.ordered_paths(&head) {
            records.extend(read_records_from(&path)?);
        }
        validate_chain(&records)?;
        Ok(records)
    }
}

/// Recompute every record's `event_hash` from its `prev_hash` and hashed
/// fields, and confirm `seq` is contiguous starting at 0. A reader must
/// never hand back a log with a broken chain or a gap, even if the bytes on
/// disk were tampered with or partially written by a crashed writer.
fn validate_chain(records: &[Record]) -> Result<(), EventStoreError> {
    let mut expected_seq = 0u64;
    let mut expected_prev = ZERO_HASH.to_string();
    for record in records {
        let seq = record_seq(record)?;
        if seq != expected_seq {
            return Err(EventStoreError::Integrity(format!(
                "sequence gap at seq {seq}: expected {expected_seq}"
            )));
        }
        if record.prev_hash != expected_prev {
            return Err(EventStoreError::Integrity(format!(
                "prev_hash mismatch at seq {seq}: expected {expected_prev}, found {}",
                record.prev_hash
            )));
        }
        let hash_version = infer_hash_version(&record.event);
        let event = record_into_event(record.clone())?;
        let recomputed = hash_event(&record.prev_hash, &event, hash_version);
        if recomputed != record.event_hash {
            return Err(EventStoreError::Integrity(format!(
                "event_hash mismatch at seq {seq}: expected {}, recomputed {recomputed}",
                record.event_hash
            )));
        }
        expected_seq += 1;
        expected_prev = record.event_hash.clone();
    }
    Ok(())
}

fn last_record_in(path: &Path) -> Result<Option<Record>, EventStoreError> {
    Ok(read_records_from(path)?.into_iter().last())
}

fn record_seq(record: &Record) -> Result<u64, EventStoreError> {
    record
        .event
        .get("seq")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| EventStoreError::Integrity("record missing seq".to_string()))
}

fn read_records_from(path: &Path) -> Result<Vec<Record>, EventStoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        out.push(serde_json::from_str(&line)?);
    }
    Ok(out)
}

fn record_into_event(record: Record) -> Result<Event, EventStoreError> {
    serde_json::from_value(record.event).map_err(|e| EventStoreError::Integrity(format!("malformed event record: {e}")))
}

/// A v2-hashed record's `event` dict carries an explicit `hash_version` tag;
/// a v1 one never does. Reading either back has to pick the matching
/// version before recomputing the hash, or every v1 record would fail
/// verification against a v2 recomputation.
fn infer_hash_version(event_dict: &serde_json::Value) -> HashVersion {
    HashVersion::from_record_tag(event_dict.get("hash_version").and_then(|v| v.as_str()))
}

#[async_trait]
impl EventStore for FileEventStore {
    async fn append(
        &self,
        event: Event,
        expected_prev_hash: Option<&str>,
    ) -> Result<AppendResult, EventStoreError> {
        self.append_blocking(event, expected_prev_hash.map(str::to_string))
    }

    async fn read(&self, aggregate_id: Option<&str>, from_seq: u64) -> Result<Vec<Event>, EventStoreError> {
        let mut out = Vec::new();
        for record in self.read_records()? {
            let event = record_into_event(record)?;
            if event.seq.unwrap_or(0) < from_seq {
                continue;
            }
            if let Some(id) = aggregate_id {
                if event.aggregate_id != id {
                    continue;
                }
            }
            out.push(event);
        }
        Ok(out)
    }

    async fn get_last_hash(&self) -> Result<String, EventStoreError> {
        let (_, hash) = self.read_tail()?;
        Ok(hash)
    }

    async fn get_event_hash(&self, seq: u64) -> Result<Option<String>, EventStoreError> {
        for record in self.read_records()? {
            if record_seq(&record)? == seq {
                return Ok(Some(record.event_hash));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rynxs_events::integrity::ZERO_HASH;
    use serde_json::json;
    use tempfile::tempdir;

    fn open(dir: &tempfile::TempDir, max_bytes: u64) -> FileEventStore {
        let path = dir.path().join("events.jsonl");
        FileEventStore::open(FileStoreConfig {
            path,
            max_bytes,
            max_segments: 10,
            hash_version: rynxs_events::integrity::HashVersion::V2,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn append_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let store = open(&dir, 1 << 20);
        let ev = Event::new("AgentObserved", "ns/a", 0, json!({"x": 1}));
        let result = store.append(ev.clone(), Some(ZERO_HASH)).await.unwrap();
        assert_eq!(result.seq, 0);

        let read_back = store.read(None, 0).await.unwrap();
        assert_eq!(read_back.len(), 1);
        assert_eq!(read_back[0].payload, json!({"x": 1}));
        assert_eq!(read_back[0].seq, Some(0));
    }

    #[tokio::test]
    async fn cas_conflict_rejects_stale_expected_hash() {
        let dir = tempdir().unwrap();
        let store = open(&dir, 1 << 20);
        store
            .append(Event::new("AgentObserved", "ns/a", 0, json!({})), Some(ZERO_HASH))
            .await
            .unwrap();

        let result = store
            .append(Event::new("AgentObserved", "ns/a", 1, json!({})), Some(ZERO_HASH))
            .await;
        assert!(matches!(result, Err(EventStoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn append_with_retry_recovers_from_conflict() {
        let dir = tempdir().unwrap();
        let store = open(&dir, 1 << 20);
        store
            .append(Event::new("AgentObserved", "ns/a", 0, json!({})), Some(ZERO_HASH))
            .await
            .unwrap();

        let result = store
            .append_with_retry(Event::new("AgentObserved", "ns/a", 1, json!({})))
            .await
            .unwrap();
        assert_eq!(result.seq, 1);
    }

    #[tokio::test]
    async fn rotation_preserves_hash_chain_across_segments() {
        let dir = tempdir().unwrap();
        // Tiny max_bytes forces a rotation after the very first record.
        let store = open(&dir, 1);
        let a = store
            .append(Event::new("AgentObserved", "ns/a", 0, json!({})), Some(ZERO_HASH))
            .await
            .unwrap();
        let b = store
            .append_with_retry(Event::new("AgentObserved", "ns/a", 1, json!({})))
            .await
            .unwrap();

        assert_eq!(b.prev_hash, a.event_hash);

        let events = store.read(None, 0).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].seq, Some(0));
        assert_eq!(events[1].seq, Some(1));

        let segment = segments::segment_path(store.path(), 0);
        assert!(segment.exists(), "expected a rotated segment file to exist");
    }

    #[tokio::test]
    async fn get_event_hash_matches_append_result() {
        let dir = tempdir().unwrap();
        let store = open(&dir, 1 << 20);
        let result = store
            .append(Event::new("AgentObserved", "ns/a", 0, json!({})), Some(ZERO_HASH))
            .await
            .unwrap();
        assert_eq!(store.get_event_hash(0).await.unwrap(), Some(result.event_hash));
        assert_eq!(store.get_event_hash(1).await.unwrap(), None);
    }
}
