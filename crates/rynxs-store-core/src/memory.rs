//! An in-memory `EventStore`, used by downstream crates' test suites so they
//! don't need a tempdir to exercise the reducer/decision/executor pipeline.
//!
//! Grounded in the teacher's `toka-store-memory` crate: same role (a fast,
//! non-persistent backend kept alongside the durable ones), generalized here
//! to implement `EventStore` instead of `StorageBackend`.

use crate::error::EventStoreError;
use crate::store::{AppendResult, EventStore};
use async_trait::async_trait;
use rynxs_events::integrity::{chain_record, HashVersion, ZERO_HASH};
use rynxs_events::Event;
use tokio::sync::Mutex;

#[derive(Default)]
struct Inner {
    events: Vec<Event>,
    hashes: Vec<String>,
}

/// Non-persistent, process-local `EventStore`.
pub struct MemoryEventStore {
    inner: Mutex<Inner>,
    hash_version: HashVersion,
}

impl MemoryEventStore {
    /// Build an empty store using the default (v2) hash version.
    pub fn new() -> Self {
        Self::with_hash_version(HashVersion::default())
    }

    /// Build an empty store pinned to a specific hash version, for tests
    /// that exercise v1/v2 cross-compatibility.
    pub fn with_hash_version(hash_version: HashVersion) -> Self {
        MemoryEventStore {
            inner: Mutex::new(Inner::default()),
            hash_version,
        }
    }

    /// Number of events committed so far.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.events.len()
    }

    /// Whether the log is empty.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn append(
        &self,
        event: Event,
        expected_prev_hash: Option<&str>,
    ) -> Result<AppendResult, EventStoreError> {
        let mut inner = self.inner.lock().await;
        let current_tip = inner.hashes.last().cloned().unwrap_or_else(|| ZERO_HASH.to_string());

        if let Some(expected) = expected_prev_hash {
            if expected != current_tip {
                return Err(EventStoreError::Conflict {
                    expected: expected.to_string(),
                    actual: current_tip,
                });
            }
        }

        let seq = inner.events.len() as u64;
        let mut event = event.with_seq(seq);
        let record = chain_record(&current_tip, &event, self.hash_version);
        if self.hash_version == HashVersion::V2 {
            event.hash_version = Some(HashVersion::V2.as_tag().to_string());
        }

        inner.events.push(event.clone());
        inner.hashes.push(record.event_hash.clone());

        Ok(AppendResult {
            event,
            seq,
            event_hash: record.event_hash,
            prev_hash: current_tip,
            committed: true,
            conflict: false,
            observed_prev_hash: None,
        })
    }

    async fn read(
        &self,
        aggregate_id: Option<&str>,
        from_seq: u64,
    ) -> Result<Vec<Event>, EventStoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .events
            .iter()
            .filter(|ev| ev.seq.unwrap_or(0) >= from_seq)
            .filter(|ev| aggregate_id.map_or(true, |id| ev.aggregate_id == id))
            .cloned()
            .collect())
    }

    async fn get_last_hash(&self) -> Result<String, EventStoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.hashes.last().cloned().unwrap_or_else(|| ZERO_HASH.to_string()))
    }

    async fn get_event_hash(&self, seq: u64) -> Result<Option<String>, EventStoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.hashes.get(seq as usize).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn append_assigns_sequential_seqs() {
        let store = MemoryEventStore::new();
        let a = store
            .append(Event::new("AgentObserved", "ns/a", 0, json!({})), None)
            .await
            .unwrap();
        let b = store
            .append(Event::new("AgentObserved", "ns/a", 1, json!({})), None)
            .await
            .unwrap();
        assert_eq!(a.seq, 0);
        assert_eq!(b.seq, 1);
        assert_eq!(b.prev_hash, a.event_hash);
    }

    #[tokio::test]
    async fn cas_conflict_on_stale_expected_hash() {
        let store = MemoryEventStore::new();
        store
            .append(Event::new("AgentObserved", "ns/a", 0, json!({})), None)
            .await
            .unwrap();

        let result = store
            .append(
                Event::new("AgentObserved", "ns/a", 1, json!({})),
                Some(ZERO_HASH),
            )
            .await;
        assert!(matches!(result, Err(EventStoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn append_with_retry_succeeds_despite_stale_reads() {
        let store = MemoryEventStore::new();
        store
            .append(Event::new("AgentObserved", "ns/a", 0, json!({})), None)
            .await
            .unwrap();

        // append_with_retry recomputes expected_prev_hash itself, so this
        // succeeds even though the log already has one event.
        let result = store
            .append_with_retry(Event::new("AgentObserved", "ns/a", 1, json!({})))
            .await
            .unwrap();
        assert_eq!(result.seq, 1);
    }

    #[tokio::test]
    async fn read_filters_by_aggregate_and_from_seq() {
        let store = MemoryEventStore::new();
        store
            .append(Event::new("AgentObserved", "ns/a", 0, json!({})), None)
            .await
            .unwrap();
        store
            .append(Event::new("AgentObserved", "ns/b", 1, json!({})), None)
            .await
            .unwrap();
        store
            .append(Event::new("AgentObserved", "ns/a", 2, json!({})), None)
            .await
            .unwrap();

        let only_a = store.read(Some("ns/a"), 0).await.unwrap();
        assert_eq!(only_a.len(), 2);

        let from_1 = store.read(None, 1).await.unwrap();
        assert_eq!(from_1.len(), 2);
    }

    #[tokio::test]
    async fn get_event_hash_matches_append_result() {
        let store = MemoryEventStore::new();
        let result = store
            .append(Event::new("AgentObserved", "ns/a", 0, json!({})), None)
            .await
            .unwrap();
        let hash = store.get_event_hash(result.seq).await.unwrap();
        assert_eq!(hash, Some(result.event_hash));
    }
}
