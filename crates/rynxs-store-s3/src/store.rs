//! The `S3EventStore` itself.

use crate::config::S3StoreConfig;
use async_trait::async_trait;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use rynxs_events::integrity::{chain_record, hash_event, HashVersion, Record, ZERO_HASH};
use rynxs_events::Event;
use rynxs_store_core::{AppendResult, EventStore, EventStoreError};
use rynxs_types::canonical::canonical_bytes;
use tracing::{debug, info, warn};

/// One-object-per-event S3-compatible event store.
///
/// Writes use conditional `PutObject` (`If-None-Match: *`) so a racing
/// writer that targets the same `seq` always loses cleanly instead of
/// silently overwriting; reads list the prefix, sort by `seq`, and replay
/// the hash chain exactly as [`rynxs_store_file::FileEventStore`] does on
/// its segment files.
pub struct S3EventStore {
    client: Client,
    config: S3StoreConfig,
}

impl S3EventStore {
    /// Build a store from an already-configured SDK client. Runs the
    /// (optional) bucket existence check before returning.
    pub async fn new(client: Client, config: S3StoreConfig) -> Result<Self, EventStoreError> {
        let store = S3EventStore { client, config };
        if !store.config.skip_bucket_check {
            store
                .client
                .head_bucket()
                .bucket(&store.config.bucket)
                .send()
                .await
                .map_err(|e| EventStoreError::Config(format!("bucket '{}' not accessible: {e}", store.config.bucket)))?;
        }
        Ok(store)
    }

    /// Build a store using the default AWS config chain (environment
    /// credentials, `EVENT_STORE_S3_ENDPOINT`, region, ...), per the
    /// documented configuration surface.
    pub async fn from_env(config: S3StoreConfig) -> Result<Self, EventStoreError> {
        let mut loader = aws_config::from_env().region(aws_config::Region::new(config.region.clone()));
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint.clone());
        }
        let sdk_config = loader.load().await;
        let client = Client::new(&sdk_config);
        S3EventStore::new(client, config).await
    }

    async fn get_object_string(&self, key: &str) -> Result<Option<String>, EventStoreError> {
        match self.client.get_object().bucket(&self.config.bucket).key(key).send().await {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| EventStoreError::Io(format!("reading S3 object {key}: {e}")))?;
                let text = String::from_utf8(bytes.into_bytes().to_vec())
                    .map_err(|e| EventStoreError::Integrity(format!("non-UTF8 object body at {key}: {e}")))?;
                Ok(Some(text))
            }
            Err(SdkError::ServiceError(e)) if e.err().is_no_such_key() => Ok(None),
            Err(e) => Err(EventStoreError::Io(format!("GetObject {key}: {e}"))),
        }
    }

    /// Conditional put: succeeds only if no object currently exists at
    /// `key`. Returns `false` (never an error) on the expected
    /// already-exists precondition failure so the caller can treat it as an
    /// ordinary CAS conflict.
    async fn put_if_absent(&self, key: &str, body: &str) -> Result<bool, EventStoreError> {
        let result = self
            .client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .content_type("application/json")
            .if_none_match("*")
            .body(ByteStream::from(body.as_bytes().to_vec()))
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(e)) if is_precondition_failed(e.raw().status().as_u16()) => Ok(false),
            Err(e) => Err(EventStoreError::Io(format!("PutObject {key}: {e}"))),
        }
    }

    async fn list_seqs(&self) -> Result<Vec<u64>, EventStoreError> {
        let mut seqs = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let mut req = self
                .client
                .list_objects_v2()
                .bucket(&self.config.bucket)
                .prefix(format!("{}/", self.config.prefix));
            if let Some(token) = &continuation {
                req = req.continuation_token(token);
            }
            let page = req.send().await.map_err(|e| EventStoreError::Io(format!("ListObjectsV2: {e}")))?;
            for obj in page.contents() {
                if let Some(key) = obj.key() {
                    if let Some(seq) = self.config.seq_from_key(key) {
                        seqs.push(seq);
                    }
                }
            }
            if page.is_truncated().unwrap_or(false) {
                continuation = page.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }
        seqs.sort_unstable();
        Ok(seqs)
    }

    /// `None` for the tail seq means the log is empty (no object has been
    /// written yet); the next append then gets `seq = 0`.
    async fn scan_last_seq_and_hash(&self) -> Result<(Option<u64>, String), EventStoreError> {
        let seqs = self.list_seqs().await?;
        match seqs.last() {
            None => Ok((None, ZERO_HASH.to_string())),
            Some(&seq) => {
                let key = self.config.key_for_seq(seq);
                let body = self
                    .get_object_string(&key)
                    .await?
                    .ok_or_else(|| EventStoreError::Integrity(format!("listed key {key} vanished before read")))?;
                let record: Record = serde_json::from_str(&body)?;
                Ok((Some(seq), record.event_hash))
            }
        }
    }

    async fn read_head_cache(&self) -> Option<(u64, String)> {
        if !self.config.use_head_cache {
            return None;
        }
        let body = self.get_object_string(&self.config.head_key).await.ok().flatten()?;
        let value: serde_json::Value = serde_json::from_str(&body).ok()?;
        let seq = value.get("last_seq")?.as_u64()?;
        let hash = value.get("last_hash")?.as_str()?.to_string();
        Some((seq, hash))
    }

    async fn write_head_cache(&self, seq: u64, hash: &str) {
        if !self.config.use_head_cache {
            return;
        }
        // Best-effort: the head cache is advisory and re-verified by a scan
        // whenever it matters for correctness, so failures here are logged
        // and swallowed rather than propagated.
        let payload = serde_json::json!({"last_seq": seq, "last_hash": hash});
        let body = match canonical_bytes(&payload) {
            Ok(b) => b,
            Err(_) => return,
        };
        let body_str = String::from_utf8_lossy(&body).to_string();
        if let Err(e) = self
            .client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&self.config.head_key)
            .content_type("application/json")
            .body(ByteStream::from(body.clone()))
            .send()
            .await
        {
            warn!(error = %e, key = %self.config.head_key, "failed to update S3 head cache");
        } else {
            debug!(seq, %body_str, "updated S3 head cache");
        }
    }

    async fn last_seq_and_hash(&self) -> Result<(Option<u64>, String), EventStoreError> {
        if let Some((seq, hash)) = self.read_head_cache().await {
            return Ok((Some(seq), hash));
        }
        self.scan_last_seq_and_hash().await
    }
}

fn is_precondition_failed(status: u16) -> bool {
    status == 412
}

#[async_trait]
impl EventStore for S3EventStore {
    async fn append(
        &self,
        event: Event,
        expected_prev_hash: Option<&str>,
    ) -> Result<AppendResult, EventStoreError> {
        let (last_seq, last_hash) = self.last_seq_and_hash().await?;

        if let Some(expected) = expected_prev_hash {
            if expected != last_hash {
                return Err(EventStoreError::Conflict {
                    expected: expected.to_string(),
                    actual: last_hash,
                });
            }
        }

        let seq = last_seq.map_or(0, |s| s + 1);
        let event = event.with_seq(seq);
        let record = chain_record(&last_hash, &event, self.config.hash_version);
        let body = serde_json::to_string(&record)?;
        let key = self.config.key_for_seq(seq);

        let committed = self.put_if_absent(&key, &body).await?;
        if !committed {
            let (observed_seq, observed_hash) = self.scan_last_seq_and_hash().await?;
            debug!(seq, ?observed_seq, "S3 append conflict: object already exists at key");
            return Err(EventStoreError::Conflict {
                expected: last_hash,
                actual: observed_hash,
            });
        }

        self.write_head_cache(seq, &record.event_hash).await;
        info!(seq, event_hash = %record.event_hash, "appended event to S3");

        Ok(AppendResult {
            event,
            seq,
            event_hash: record.event_hash,
            prev_hash: last_hash,
            committed: true,
            conflict: false,
            observed_prev_hash: None,
        })
    }

    async fn read(&self, aggregate_id: Option<&str>, from_seq: u64) -> Result<Vec<Event>, EventStoreError> {
        let seqs = self.list_seqs().await?;
        let mut out = Vec::new();
        let mut expected_prev = ZERO_HASH.to_string();
        let mut expected_seq = 0u64;

        for seq in seqs {
            let key = self.config.key_for_seq(seq);
            let body = self
                .get_object_string(&key)
                .await?
                .ok_or_else(|| EventStoreError::Integrity(format!("listed key {key} vanished before read")))?;
            let record: Record = serde_json::from_str(&body)?;

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
            let event: Event = serde_json::from_value(record.event.clone())
                .map_err(|e| EventStoreError::Integrity(format!("malformed event record at seq {seq}: {e}")))?;
            let recomputed = hash_event(&record.prev_hash, &event, hash_version);
            if recomputed != record.event_hash {
                return Err(EventStoreError::Integrity(format!(
                    "event_hash mismatch at seq {seq}: expected {}, recomputed {recomputed}",
                    record.event_hash
                )));
            }

            expected_seq += 1;
            expected_prev = record.event_hash;

            if seq < from_seq {
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
        let (_, hash) = self.last_seq_and_hash().await?;
        Ok(hash)
    }

    async fn get_event_hash(&self, seq: u64) -> Result<Option<String>, EventStoreError> {
        let key = self.config.key_for_seq(seq);
        match self.get_object_string(&key).await? {
            None => Ok(None),
            Some(body) => {
                let record: Record = serde_json::from_str(&body)?;
                Ok(Some(record.event_hash))
            }
        }
    }
}

fn infer_hash_version(event_dict: &serde_json::Value) -> HashVersion {
    HashVersion::from_record_tag(event_dict.get("hash_version").and_then(|v| v.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_cache_payload_is_canonical() {
        let payload = serde_json::json!({"last_seq": 7u64, "last_hash": "abc"});
        let bytes = canonical_bytes(&payload).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"last_hash":"abc","last_seq":7}"#);
    }

    #[test]
    fn infer_hash_version_defaults_to_v1_without_tag() {
        let dict = serde_json::json!({"type": "AgentObserved"});
        assert_eq!(infer_hash_version(&dict), HashVersion::V1);
    }

    #[test]
    fn infer_hash_version_reads_v2_tag() {
        let dict = serde_json::json!({"hash_version": "v2"});
        assert_eq!(infer_hash_version(&dict), HashVersion::V2);
    }
}
