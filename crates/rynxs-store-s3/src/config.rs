//! Configuration for the S3-compatible backend.

use rynxs_events::integrity::HashVersion;

/// Configuration for an [`crate::S3EventStore`].
#[derive(Debug, Clone)]
pub struct S3StoreConfig {
    /// Target bucket name.
    pub bucket: String,
    /// Key prefix events are written under (default `"events"`). Trailing
    /// slashes are stripped.
    pub prefix: String,
    /// Optional S3-compatible endpoint override (MinIO, LocalStack, ...).
    pub endpoint_url: Option<String>,
    /// AWS region.
    pub region: String,
    /// Whether to maintain and trust (subject to verification) the
    /// best-effort `<prefix>/_head.json` cache object.
    pub use_head_cache: bool,
    /// Key the head cache object is stored under. Defaults to
    /// `<prefix>/_head.json`.
    pub head_key: String,
    /// Skip the startup `HeadBucket` existence check (useful against
    /// backends or IAM policies that don't grant it).
    pub skip_bucket_check: bool,
    /// Hash version used for new appends.
    pub hash_version: HashVersion,
}

impl S3StoreConfig {
    /// Build a config for `bucket`, reading the rest from the documented
    /// environment variables, falling back to the documented defaults.
    pub fn from_env(bucket: impl Into<String>) -> Self {
        let bucket = bucket.into();
        let prefix = std::env::var("EVENT_STORE_S3_PREFIX")
            .unwrap_or_else(|_| "events".to_string())
            .trim_end_matches('/')
            .to_string();
        let endpoint_url = std::env::var("EVENT_STORE_S3_ENDPOINT").ok();
        let region = std::env::var("EVENT_STORE_S3_REGION").unwrap_or_else(|_| "us-east-1".to_string());
        let use_head_cache = std::env::var("RYNXS_S3_USE_HEAD")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(true);
        let head_key = std::env::var("RYNXS_S3_HEAD_KEY").unwrap_or_else(|_| format!("{prefix}/_head.json"));
        let skip_bucket_check = std::env::var("RYNXS_S3_SKIP_BUCKET_CHECK")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let hash_version = HashVersion::from_env_str(std::env::var("RYNXS_HASH_VERSION").ok().as_deref());

        S3StoreConfig {
            bucket,
            prefix,
            endpoint_url,
            region,
            use_head_cache,
            head_key,
            skip_bucket_check,
            hash_version,
        }
    }

    /// The object key for a given sequence number, zero-padded to 10 digits
    /// so lexicographic S3 listing order matches numeric `seq` order.
    pub fn key_for_seq(&self, seq: u64) -> String {
        format!("{}/{:010}.json", self.prefix, seq)
    }

    /// Recover the `seq` encoded in an object key produced by
    /// [`Self::key_for_seq`], or `None` if `key` doesn't match that shape
    /// (e.g. the head cache object, or a key outside our prefix).
    pub fn seq_from_key(&self, key: &str) -> Option<u64> {
        let rest = key.strip_prefix(&self.prefix)?.strip_prefix('/')?;
        let digits = rest.strip_suffix(".json")?;
        digits.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_round_trips_through_seq() {
        let cfg = S3StoreConfig {
            bucket: "b".into(),
            prefix: "events".into(),
            endpoint_url: None,
            region: "us-east-1".into(),
            use_head_cache: true,
            head_key: "events/_head.json".into(),
            skip_bucket_check: true,
            hash_version: HashVersion::V2,
        };
        let key = cfg.key_for_seq(42);
        assert_eq!(key, "events/0000000042.json");
        assert_eq!(cfg.seq_from_key(&key), Some(42));
        assert_eq!(cfg.seq_from_key("events/_head.json"), None);
    }
}
