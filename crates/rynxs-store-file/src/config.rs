//! Configuration for the segmented file backend.

use rynxs_events::integrity::HashVersion;
use std::path::PathBuf;

/// Default segment rotation threshold, matching the original engine's
/// `EVENT_STORE_MAX_BYTES` default.
pub const DEFAULT_MAX_BYTES: u64 = 64 * 1024 * 1024;

/// Default number of retained rotated segments before the oldest is pruned,
/// matching `EVENT_STORE_MAX_SEGMENTS`.
pub const DEFAULT_MAX_SEGMENTS: usize = 10;

/// Configuration for a [`crate::FileEventStore`].
#[derive(Debug, Clone)]
pub struct FileStoreConfig {
    /// Path to the active log file. Segment files and the head cache live
    /// alongside it (`<path>.seg-NNNNNN`, `<path>.head.json`).
    pub path: PathBuf,
    /// Rotate the active file once it would exceed this many bytes.
    pub max_bytes: u64,
    /// Maximum number of rotated segment files to retain. `0` means
    /// unlimited.
    pub max_segments: usize,
    /// Hash version used for new appends. Existing logs written under a
    /// different version remain readable; this only affects this process's
    /// writes.
    pub hash_version: HashVersion,
}

impl FileStoreConfig {
    /// Build a config pointing at `path`, reading `EVENT_STORE_MAX_BYTES`,
    /// `EVENT_STORE_MAX_SEGMENTS`, and `RYNXS_HASH_VERSION` from the process
    /// environment, falling back to the documented defaults.
    pub fn from_env(path: impl Into<PathBuf>) -> Self {
        let max_bytes = std::env::var("EVENT_STORE_MAX_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_BYTES);
        let max_segments = std::env::var("EVENT_STORE_MAX_SEGMENTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_SEGMENTS);
        let hash_version = HashVersion::from_env_str(std::env::var("RYNXS_HASH_VERSION").ok().as_deref());

        FileStoreConfig {
            path: path.into(),
            max_bytes,
            max_segments,
            hash_version,
        }
    }
}
