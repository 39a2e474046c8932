//! Head cache and segment path bookkeeping.

use rynxs_events::integrity::ZERO_HASH;
use rynxs_store_core::EventStoreError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// The small JSON sidecar recording the chain tip and segment counter, read
/// on open and rewritten after every append/rotation.
///
/// `last_seq` is `None` for an empty log (so the first committed event gets
/// `seq = 0`, not `1`); `Some(seq)` once at least one record has landed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Head {
    pub last_seq: Option<u64>,
    pub last_hash: String,
    pub segment_index: u64,
}

impl Default for Head {
    fn default() -> Self {
        Head {
            last_seq: None,
            last_hash: ZERO_HASH.to_string(),
            segment_index: 0,
        }
    }
}

pub(crate) fn head_path(active_path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.head.json", active_path.display()))
}

pub(crate) fn segment_path(active_path: &Path, index: u64) -> PathBuf {
    PathBuf::from(format!("{}.seg-{:06}", active_path.display(), index))
}

pub(crate) fn read_head(active_path: &Path) -> Result<Head, EventStoreError> {
    let path = head_path(active_path);
    if !path.exists() {
        return Ok(Head::default());
    }
    let bytes = fs::read(&path)?;
    serde_json::from_slice(&bytes).map_err(EventStoreError::from)
}

pub(crate) fn write_head(active_path: &Path, head: &Head) -> Result<(), EventStoreError> {
    let path = head_path(active_path);
    let bytes = serde_json::to_vec(head)?;
    fs::write(&path, bytes)?;
    Ok(())
}

/// All previously rotated segment paths that currently exist on disk, in
/// ascending order.
pub(crate) fn existing_segment_paths(active_path: &Path, head: &Head) -> Vec<PathBuf> {
    (0..head.segment_index)
        .map(|idx| segment_path(active_path, idx))
        .filter(|p| p.exists())
        .collect()
}

/// Remove the oldest rotated segments beyond `max_segments`, if any.
pub(crate) fn prune_segments(active_path: &Path, head: &Head, max_segments: usize) -> Result<(), EventStoreError> {
    if max_segments == 0 {
        return Ok(());
    }
    let mut segments = existing_segment_paths(active_path, head);
    if segments.len() <= max_segments {
        return Ok(());
    }
    segments.sort();
    let excess = segments.len() - max_segments;
    for path in segments.into_iter().take(excess) {
        fs::remove_file(path)?;
    }
    Ok(())
}
