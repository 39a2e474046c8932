//! File-based persistence for [`Checkpoint`] records.
//!
//! Grounded in `engine/checkpoint/store.py::CheckpointStore`. One checkpoint
//! per file, named `cp_<event_index>_<event_hash[:8]>.json` so a directory
//! listing alone gives a replay-ordered view without opening any file.

use crate::error::CheckpointError;
use crate::model::Checkpoint;
use std::path::{Path, PathBuf};

/// A directory of checkpoint files, oldest-first by `event_index`.
pub struct CheckpointStore {
    directory: PathBuf,
}

impl CheckpointStore {
    /// Open (without requiring it to exist yet) a checkpoint directory.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        CheckpointStore {
            directory: directory.into(),
        }
    }

    fn filename_for(checkpoint: &Checkpoint) -> String {
        let hash8: String = checkpoint.event_hash.chars().take(8).collect();
        format!("cp_{}_{}.json", checkpoint.event_index, hash8)
    }

    /// Write `checkpoint` to a new file in this store's directory and
    /// return its path.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<PathBuf, CheckpointError> {
        std::fs::create_dir_all(&self.directory)?;
        let path = self.directory.join(Self::filename_for(checkpoint));
        std::fs::write(&path, checkpoint.to_json()?)?;
        Ok(path)
    }

    /// Load the checkpoint stored at `path`.
    pub fn load(&self, path: &Path) -> Result<Checkpoint, CheckpointError> {
        let text = std::fs::read_to_string(path)?;
        Ok(Checkpoint::from_json(&text)?)
    }

    /// All checkpoint files in this store's directory, ascending by
    /// `event_index`. Returns an empty list if the directory doesn't exist.
    pub fn list_checkpoints(&self) -> Result<Vec<PathBuf>, CheckpointError> {
        if !self.directory.exists() {
            return Ok(Vec::new());
        }
        let mut entries: Vec<(u64, PathBuf)> = Vec::new();
        for entry in std::fs::read_dir(&self.directory)? {
            let entry = entry?;
            let path = entry.path();
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(n) => n,
                None => continue,
            };
            if !(name.starts_with("cp_") && name.ends_with(".json")) {
                continue;
            }
            let event_index = parse_event_index(name)?;
            entries.push((event_index, path));
        }
        entries.sort_by_key(|(idx, _)| *idx);
        Ok(entries.into_iter().map(|(_, p)| p).collect())
    }

    /// The most recent checkpoint file, if any exist.
    pub fn find_latest(&self) -> Result<Option<PathBuf>, CheckpointError> {
        Ok(self.list_checkpoints()?.into_iter().last())
    }

    /// The checkpoint with the largest `event_index` that is still
    /// `<= event_index`, if one exists. The replay runner uses this to
    /// find the fastest starting point for a target sequence number.
    pub fn find_at_or_before(&self, event_index: u64) -> Result<Option<PathBuf>, CheckpointError> {
        let mut found = None;
        for path in self.list_checkpoints()? {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            let idx = parse_event_index(name)?;
            if idx <= event_index {
                found = Some(path);
            } else {
                break;
            }
        }
        Ok(found)
    }

    /// Remove a checkpoint file.
    pub fn delete(&self, path: &Path) -> Result<(), CheckpointError> {
        std::fs::remove_file(path)?;
        Ok(())
    }

    /// Delete all but the `keep_count` most recent checkpoints.
    pub fn rotate(&self, keep_count: usize) -> Result<(), CheckpointError> {
        let checkpoints = self.list_checkpoints()?;
        if checkpoints.len() <= keep_count {
            return Ok(());
        }
        let drop_count = checkpoints.len() - keep_count;
        for path in &checkpoints[..drop_count] {
            self.delete(path)?;
        }
        Ok(())
    }
}

fn parse_event_index(filename: &str) -> Result<u64, CheckpointError> {
    let stripped = filename
        .strip_prefix("cp_")
        .and_then(|s| s.rsplit_once('_'))
        .map(|(idx, _hash_json)| idx)
        .ok_or_else(|| CheckpointError::MalformedFilename(filename.to_string()))?;
    stripped
        .parse::<u64>()
        .map_err(|_| CheckpointError::MalformedFilename(filename.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn checkpoint(event_index: u64, event_hash: &str) -> Checkpoint {
        Checkpoint {
            version: 1,
            event_index,
            event_hash: event_hash.to_string(),
            state_hash: "s".into(),
            state_bytes: "b".into(),
            created_at_logical: 0,
            pubkey_id: "p".into(),
            signature: "sig".into(),
            meta: json!({}),
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        let cp = checkpoint(5, "abcdef0123456789");
        let path = store.save(&cp).unwrap();
        assert_eq!(path.file_name().unwrap(), "cp_5_abcdef01.json");
        let loaded = store.load(&path).unwrap();
        assert_eq!(loaded, cp);
    }

    #[test]
    fn list_checkpoints_is_sorted_by_event_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        store.save(&checkpoint(20, "bb")).unwrap();
        store.save(&checkpoint(5, "aa")).unwrap();
        store.save(&checkpoint(10, "cc")).unwrap();

        let names: Vec<String> = store
            .list_checkpoints()
            .unwrap()
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["cp_5_aa.json", "cp_10_cc.json", "cp_20_bb.json"]);
    }

    #[test]
    fn find_at_or_before_picks_nearest_not_after() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        store.save(&checkpoint(5, "aa")).unwrap();
        store.save(&checkpoint(10, "cc")).unwrap();
        store.save(&checkpoint(20, "bb")).unwrap();

        let found = store.find_at_or_before(12).unwrap().unwrap();
        assert_eq!(found.file_name().unwrap(), "cp_10_cc.json");

        assert!(store.find_at_or_before(4).unwrap().is_none());
    }

    #[test]
    fn rotate_keeps_only_the_most_recent() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        for i in 0..5u64 {
            store.save(&checkpoint(i, "aa")).unwrap();
        }
        store.rotate(2).unwrap();
        let remaining = store.list_checkpoints().unwrap();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0].file_name().unwrap(), "cp_3_aa.json");
        assert_eq!(remaining[1].file_name().unwrap(), "cp_4_aa.json");
    }
}
