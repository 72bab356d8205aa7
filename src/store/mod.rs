//! Crash-safe snapshot persistence.
//!
//! The whole aggregate (feeds, items, filters) is serialized as one JSON
//! document. Saving rotates through three sibling files:
//!
//! ```text
//! write <name>.tmp  →  rotate <name> to <name>.bak  →  rename .tmp to <name>
//! ```
//!
//! so at any instant at least one of `<name>` / `<name>.bak` holds a
//! complete, valid snapshot, even if the process dies mid-write. Loading
//! tries the three paths in order and takes the first that deserializes.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{Feed, Filter, Item};

/// The full durable state of the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub feeds: Vec<Feed>,
    pub items: Vec<Item>,
    pub filters: Vec<Filter>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// None of main, backup, or temp deserialized; fatal to startup.
    #[error("no usable snapshot at {path} (backup and temp also failed)")]
    Unavailable { path: PathBuf },

    /// A save failed mid-rotation; the previous main file is still valid.
    #[error("failed to write snapshot to {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        append_extension(&self.path, "tmp")
    }

    fn bak_path(&self) -> PathBuf {
        append_extension(&self.path, "bak")
    }

    /// Persist a snapshot with the three-file rotation.
    pub fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let tmp = self.tmp_path();
        let bak = self.bak_path();

        let bytes = serde_json::to_vec_pretty(snapshot).map_err(|e| StoreError::Write {
            path: tmp.clone(),
            source: e.into(),
        })?;
        fs::write(&tmp, bytes).map_err(|e| StoreError::Write {
            path: tmp.clone(),
            source: e,
        })?;

        // Rotate the previous main file out of the way. Both steps are
        // best-effort: on the very first save there is nothing to rotate.
        let _ = fs::remove_file(&bak);
        let _ = fs::rename(&self.path, &bak);

        fs::rename(&tmp, &self.path).map_err(|e| StoreError::Write {
            path: self.path.clone(),
            source: e,
        })?;

        let _ = fs::remove_file(&bak);

        debug!(path = %self.path.display(), "snapshot saved");
        Ok(())
    }

    /// Load the most recent complete snapshot, falling back to the backup
    /// and then the temp file.
    pub fn load(&self) -> Result<Snapshot, StoreError> {
        for path in [&self.path, &self.bak_path(), &self.tmp_path()] {
            match fs::read(path) {
                Ok(bytes) => match serde_json::from_slice::<Snapshot>(&bytes) {
                    Ok(snapshot) => return Ok(snapshot),
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "snapshot unreadable, trying next");
                    }
                },
                Err(_) => continue,
            }
        }
        Err(StoreError::Unavailable {
            path: self.path.clone(),
        })
    }

    /// Load the snapshot, or start empty when no snapshot file exists yet.
    ///
    /// A snapshot that exists but is unreadable in all three locations still
    /// fails, so corrupted state is never silently discarded.
    pub fn load_or_default(&self) -> Result<Snapshot, StoreError> {
        let any_present = [self.path.clone(), self.bak_path(), self.tmp_path()]
            .iter()
            .any(|p| p.exists());
        if !any_present {
            return Ok(Snapshot::default());
        }
        self.load()
    }
}

/// `feeds.json` → `feeds.json.bak`, keeping the original extension.
fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".");
    os.push(ext);
    PathBuf::from(os)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Feed, Filter};
    use tempfile::TempDir;

    fn sample_snapshot() -> Snapshot {
        let mut feed = Feed::new("https://example.com/feed.xml".into(), 900);
        feed.title = "Example".into();
        feed.seen.insert("token-1".into());
        let filter = Filter::new("rust".into()).unwrap();
        Snapshot {
            feeds: vec![feed],
            items: Vec::new(),
            filters: vec![filter],
        }
    }

    fn store_in(dir: &TempDir) -> SnapshotStore {
        SnapshotStore::new(dir.path().join("feeds.json"))
    }

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let snapshot = sample_snapshot();

        store.save(&snapshot).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded.feeds.len(), 1);
        assert_eq!(loaded.feeds[0].uuid, snapshot.feeds[0].uuid);
        assert_eq!(loaded.feeds[0].title, "Example");
        assert!(loaded.feeds[0].seen.contains("token-1"));
        assert_eq!(loaded.filters[0].query, "rust");
    }

    #[test]
    fn test_save_cleans_up_rotation_files() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.save(&sample_snapshot()).unwrap();
        store.save(&sample_snapshot()).unwrap();

        assert!(store.path().exists());
        assert!(!store.tmp_path().exists());
        assert!(!store.bak_path().exists());
    }

    #[test]
    fn test_load_missing_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(matches!(store.load(), Err(StoreError::Unavailable { .. })));
    }

    #[test]
    fn test_load_or_default_starts_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let snapshot = store.load_or_default().unwrap();
        assert!(snapshot.feeds.is_empty());
        assert!(snapshot.items.is_empty());
    }

    #[test]
    fn test_corrupt_main_falls_back_to_backup() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let good = serde_json::to_vec(&sample_snapshot()).unwrap();
        fs::write(store.bak_path(), good).unwrap();
        fs::write(store.path(), b"{corrupt").unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.feeds.len(), 1);
    }

    #[test]
    fn test_crash_before_rename_keeps_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        // A valid main snapshot exists...
        store.save(&sample_snapshot()).unwrap();
        let before = store.load().unwrap();

        // ...then the process dies after writing the temp file but before
        // any rotation: main must still win.
        let mut newer = sample_snapshot();
        newer.feeds[0].title = "Newer".into();
        fs::write(store.tmp_path(), serde_json::to_vec(&newer).unwrap()).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.feeds[0].title, before.feeds[0].title);
    }

    #[test]
    fn test_crash_after_rename_loads_new_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        // Simulate death after the rename but before backup cleanup: a new
        // main and a stale backup both exist.
        let old = sample_snapshot();
        fs::write(store.bak_path(), serde_json::to_vec(&old).unwrap()).unwrap();
        let mut new = sample_snapshot();
        new.feeds[0].title = "Newer".into();
        fs::write(store.path(), serde_json::to_vec(&new).unwrap()).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.feeds[0].title, "Newer");
    }

    #[test]
    fn test_only_temp_file_present_is_still_loadable() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        fs::write(
            store.tmp_path(),
            serde_json::to_vec(&sample_snapshot()).unwrap(),
        )
        .unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.feeds.len(), 1);
    }

    #[test]
    fn test_old_snapshot_schema_defaults() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        // An old snapshot knowing nothing of filters or counters
        let json = r#"{
            "feeds": [{
                "uuid": "abc",
                "url": "https://example.com/feed.xml",
                "enabled": true,
                "interval": 900
            }],
            "items": []
        }"#;
        fs::write(store.path(), json).unwrap();

        let loaded = store.load().unwrap();
        assert!(loaded.filters.is_empty());
        assert_eq!(loaded.feeds[0].clicks, 0);
        assert_eq!(loaded.feeds[0].item_count, 0);
    }
}
