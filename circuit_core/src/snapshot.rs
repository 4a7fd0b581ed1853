//! Whole-profile snapshots for backup and device transfer.
//!
//! Restoring replaces every stored key with the snapshot's contents; the
//! last writer wins.

use crate::custom::load_custom_exercises;
use crate::feedback::load_feedback;
use crate::filter::Filters;
use crate::history::load_history;
use crate::store::{
    KeyValueStore, KeyValueStoreExt, CUSTOM_EXERCISES_KEY, FEEDBACK_KEY, FILTERS_KEY, HISTORY_KEY,
    SETTINGS_KEY,
};
use crate::{Error, ExerciseRecord, FeedbackMap, Result, SessionRecord, SessionSettings};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Everything needed to recreate a profile elsewhere
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub settings: SessionSettings,
    #[serde(default)]
    pub filters: Filters,
    #[serde(default)]
    pub feedback: FeedbackMap,
    #[serde(default)]
    pub history: Vec<SessionRecord>,
    #[serde(default)]
    pub custom_exercises: Vec<ExerciseRecord>,
    pub taken_at: DateTime<Utc>,
}

impl Snapshot {
    /// Read the current state out of a store
    pub fn capture<S: KeyValueStore + ?Sized>(store: &S) -> Self {
        Self {
            settings: store.get(SETTINGS_KEY, SessionSettings::default()),
            filters: store.get(FILTERS_KEY, Filters::new()),
            feedback: load_feedback(store),
            history: load_history(store),
            custom_exercises: load_custom_exercises(store),
            taken_at: Utc::now(),
        }
    }

    /// Overwrite every key in `store` with this snapshot
    pub fn restore_into<S: KeyValueStore + ?Sized>(&self, store: &mut S) -> Result<()> {
        store.set(SETTINGS_KEY, &self.settings)?;
        store.set(FILTERS_KEY, &self.filters)?;
        store.set(FEEDBACK_KEY, &self.feedback)?;
        store.set(HISTORY_KEY, &self.history)?;
        store.set(CUSTOM_EXERCISES_KEY, &self.custom_exercises)?;

        tracing::info!(
            "Restored snapshot from {} ({} sessions)",
            self.taken_at.to_rfc3339(),
            self.history.len()
        );
        Ok(())
    }
}

/// Transport for snapshots
pub trait SnapshotSync {
    fn push(&mut self, snapshot: &Snapshot) -> Result<()>;

    /// The latest pushed snapshot, if any
    fn pull(&self) -> Result<Option<Snapshot>>;
}

/// Snapshot kept as a single JSON file
#[derive(Clone, Debug)]
pub struct FileSnapshotSync {
    path: PathBuf,
}

impl FileSnapshotSync {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSync for FileSnapshotSync {
    /// Write atomically via a temp file in the same directory
    fn push(&mut self, snapshot: &Snapshot) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut temp = NamedTempFile::new_in(&dir)?;
        let contents = serde_json::to_string_pretty(snapshot)?;
        temp.write_all(contents.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        tracing::info!("Pushed snapshot to {:?}", self.path);
        Ok(())
    }

    fn pull(&self) -> Result<Option<Snapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)?;
        let snapshot = serde_json::from_str(&contents)?;
        tracing::info!("Pulled snapshot from {:?}", self.path);
        Ok(Some(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Facet;
    use crate::store::MemoryStore;
    use crate::FeedbackEntry;
    use uuid::Uuid;

    fn populated_store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store
            .set(
                SETTINGS_KEY,
                &SessionSettings {
                    body_weight_kg: 64.0,
                    difficulty_bias: 1.0,
                    ..SessionSettings::default()
                },
            )
            .unwrap();
        store
            .set(FILTERS_KEY, &Filters::new().with(Facet::NoiseLevel, ["quiet"]))
            .unwrap();
        let mut feedback = FeedbackMap::new();
        feedback.insert(
            "pushup".into(),
            FeedbackEntry {
                avg_score: 7.0,
                count: 2,
            },
        );
        store.set(FEEDBACK_KEY, &feedback).unwrap();
        store
            .set(
                HISTORY_KEY,
                &vec![SessionRecord {
                    id: Uuid::new_v4(),
                    timestamp: Utc::now(),
                    perceived_exertion: 6,
                    calories_burned: 46,
                    duration_seconds: 540,
                }],
            )
            .unwrap();
        store
    }

    #[test]
    fn test_capture_and_restore() {
        let source = populated_store();
        let snapshot = Snapshot::capture(&source);
        assert_eq!(snapshot.settings.body_weight_kg, 64.0);
        assert_eq!(snapshot.history.len(), 1);

        let mut target = MemoryStore::new();
        snapshot.restore_into(&mut target).unwrap();

        let restored = Snapshot::capture(&target);
        assert_eq!(restored.settings, snapshot.settings);
        assert_eq!(restored.filters, snapshot.filters);
        assert_eq!(restored.feedback, snapshot.feedback);
        assert_eq!(restored.history, snapshot.history);
    }

    #[test]
    fn test_restore_replaces_existing_state() {
        let mut target = populated_store();
        let empty = Snapshot::capture(&MemoryStore::new());
        empty.restore_into(&mut target).unwrap();

        assert!(load_history(&target).is_empty());
        assert!(load_feedback(&target).is_empty());
    }

    #[test]
    fn test_file_sync_push_pull() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut sync = FileSnapshotSync::new(temp_dir.path().join("backup").join("snapshot.json"));
        assert!(sync.pull().unwrap().is_none());

        let snapshot = Snapshot::capture(&populated_store());
        sync.push(&snapshot).unwrap();

        let pulled = sync.pull().unwrap().unwrap();
        assert_eq!(pulled, snapshot);
    }

    #[test]
    fn test_file_sync_rejects_garbage() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("snapshot.json");
        std::fs::write(&path, "not json").unwrap();

        let sync = FileSnapshotSync::new(&path);
        assert!(matches!(sync.pull(), Err(Error::Json(_))));
    }
}
