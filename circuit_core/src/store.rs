//! Key-value persistence for settings, history and feedback.
//!
//! The engine only depends on a narrow get/set contract. `JsonFileStore`
//! keeps one JSON document per key with file locking; `MemoryStore` keeps
//! everything in-process.

use crate::{Error, Result};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::NamedTempFile;

/// Store key for [`crate::SessionSettings`]
pub const SETTINGS_KEY: &str = "settings";
/// Store key for the session history (`Vec<SessionRecord>`)
pub const HISTORY_KEY: &str = "workouts";
/// Store key for the per-exercise feedback map
pub const FEEDBACK_KEY: &str = "ex_feedback";
/// Store key for user-authored exercises
pub const CUSTOM_EXERCISES_KEY: &str = "custom_exercises";
/// Store key for the active filter selection
pub const FILTERS_KEY: &str = "filters";

/// Raw key-value contract
pub trait KeyValueStore {
    /// Read the value stored under `key`, if any
    fn get_raw(&self, key: &str) -> Result<Option<Value>>;

    /// Replace the value stored under `key`
    fn set_raw(&mut self, key: &str, value: Value) -> Result<()>;
}

/// Typed helpers over [`KeyValueStore`]
pub trait KeyValueStoreExt: KeyValueStore {
    /// Read a typed value, falling back to `default` when the key is
    /// missing, unreadable or malformed
    fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.get_raw(key) {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::warn!("Malformed value under {:?}: {}. Using default.", key, e);
                    default
                }
            },
            Ok(None) => default,
            Err(e) => {
                tracing::warn!("Failed to read {:?}: {}. Using default.", key, e);
                default
            }
        }
    }

    /// Serialize and store a typed value
    fn set<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.set_raw(key, value)
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStoreExt for S {}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get_raw(&self, key: &str) -> Result<Option<Value>> {
        (**self).get_raw(key)
    }

    fn set_raw(&mut self, key: &str, value: Value) -> Result<()> {
        (**self).set_raw(key, value)
    }
}

// ============================================================================
// JSON file store
// ============================================================================

/// Directory-backed store writing `<dir>/<key>.json`
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(Error::Store(format!("invalid key {:?}", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }

    /// Open the sidecar `<key>.lock` file that serializes access to a key
    ///
    /// The data file itself is replaced on every write, so it cannot carry
    /// the lock.
    fn lock_file(&self, key: &str) -> Result<File> {
        let path = self.dir.join(format!("{}.lock", key));
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Ok(file)
    }
}

impl KeyValueStore for JsonFileStore {
    /// Read under a shared lock on the key's sidecar lock file
    ///
    /// A corrupted file is reported as missing so callers fall back to
    /// defaults instead of failing.
    fn get_raw(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }

        let lock = self.lock_file(key)?;
        lock.lock_shared()?;
        let read = std::fs::read_to_string(&path);
        lock.unlock()?;
        let contents = read?;

        match serde_json::from_str::<Value>(&contents) {
            Ok(value) => {
                tracing::debug!("Loaded {:?} from {:?}", key, path);
                Ok(Some(value))
            }
            Err(e) => {
                tracing::warn!("Failed to parse {:?}: {}. Treating as empty.", path, e);
                Ok(None)
            }
        }
    }

    /// Write atomically under an exclusive lock: temp file, fsync, rename
    fn set_raw(&mut self, key: &str, value: Value) -> Result<()> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir)?;
        let contents = serde_json::to_string(&value)?;

        let lock = self.lock_file(key)?;
        lock.lock_exclusive()?;
        let written = write_atomic(&self.dir, &path, contents.as_bytes());
        lock.unlock()?;
        written?;

        tracing::debug!("Saved {:?} to {:?}", key, path);
        Ok(())
    }
}

fn write_atomic(dir: &Path, path: &Path, contents: &[u8]) -> Result<()> {
    let temp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = std::io::BufWriter::new(temp.as_file());
        writer.write_all(contents)?;
        writer.flush()?;
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

// ============================================================================
// In-memory store
// ============================================================================

/// In-process store; clones share the same underlying map
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Rc<RefCell<HashMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_raw(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.inner.borrow().get(key).cloned())
    }

    fn set_raw(&mut self, key: &str, value: Value) -> Result<()> {
        self.inner.borrow_mut().insert(key.to_string(), value);
        Ok(())
    }
}
