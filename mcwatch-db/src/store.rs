//! Durable backends for the player record store.
//!
//! The whole store is read once at startup and rewritten in full after every
//! ingest, so backends only need whole-map `load` and `save`.

use crate::error::Result;
use crate::models::Records;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Whole-map persistence for player records.
pub trait RecordStore: Send + Sync + 'static {
    /// Load every record. Missing or unreadable content is an empty store.
    fn load(&self) -> Result<Records>;

    /// Replace the persisted records with `records`.
    fn save(&self, records: &Records) -> Result<()>;
}

/// JSON file on disk: `{ "<name>": { "total_time": .., "session_start": .., "last_seen": .. } }`.
///
/// Saves are serialized: a save whose awaiting task was cancelled can still be
/// running on a blocking thread when the next one starts, and both share the
/// same temp file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut tmp = OsString::from(self.path.as_os_str());
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

impl RecordStore for JsonFileStore {
    fn load(&self) -> Result<Records> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no player data file, starting empty");
                return Ok(Records::new());
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&bytes) {
            Ok(records) => Ok(records),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "player data file is malformed, starting empty");
                Ok(Records::new())
            }
        }
    }

    fn save(&self, records: &Records) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(records)?;
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let tmp = self.temp_path();
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), players = records.len(), "saved player data");
        Ok(())
    }
}

/// Keeps the "persisted" copy in memory. Useful for tests and throwaway runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    saved: Mutex<Records>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Records) -> Self {
        Self {
            saved: Mutex::new(records),
        }
    }

    /// Copy of whatever was last saved.
    pub fn saved(&self) -> Records {
        self.saved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl RecordStore for MemoryStore {
    fn load(&self) -> Result<Records> {
        Ok(self.saved())
    }

    fn save(&self, records: &Records) -> Result<()> {
        *self
            .saved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = records.clone();
        Ok(())
    }
}
