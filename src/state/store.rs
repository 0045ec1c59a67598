use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::record::{ResourceKind, ResourceRecord};
use crate::error::{RelytError, Result};

pub trait StateStore {
    fn get(&self, kind: ResourceKind, key: &str) -> Result<Option<ResourceRecord>>;
    /// Insert or replace the record for `(record.kind, record.key)`.
    fn put(&self, record: ResourceRecord) -> Result<()>;
    /// Removing an unknown key is not an error.
    fn remove(&self, kind: ResourceKind, key: &str) -> Result<()>;
    fn list(&self) -> Result<Vec<ResourceRecord>>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    records: Vec<ResourceRecord>,
}

/// JSON file store. Every write replaces the file through a rename, so a
/// crash leaves either the old or the new contents on disk.
pub struct FileStateStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        // The guarded value is `()`, so a poisoned lock carries no broken state.
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn load(&self) -> Result<StateFile> {
        if !self.path.exists() {
            return Ok(StateFile::default());
        }
        let contents = fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(StateFile::default());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, state: &StateFile) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| {
                RelytError::Config(format!("state path {} has no file name", self.path.display()))
            })?;
        let mut tmp_name = file_name.to_os_string();
        tmp_name.push(".tmp");
        let tmp = self.path.with_file_name(tmp_name);

        fs::write(&tmp, serde_json::to_string_pretty(state)?)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), records = state.records.len(), "state saved");
        Ok(())
    }
}

impl StateStore for FileStateStore {
    fn get(&self, kind: ResourceKind, key: &str) -> Result<Option<ResourceRecord>> {
        let _guard = self.guard();
        let state = self.load()?;
        Ok(state.records.into_iter().find(|r| r.kind == kind && r.key == key))
    }

    fn put(&self, record: ResourceRecord) -> Result<()> {
        let _guard = self.guard();
        let mut state = self.load()?;
        match state
            .records
            .iter_mut()
            .find(|r| r.kind == record.kind && r.key == record.key)
        {
            Some(existing) => *existing = record,
            None => state.records.push(record),
        }
        self.save(&state)
    }

    fn remove(&self, kind: ResourceKind, key: &str) -> Result<()> {
        let _guard = self.guard();
        let mut state = self.load()?;
        let before = state.records.len();
        state.records.retain(|r| !(r.kind == kind && r.key == key));
        if state.records.len() == before {
            return Ok(());
        }
        self.save(&state)
    }

    fn list(&self) -> Result<Vec<ResourceRecord>> {
        let _guard = self.guard();
        Ok(self.load()?.records)
    }
}

/// In-process store; nothing survives the process.
#[derive(Default)]
pub struct MemoryStateStore {
    records: Mutex<BTreeMap<(ResourceKind, String), ResourceRecord>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, BTreeMap<(ResourceKind, String), ResourceRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, kind: ResourceKind, key: &str) -> Result<Option<ResourceRecord>> {
        Ok(self.records().get(&(kind, key.to_string())).cloned())
    }

    fn put(&self, record: ResourceRecord) -> Result<()> {
        self.records().insert((record.kind, record.key.clone()), record);
        Ok(())
    }

    fn remove(&self, kind: ResourceKind, key: &str) -> Result<()> {
        self.records().remove(&(kind, key.to_string()));
        Ok(())
    }

    fn list(&self) -> Result<Vec<ResourceRecord>> {
        Ok(self.records().values().cloned().collect())
    }
}
