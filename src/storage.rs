//! Key-value persistence for the history and the in-progress session.
//!
//! Values are JSON text stored under fixed keys, so any string store can
//! back a calculator. Two stores are provided: [`MemoryStore`] for tests
//! and throwaway sessions, and [`JsonFileStore`], which keeps every key in
//! one JSON object on disk.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::history::{HistoryEntry, HistoryStore};
use crate::session::SessionSnapshot;

pub const HISTORY_KEY: &str = "calcHistory";
pub const SESSION_KEY: &str = "calcCurrent";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("stored data is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.values.remove(key);
        Ok(())
    }
}

/// All keys in one JSON object file, rewritten on every change.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Opens the store at `path`; a missing file is an empty store.
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self, StoreError> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), keys = values.len(), "opened store");
        Ok(JsonFileStore { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(&self.values)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.insert(key.to_owned(), value.to_owned());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if self.values.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

/// `<data dir>/pocket-calc/store.json`, if the platform has a data dir.
pub fn default_store_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("pocket-calc").join("store.json"))
}

pub fn load_history<S: KeyValueStore + ?Sized>(store: &S) -> Result<HistoryStore, StoreError> {
    match store.get(HISTORY_KEY)? {
        Some(json) => {
            let entries: Vec<HistoryEntry> = serde_json::from_str(&json)?;
            info!(entries = entries.len(), "loaded history");
            Ok(HistoryStore::from_entries(entries))
        }
        None => Ok(HistoryStore::new()),
    }
}

/// Writes the whole history. An empty history removes the key.
pub fn save_history<S: KeyValueStore + ?Sized>(
    store: &mut S,
    history: &HistoryStore,
) -> Result<(), StoreError> {
    if history.is_empty() {
        store.remove(HISTORY_KEY)?;
    } else {
        store.set(HISTORY_KEY, &history.to_json()?)?;
    }
    debug!(entries = history.len(), revision = history.revision(), "saved history");
    Ok(())
}

pub fn load_session<S: KeyValueStore + ?Sized>(
    store: &S,
) -> Result<Option<SessionSnapshot>, StoreError> {
    match store.get(SESSION_KEY)? {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

pub fn save_session<S: KeyValueStore + ?Sized>(
    store: &mut S,
    snapshot: &SessionSnapshot,
) -> Result<(), StoreError> {
    store.set(SESSION_KEY, &serde_json::to_string(snapshot)?)
}
