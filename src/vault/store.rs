//! Persistence boundary for the credential vault.
//!
//! A plain string key-value contract. The storage layer does no encryption
//! of its own; everything secret arrives here already sealed.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use tracing::debug;

use crate::types::{Result, WicketError};

/// Key-value storage scoped to one client context.
///
/// `set` must replace the whole value atomically: a reader sees either the
/// previous value or the new one, never a mix.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

// =============================================================================
// In-memory store
// =============================================================================

/// Volatile store, used for tests and for sessions that must not touch disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| WicketError::StorageFault("memory store lock poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| WicketError::StorageFault("memory store lock poisoned".into()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| WicketError::StorageFault("memory store lock poisoned".into()))?;
        entries.remove(key);
        Ok(())
    }
}

// =============================================================================
// File store
// =============================================================================

/// File name of the JSON map inside the state directory.
pub const VAULT_FILE_NAME: &str = "vault.json";

/// JSON map persisted in a single file.
///
/// Every write goes to a sibling temp file which is then renamed over the
/// original, so a crash mid-write leaves the previous contents intact.
pub struct FileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open (or lazily create) the store under `state_dir`.
    pub fn open(state_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = state_dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| {
            WicketError::StorageFault(format!("Failed to create {}: {e}", dir.display()))
        })?;

        let path = dir.join(VAULT_FILE_NAME);
        debug!(path = %path.display(), "Opened file store");

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<HashMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(HashMap::new()),
            Ok(text) => serde_json::from_str(&text).map_err(|e| {
                WicketError::StorageFault(format!(
                    "Corrupt store file {}: {e}",
                    self.path.display()
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_map(&self, map: &HashMap<String, String>) -> Result<()> {
        let body = serde_json::to_vec_pretty(map)?;
        let tmp_path = self.path.with_extension("json.tmp");

        {
            let mut file = create_private_file(&tmp_path)?;
            file.write_all(&body)?;
            file.sync_all()?;
        }

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn update<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut HashMap<String, String>),
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| WicketError::StorageFault("file store lock poisoned".into()))?;

        let mut map = self.read_map()?;
        mutate(&mut map);
        self.write_map(&map)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_map()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(|map| {
            map.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|map| {
            map.remove(key);
        })
    }
}

#[cfg(unix)]
fn create_private_file(path: &Path) -> Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    Ok(fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?)
}

#[cfg(not(unix))]
fn create_private_file(path: &Path) -> Result<fs::File> {
    Ok(fs::File::create(path)?)
}
