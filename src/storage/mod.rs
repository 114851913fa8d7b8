//! Persistence collaborator for WidgetDeck
//!
//! Plugins never see this trait directly: the API facade namespaces every
//! call by plugin id, so one plugin cannot read or overwrite another's data.
//!
//! Two backends are provided:
//! - `MemoryStorage`: process-local, used by default and in tests
//! - `JsonFileStorage`: one JSON document per plugin under a data directory

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{DeckError, Result};
use crate::utils::lock;

/// Namespaced key-value persistence keyed by `(plugin_id, key)`.
#[cfg_attr(test, mockall::automock)]
pub trait Storage: Send + Sync {
    /// Read a value.
    fn get(&self, plugin_id: &str, key: &str) -> Result<Option<Value>>;

    /// Write a value, replacing any previous one.
    fn set(&self, plugin_id: &str, key: &str, value: Value) -> Result<()>;

    /// Delete a value. Returns whether it existed.
    fn remove(&self, plugin_id: &str, key: &str) -> Result<bool>;

    /// Keys stored for a plugin, sorted.
    fn keys(&self, plugin_id: &str) -> Result<Vec<String>>;
}

/// In-memory storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: Mutex<HashMap<String, Map<String, Value>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, plugin_id: &str, key: &str) -> Result<Option<Value>> {
        Ok(lock(&self.data)
            .get(plugin_id)
            .and_then(|ns| ns.get(key))
            .cloned())
    }

    fn set(&self, plugin_id: &str, key: &str, value: Value) -> Result<()> {
        lock(&self.data)
            .entry(plugin_id.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, plugin_id: &str, key: &str) -> Result<bool> {
        Ok(lock(&self.data)
            .get_mut(plugin_id)
            .map(|ns| ns.remove(key).is_some())
            .unwrap_or(false))
    }

    fn keys(&self, plugin_id: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = lock(&self.data)
            .get(plugin_id)
            .map(|ns| ns.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }
}

/// File-backed storage: `<dir>/<plugin_id>.json` holds one JSON object.
///
/// Writes go to a temporary file in the same directory and are renamed into
/// place, so a crash never leaves a half-written document.
#[derive(Debug)]
pub struct JsonFileStorage {
    dir: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl JsonFileStorage {
    /// Create storage rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            DeckError::Storage(format!(
                "Failed to create storage directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, plugin_id: &str) -> Result<PathBuf> {
        // Plugin ids are validated at load time, but storage can be called by the
        // host directly too.
        if plugin_id.is_empty()
            || plugin_id.contains(['/', '\\'])
            || plugin_id.starts_with('.')
        {
            return Err(DeckError::Storage(format!(
                "Invalid storage namespace '{}'",
                plugin_id
            )));
        }
        Ok(self.dir.join(format!("{}.json", plugin_id)))
    }

    fn read_namespace(&self, plugin_id: &str) -> Result<Map<String, Value>> {
        let path = self.path_for(plugin_id)?;
        if !path.exists() {
            return Ok(Map::new());
        }
        let content = fs::read_to_string(&path)?;
        match serde_json::from_str::<Value>(&content)? {
            Value::Object(map) => Ok(map),
            _ => Err(DeckError::Storage(format!(
                "{} does not contain a JSON object",
                path.display()
            ))),
        }
    }

    fn write_namespace(&self, plugin_id: &str, map: &Map<String, Value>) -> Result<()> {
        let path = self.path_for(plugin_id)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(serde_json::to_string_pretty(map)?.as_bytes())?;
        tmp.persist(&path)
            .map_err(|e| DeckError::Storage(format!("Failed to write {}: {}", path.display(), e)))?;
        debug!(plugin = plugin_id, path = %path.display(), "Persisted plugin storage");
        Ok(())
    }
}

impl Storage for JsonFileStorage {
    fn get(&self, plugin_id: &str, key: &str) -> Result<Option<Value>> {
        Ok(self.read_namespace(plugin_id)?.get(key).cloned())
    }

    fn set(&self, plugin_id: &str, key: &str, value: Value) -> Result<()> {
        let _guard = lock(&self.write_lock);
        let mut map = self.read_namespace(plugin_id)?;
        map.insert(key.to_string(), value);
        self.write_namespace(plugin_id, &map)
    }

    fn remove(&self, plugin_id: &str, key: &str) -> Result<bool> {
        let _guard = lock(&self.write_lock);
        let mut map = self.read_namespace(plugin_id)?;
        if map.remove(key).is_none() {
            return Ok(false);
        }
        self.write_namespace(plugin_id, &map)?;
        Ok(true)
    }

    fn keys(&self, plugin_id: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.read_namespace(plugin_id)?.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}
