//! Configuration for WidgetDeck
//!
//! Configuration is read from `~/.widgetdeck/config.json`. Every field has a
//! default, so a missing file or a partial file is fine. A handful of
//! environment variables override the file:
//!
//! | Variable | Overrides |
//! |---|---|
//! | `WIDGETDECK_PLUGIN_DIRS` | `plugins.plugin_dirs` (comma separated) |
//! | `WIDGETDECK_DATA_DIR` | `storage.data_dir` |
//! | `WIDGETDECK_LOG_LEVEL` | `log_level` |
//!
//! # Example
//!
//! ```json
//! {
//!   "plugins": {
//!     "plugin_dirs": ["~/.widgetdeck/plugins"],
//!     "blocked_plugins": ["music"],
//!     "init_timeout_ms": 3000
//!   },
//!   "storage": { "backend": "json" },
//!   "voice": { "enabled": true },
//!   "log_level": "debug"
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{DeckError, Result};

const CONFIG_DIR: &str = ".widgetdeck";
const CONFIG_FILE: &str = "config.json";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckConfig {
    pub plugins: PluginConfig,
    pub storage: StorageConfig,
    pub voice: VoiceConfig,
    /// Fallback log filter when `RUST_LOG` is not set.
    pub log_level: String,
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self {
            plugins: PluginConfig::default(),
            storage: StorageConfig::default(),
            voice: VoiceConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

/// Plugin discovery and admission settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Directories to scan for plugin subdirectories.
    /// Defaults to `["~/.widgetdeck/plugins"]`.
    pub plugin_dirs: Vec<String>,

    /// Allowlist of plugin ids. If empty, every plugin is allowed.
    pub allowed_plugins: Vec<String>,

    /// Blocklist of plugin ids. Takes precedence over the allowlist.
    pub blocked_plugins: Vec<String>,

    /// How long the CLI waits for a plugin's `init()` before giving up.
    pub init_timeout_ms: u64,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            plugin_dirs: vec![format!("~/{}/plugins", CONFIG_DIR)],
            allowed_plugins: Vec::new(),
            blocked_plugins: Vec::new(),
            init_timeout_ms: 5_000,
        }
    }
}

impl PluginConfig {
    /// Check whether a plugin id may be loaded.
    ///
    /// Blocked ids are always rejected. With an empty allowlist everything
    /// else is permitted.
    pub fn is_plugin_permitted(&self, id: &str) -> bool {
        if self.blocked_plugins.iter().any(|b| b == id) {
            return false;
        }
        self.allowed_plugins.is_empty() || self.allowed_plugins.iter().any(|a| a == id)
    }

    /// Plugin directories with `~` expanded.
    pub fn resolved_plugin_dirs(&self) -> Vec<PathBuf> {
        self.plugin_dirs.iter().map(|d| expand_home(d)).collect()
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }
}

/// Which persistence backend plugins get.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Json,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory for the JSON backend. Defaults to `~/.widgetdeck/data`.
    pub data_dir: Option<String>,
}

impl StorageConfig {
    pub fn resolved_data_dir(&self) -> PathBuf {
        match &self.data_dir {
            Some(dir) => expand_home(dir),
            None => DeckConfig::dir().join("data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub enabled: bool,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl DeckConfig {
    /// `~/.widgetdeck`, or `./.widgetdeck` when no home directory is known.
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_DIR)
    }

    pub fn path() -> PathBuf {
        Self::dir().join(CONFIG_FILE)
    }

    /// Load from the default location and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_path(&Self::path())?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| {
            DeckError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            DeckError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Write the configuration as pretty JSON, creating parent directories.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides using `lookup` in place of the process environment.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dirs) = lookup("WIDGETDECK_PLUGIN_DIRS") {
            self.plugins.plugin_dirs = dirs
                .split(',')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(dir) = lookup("WIDGETDECK_DATA_DIR") {
            self.storage.data_dir = Some(dir);
        }
        if let Some(level) = lookup("WIDGETDECK_LOG_LEVEL") {
            self.log_level = level;
        }
    }
}

/// Expand a leading `~/` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_plugin_config_is_plugin_permitted_all_allowed() {
        let config = PluginConfig::default();
        assert!(config.is_plugin_permitted("notes"));
        assert!(config.is_plugin_permitted("anything"));
    }

    #[test]
    fn test_plugin_config_is_plugin_permitted_allowlist() {
        let config = PluginConfig {
            allowed_plugins: vec!["notes".to_string()],
            ..Default::default()
        };
        assert!(config.is_plugin_permitted("notes"));
        assert!(!config.is_plugin_permitted("todos"));
    }

    #[test]
    fn test_plugin_config_blocklist_wins() {
        let config = PluginConfig {
            allowed_plugins: vec!["notes".to_string()],
            blocked_plugins: vec!["notes".to_string()],
            ..Default::default()
        };
        assert!(!config.is_plugin_permitted("notes"));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = DeckConfig::load_from_path(&tmp.path().join("config.json")).unwrap();
        assert_eq!(config, DeckConfig::default());
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert!(config.voice.enabled);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(
            &path,
            r#"{"plugins": {"blocked_plugins": ["music"]}, "storage": {"backend": "json"}}"#,
        )
        .unwrap();

        let config = DeckConfig::load_from_path(&path).unwrap();
        assert_eq!(config.plugins.blocked_plugins, vec!["music"]);
        assert_eq!(config.plugins.init_timeout_ms, 5_000);
        assert_eq!(config.storage.backend, StorageBackend::Json);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            DeckConfig::load_from_path(&path),
            Err(DeckError::Config(_))
        ));
    }

    #[test]
    fn test_save_and_reload() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("config.json");
        let mut config = DeckConfig::default();
        config.voice.enabled = false;
        config.plugins.init_timeout_ms = 250;

        config.save_to_path(&path).unwrap();
        assert_eq!(DeckConfig::load_from_path(&path).unwrap(), config);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("WIDGETDECK_PLUGIN_DIRS", "/a, /b ,,"),
            ("WIDGETDECK_DATA_DIR", "/tmp/deck"),
            ("WIDGETDECK_LOG_LEVEL", "trace"),
        ]
        .into_iter()
        .collect();
        let mut config = DeckConfig::default();
        config.apply_overrides_from(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.plugins.plugin_dirs, vec!["/a", "/b"]);
        assert_eq!(
            config.storage.resolved_data_dir(),
            PathBuf::from("/tmp/deck")
        );
        assert_eq!(config.log_level, "trace");
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/abs/path"), PathBuf::from("/abs/path"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/plugins"), home.join("plugins"));
        }
    }
}
