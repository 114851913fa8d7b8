//! Plugin types for WidgetDeck
//!
//! This module defines the data model of the plugin runtime: the manifest
//! parsed from a plugin's `plugin.json`, the capability vocabulary, the
//! lifecycle states, and the read-only snapshots handed out by the manager.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The manifest loaded from a plugin's `plugin.json` file.
///
/// The manifest is authored by the plugin and immutable once loaded. It is
/// validated before any plugin code runs.
///
/// # Example
///
/// ```json
/// {
///   "id": "pomodoro",
///   "name": "Pomodoro",
///   "version": "1.2.0",
///   "author": "Jo",
///   "type": "widget",
///   "slot": "sidebar",
///   "settings": { "minutes": 25 },
///   "permissions": ["widgets", "commands", "activity"],
///   "dependencies": ["timer"]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    /// Globally unique plugin id.
    pub id: String,

    /// Human-readable display name.
    pub name: String,

    /// Version string (`MAJOR.MINOR.PATCH`, optional pre-release suffix).
    pub version: String,

    /// Author name or identifier.
    pub author: String,

    /// What kind of extension this is.
    #[serde(rename = "type")]
    pub plugin_type: PluginType,

    /// Placement hint. Only meaningful for widget plugins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<String>,

    /// Optional one-line description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Plugin-owned settings, opaque to the runtime.
    #[serde(default)]
    pub settings: Map<String, Value>,

    /// Capabilities the plugin is granted.
    #[serde(default)]
    pub permissions: BTreeSet<Permission>,

    /// Plugin ids that must be active before this one loads, in order.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl PluginManifest {
    /// Create a minimal manifest with no permissions, settings or dependencies.
    pub fn new(id: &str, name: &str, plugin_type: PluginType) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            version: "1.0.0".to_string(),
            author: "unknown".to_string(),
            plugin_type,
            slot: None,
            description: None,
            settings: Map::new(),
            permissions: BTreeSet::new(),
            dependencies: Vec::new(),
        }
    }

    /// Builder-style helper to grant permissions.
    pub fn with_permissions(mut self, permissions: &[Permission]) -> Self {
        self.permissions.extend(permissions.iter().copied());
        self
    }

    /// Builder-style helper to declare dependencies.
    pub fn with_dependencies(mut self, dependencies: &[&str]) -> Self {
        self.dependencies = dependencies.iter().map(|d| d.to_string()).collect();
        self
    }

    /// Whether the manifest grants the given permission.
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

/// The kind of extension a plugin provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PluginType {
    Widget,
    Integration,
    Command,
    EventHook,
}

impl fmt::Display for PluginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PluginType::Widget => "widget",
            PluginType::Integration => "integration",
            PluginType::Command => "command",
            PluginType::EventHook => "event-hook",
        };
        f.write_str(s)
    }
}

/// Capability tokens a manifest may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Storage,
    Notifications,
    Commands,
    Widgets,
    Activity,
}

impl Permission {
    /// All tokens in the vocabulary.
    pub const ALL: [Permission; 5] = [
        Permission::Storage,
        Permission::Notifications,
        Permission::Commands,
        Permission::Widgets,
        Permission::Activity,
    ];

    /// The manifest token for this permission.
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Storage => "storage",
            Permission::Notifications => "notifications",
            Permission::Commands => "commands",
            Permission::Widgets => "widgets",
            Permission::Activity => "activity",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a plugin instance.
///
/// ```text
/// Discovered -> Loading -> Active <-> Disabled
///                  |
///                  v
///                Error
/// (any) -> Unloaded
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginState {
    Discovered,
    Loading,
    Active,
    Disabled,
    Error,
    Unloaded,
}

impl PluginState {
    /// States that block a new load of the same id.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            PluginState::Loading | PluginState::Active | PluginState::Disabled
        )
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PluginState::Discovered => "discovered",
            PluginState::Loading => "loading",
            PluginState::Active => "active",
            PluginState::Disabled => "disabled",
            PluginState::Error => "error",
            PluginState::Unloaded => "unloaded",
        };
        f.write_str(s)
    }
}

/// A read-only copy of a plugin instance, as returned by the manager.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginSnapshot {
    /// The plugin's manifest.
    pub manifest: PluginManifest,
    /// Current lifecycle state.
    pub state: PluginState,
    /// Last recorded failure, if any.
    pub last_error: Option<String>,
    /// Where the manifest was loaded from, if it came from disk.
    pub path: Option<PathBuf>,
}

impl PluginSnapshot {
    /// The plugin id.
    pub fn id(&self) -> &str {
        &self.manifest.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_deserialization_from_json() {
        let json_str = r#"{
            "id": "pomodoro",
            "name": "Pomodoro",
            "version": "1.2.0",
            "author": "Jo",
            "type": "widget",
            "slot": "sidebar",
            "settings": { "minutes": 25 },
            "permissions": ["widgets", "commands", "activity"],
            "dependencies": ["timer"]
        }"#;

        let manifest: PluginManifest = serde_json::from_str(json_str).unwrap();
        assert_eq!(manifest.id, "pomodoro");
        assert_eq!(manifest.plugin_type, PluginType::Widget);
        assert_eq!(manifest.slot.as_deref(), Some("sidebar"));
        assert_eq!(manifest.settings["minutes"], 25);
        assert!(manifest.has_permission(Permission::Commands));
        assert!(!manifest.has_permission(Permission::Storage));
        assert_eq!(manifest.dependencies, vec!["timer"]);
    }

    #[test]
    fn test_manifest_defaults() {
        let json_str = r#"{
            "id": "bare",
            "name": "Bare",
            "version": "0.1.0",
            "author": "Jo",
            "type": "event-hook"
        }"#;

        let manifest: PluginManifest = serde_json::from_str(json_str).unwrap();
        assert_eq!(manifest.plugin_type, PluginType::EventHook);
        assert!(manifest.settings.is_empty());
        assert!(manifest.permissions.is_empty());
        assert!(manifest.dependencies.is_empty());
        assert!(manifest.slot.is_none());
    }

    #[test]
    fn test_unknown_permission_is_rejected() {
        let json_str = r#"{
            "id": "x", "name": "X", "version": "1.0.0", "author": "a",
            "type": "command", "permissions": ["network"]
        }"#;
        assert!(serde_json::from_str::<PluginManifest>(json_str).is_err());
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let json_str = r#"{
            "id": "x", "name": "X", "version": "1.0.0", "author": "a",
            "type": "theme"
        }"#;
        assert!(serde_json::from_str::<PluginManifest>(json_str).is_err());
    }

    #[test]
    fn test_duplicate_permissions_collapse() {
        let json_str = r#"{
            "id": "x", "name": "X", "version": "1.0.0", "author": "a",
            "type": "command", "permissions": ["commands", "commands"]
        }"#;
        let manifest: PluginManifest = serde_json::from_str(json_str).unwrap();
        assert_eq!(manifest.permissions.len(), 1);
    }

    #[test]
    fn test_live_states() {
        assert!(PluginState::Loading.is_live());
        assert!(PluginState::Active.is_live());
        assert!(PluginState::Disabled.is_live());
        assert!(!PluginState::Error.is_live());
        assert!(!PluginState::Unloaded.is_live());
        assert!(!PluginState::Discovered.is_live());
    }

    #[test]
    fn test_display_tokens() {
        assert_eq!(Permission::Notifications.to_string(), "notifications");
        assert_eq!(PluginType::EventHook.to_string(), "event-hook");
        assert_eq!(PluginState::Disabled.to_string(), "disabled");
    }
}
