//! Error types for WidgetDeck
//!
//! This module defines the error types used throughout the dashboard runtime.
//! `DeckError` covers host-side failures (configuration, storage, I/O), while
//! `PluginError` is the taxonomy reported by the plugin runtime for load,
//! permission and lifecycle failures. Both use `thiserror` for `Display` and
//! `Error` implementations.

use thiserror::Error;

use crate::plugins::types::Permission;

/// The primary error type for WidgetDeck host operations.
#[derive(Error, Debug)]
pub enum DeckError {
    /// Configuration-related errors (invalid config, unreadable config file, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Persistence collaborator failures (unreadable file, corrupt data, etc.)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Command registry errors (duplicate ids from a different owner, etc.)
    #[error("Command error: {0}")]
    Command(String),

    /// Widget registry errors (duplicate ids from a different owner, etc.)
    #[error("Widget error: {0}")]
    Widget(String),

    /// Plugin runtime errors
    #[error(transparent)]
    Plugin(#[from] PluginError),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Resource not found (commands, widgets, plugins, etc.)
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Failures reported by the plugin runtime.
///
/// Load failures (`ManifestInvalid`, `DuplicateId`, `DependencyUnsatisfied`,
/// `NotInstalled`, `InitFailed`) are returned from `PluginManager::load_*`.
/// `PermissionDenied` is returned to plugin code from the API facade.
/// `LifecycleHookFailed` is logged and swallowed by the manager; it is only
/// ever produced for reporting and never reverts a transition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PluginError {
    /// Malformed manifest or missing required fields.
    #[error("Invalid manifest: {0}")]
    ManifestInvalid(String),

    /// An instance with this id is already loading, active or disabled.
    #[error("Plugin '{0}' is already loaded")]
    DuplicateId(String),

    /// A declared dependency is not currently active.
    #[error("Plugin '{plugin}' depends on '{dependency}', which is not active")]
    DependencyUnsatisfied { plugin: String, dependency: String },

    /// A facade call was made without the required capability.
    #[error("Plugin '{plugin}' lacks the '{permission}' permission")]
    PermissionDenied {
        plugin: String,
        permission: Permission,
    },

    /// The plugin's own `init()` returned an error or panicked.
    #[error("Plugin '{plugin}' failed to initialize: {reason}")]
    InitFailed { plugin: String, reason: String },

    /// The caller gave up waiting for `init()` to settle.
    #[error("Plugin '{0}' did not finish initializing in time")]
    InitTimedOut(String),

    /// A non-fatal failure in `cleanup`, `enable` or `disable`.
    #[error("Plugin '{plugin}' {hook}() hook failed: {reason}")]
    LifecycleHookFailed {
        plugin: String,
        hook: &'static str,
        reason: String,
    },

    /// No implementation is registered in the catalog for this manifest id.
    #[error("No implementation installed for plugin '{0}'")]
    NotInstalled(String),

    /// The allow/block lists in the configuration forbid this plugin.
    #[error("Plugin '{0}' is blocked by configuration")]
    Blocked(String),

    /// No instance with this id is known to the manager.
    #[error("Plugin '{0}' not found")]
    NotFound(String),

    /// The requested operation is not valid from the instance's current state.
    #[error("Cannot {operation} plugin '{plugin}' while it is {state}")]
    InvalidTransition {
        plugin: String,
        operation: &'static str,
        state: String,
    },

    /// Another lifecycle operation for this id is still in flight.
    #[error("Plugin '{0}' is busy with another lifecycle operation")]
    Busy(String),

    /// The facade call reached a registry that rejected it (ownership conflict).
    #[error("Plugin '{plugin}' call rejected: {reason}")]
    Rejected { plugin: String, reason: String },

    /// The facade belongs to an instance that failed or was unloaded.
    #[error("Plugin '{0}' API is no longer available")]
    Revoked(String),

    /// The persistence collaborator failed.
    #[error("Plugin '{plugin}' storage failure: {reason}")]
    Storage { plugin: String, reason: String },
}

/// A specialized `Result` type for WidgetDeck operations.
pub type Result<T> = std::result::Result<T, DeckError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DeckError::Config("missing plugin dir".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing plugin dir");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let deck_err: DeckError = io_err.into();
        assert!(matches!(deck_err, DeckError::Io(_)));
    }

    #[test]
    fn test_plugin_error_is_transparent() {
        let err: DeckError = PluginError::NotFound("notes".into()).into();
        assert_eq!(err.to_string(), "Plugin 'notes' not found");
    }

    #[test]
    fn test_permission_denied_names_capability() {
        let err = PluginError::PermissionDenied {
            plugin: "weather".into(),
            permission: Permission::Commands,
        };
        assert_eq!(
            err.to_string(),
            "Plugin 'weather' lacks the 'commands' permission"
        );
    }

    #[test]
    fn test_dependency_unsatisfied_display() {
        let err = PluginError::DependencyUnsatisfied {
            plugin: "b".into(),
            dependency: "a".into(),
        };
        assert!(err.to_string().contains("depends on 'a'"));
    }

    #[test]
    fn test_lifecycle_hook_failed_display() {
        let err = PluginError::LifecycleHookFailed {
            plugin: "timer".into(),
            hook: "cleanup",
            reason: "boom".into(),
        };
        assert_eq!(err.to_string(), "Plugin 'timer' cleanup() hook failed: boom");
    }
}
