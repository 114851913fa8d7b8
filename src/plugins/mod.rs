//! Plugin runtime for WidgetDeck
//!
//! Plugins extend the dashboard with widgets, commands and activity hooks.
//! Each plugin is a directory containing a `plugin.json` manifest; its code
//! is a compiled-in implementation registered in a [`PluginCatalog`] under
//! the manifest id.
//!
//! # Architecture
//!
//! - **types**: manifest, permission and lifecycle state types
//! - **loader**: `plugin.json` parsing, validation and directory discovery
//! - **capability**: per-plugin permission checks
//! - **api**: the facade handed to plugin code in `init()`
//! - **catalog**: the `Plugin` trait and the id -> factory table
//! - **manager**: the lifecycle state machine
//!
//! # Plugin Directory Structure
//!
//! ```text
//! ~/.widgetdeck/plugins/
//! ├── notes/
//! │   └── plugin.json
//! └── music/
//!     └── plugin.json
//! ```
//!
//! # Example plugin.json
//!
//! ```json
//! {
//!   "id": "notes",
//!   "name": "Notes",
//!   "version": "1.0.0",
//!   "author": "WidgetDeck",
//!   "type": "widget",
//!   "slot": "main",
//!   "permissions": ["widgets", "commands", "storage"],
//!   "dependencies": []
//! }
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use widgetdeck::builtin::builtin_catalog;
//! use widgetdeck::bus::EventBus;
//! use widgetdeck::commands::CommandRegistry;
//! use widgetdeck::plugins::PluginManager;
//! use widgetdeck::storage::MemoryStorage;
//! use widgetdeck::widgets::WidgetRegistry;
//!
//! # async fn run() -> Result<(), widgetdeck::error::PluginError> {
//! let manager = PluginManager::new(
//!     EventBus::new(),
//!     Arc::new(CommandRegistry::new()),
//!     Arc::new(WidgetRegistry::new()),
//!     Arc::new(MemoryStorage::new()),
//!     builtin_catalog(),
//! );
//! manager.load_plugin(Path::new("/home/user/.widgetdeck/plugins/notes")).await?;
//! manager.toggle_plugin("notes")?;
//! manager.unload_plugin("notes")?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod capability;
pub mod catalog;
pub mod loader;
pub mod manager;
pub mod types;

pub use api::PluginApi;
pub use capability::CapabilityGate;
pub use catalog::{Plugin, PluginCatalog, PluginFactory};
pub use loader::{discover_manifests, read_manifest, validate_manifest, DiscoveredPlugin};
pub use manager::PluginManager;
pub use types::{Permission, PluginManifest, PluginSnapshot, PluginState, PluginType};
