//! First-party dashboard plugins and host commands
//!
//! The bundled plugins go through exactly the same catalog, manifest
//! validation and permission checks as third-party ones. They only differ in
//! shipping their manifest in code.
//!
//! | Plugin | Type | Contributes |
//! |---|---|---|
//! | `notes` | widget | notes widget, "New Note" |
//! | `todos` | widget | todo widget, "Add Todo" |
//! | `timer` | widget | timer widget, "Timer", counts activity while running |
//! | `bookmarks` | widget | bookmarks widget seeded from settings |
//! | `music` | integration | "Spotify Controls" |

pub mod bookmarks;
pub mod host;
pub mod music;
pub mod notes;
pub mod timer;
pub mod todos;

pub use host::register_host_commands;

use crate::plugins::PluginCatalog;

/// Catalog holding every bundled plugin.
pub fn builtin_catalog() -> PluginCatalog {
    let mut catalog = PluginCatalog::new();
    catalog.register_bundled(notes::manifest(), || Box::new(notes::NotesPlugin::default()));
    catalog.register_bundled(todos::manifest(), || Box::new(todos::TodosPlugin::default()));
    catalog.register_bundled(timer::manifest(), || Box::new(timer::TimerPlugin::default()));
    catalog.register_bundled(bookmarks::manifest(), || {
        Box::new(bookmarks::BookmarksPlugin::default())
    });
    catalog.register_bundled(music::manifest(), || Box::new(music::MusicPlugin::default()));
    catalog
}

/// Read a JSON array from storage, treating a missing key as empty.
pub(crate) fn read_list(
    api: &crate::plugins::PluginApi,
    key: &str,
) -> anyhow::Result<Vec<serde_json::Value>> {
    Ok(match api.read_storage(key)? {
        Some(serde_json::Value::Array(items)) => items,
        Some(other) => anyhow::bail!("stored '{}' is not a list: {}", key, other),
        None => Vec::new(),
    })
}
