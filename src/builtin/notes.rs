//! Notes widget.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use crate::bus::ToastLevel;
use crate::commands::Command;
use crate::plugins::{Permission, Plugin, PluginApi, PluginManifest, PluginType};
use crate::widgets::WidgetDescriptor;

use super::read_list;

const NOTES_KEY: &str = "notes";

pub fn manifest() -> PluginManifest {
    let mut manifest = PluginManifest::new("notes", "Notes", PluginType::Widget).with_permissions(&[
        Permission::Widgets,
        Permission::Commands,
        Permission::Storage,
        Permission::Notifications,
    ]);
    manifest.author = "WidgetDeck".into();
    manifest.slot = Some("main".into());
    manifest.description = Some("Quick notes pinned to the dashboard".into());
    manifest
}

/// Append an untitled note and return the new count.
pub fn create_note(api: &PluginApi) -> anyhow::Result<usize> {
    let mut notes = read_list(api, NOTES_KEY)?;
    notes.push(json!({
        "title": format!("Untitled note {}", notes.len() + 1),
        "body": "",
        "created": Utc::now().to_rfc3339(),
    }));
    let count = notes.len();
    api.write_storage(NOTES_KEY, Value::Array(notes))?;
    Ok(count)
}

#[derive(Default)]
pub struct NotesPlugin {
    api: Option<PluginApi>,
}

#[async_trait]
impl Plugin for NotesPlugin {
    async fn init(&mut self, api: PluginApi) -> anyhow::Result<()> {
        api.register_widget(WidgetDescriptor::new("notes", "Notes", "NotesWidget"))?;

        let handle = api.clone();
        api.add_command(
            Command::new("notes.new", "New Note", move || {
                let count = create_note(&handle)?;
                handle.show_toast(&format!("Created note #{}", count), ToastLevel::Success)?;
                Ok(())
            })
            .with_keywords(&["note", "write"])
            .with_shortcut("Ctrl+N"),
        )?;

        self.api = Some(api);
        Ok(())
    }

    fn cleanup(&mut self) -> anyhow::Result<()> {
        self.api = None;
        Ok(())
    }
}
