//! Bookmarks widget. Seeds storage from the `defaults` setting on first run.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::plugins::{Permission, Plugin, PluginApi, PluginManifest, PluginType};
use crate::widgets::WidgetDescriptor;

const BOOKMARKS_KEY: &str = "bookmarks";

pub fn manifest() -> PluginManifest {
    let mut manifest = PluginManifest::new("bookmarks", "Bookmarks", PluginType::Widget)
        .with_permissions(&[Permission::Widgets, Permission::Storage]);
    manifest.author = "WidgetDeck".into();
    manifest.slot = Some("sidebar".into());
    manifest.settings.insert(
        "defaults".into(),
        json!([{ "title": "Docs", "url": "https://docs.rs" }]),
    );
    manifest
}

#[derive(Default)]
pub struct BookmarksPlugin;

#[async_trait]
impl Plugin for BookmarksPlugin {
    async fn init(&mut self, api: PluginApi) -> anyhow::Result<()> {
        if api.read_storage(BOOKMARKS_KEY)?.is_none() {
            let defaults = api
                .settings()
                .get("defaults")
                .cloned()
                .unwrap_or_else(|| Value::Array(Vec::new()));
            if !defaults.is_array() {
                anyhow::bail!("setting 'defaults' must be a list of bookmarks");
            }
            api.write_storage(BOOKMARKS_KEY, defaults)?;
            info!(plugin = %api.plugin_id(), "Seeded default bookmarks");
        }

        let mut widget = WidgetDescriptor::new("bookmarks", "Bookmarks", "BookmarksWidget");
        widget
            .settings
            .insert("storageKey".into(), json!(BOOKMARKS_KEY));
        api.register_widget(widget)?;
        Ok(())
    }

    fn cleanup(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}
