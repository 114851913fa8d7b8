//! Todo list widget.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::commands::Command;
use crate::plugins::{Permission, Plugin, PluginApi, PluginManifest, PluginType};
use crate::widgets::WidgetDescriptor;

use super::read_list;

const TODOS_KEY: &str = "items";

pub fn manifest() -> PluginManifest {
    let mut manifest = PluginManifest::new("todos", "Todos", PluginType::Widget).with_permissions(&[
        Permission::Widgets,
        Permission::Commands,
        Permission::Storage,
    ]);
    manifest.author = "WidgetDeck".into();
    manifest.slot = Some("sidebar".into());
    manifest
        .settings
        .insert("defaultTitle".into(), json!("New task"));
    manifest
}

/// Append an open todo titled from the plugin's `defaultTitle` setting.
pub fn add_todo(api: &PluginApi) -> anyhow::Result<usize> {
    let title = api
        .settings()
        .get("defaultTitle")
        .and_then(Value::as_str)
        .unwrap_or("New task")
        .to_string();
    let mut items = read_list(api, TODOS_KEY)?;
    items.push(json!({ "title": title, "done": false }));
    let count = items.len();
    api.write_storage(TODOS_KEY, Value::Array(items))?;
    Ok(count)
}

/// Number of todos not yet done.
pub fn open_count(api: &PluginApi) -> anyhow::Result<usize> {
    Ok(read_list(api, TODOS_KEY)?
        .iter()
        .filter(|item| !item["done"].as_bool().unwrap_or(false))
        .count())
}

#[derive(Default)]
pub struct TodosPlugin {
    api: Option<PluginApi>,
}

#[async_trait]
impl Plugin for TodosPlugin {
    async fn init(&mut self, api: PluginApi) -> anyhow::Result<()> {
        api.register_widget(WidgetDescriptor::new("todos", "Todos", "TodoWidget"))?;

        let handle = api.clone();
        api.add_command(
            Command::new("todos.add", "Add Todo", move || add_todo(&handle).map(|_| ()))
                .with_keywords(&["todo", "task"]),
        )?;

        self.api = Some(api);
        Ok(())
    }

    fn cleanup(&mut self) -> anyhow::Result<()> {
        self.api = None;
        Ok(())
    }
}
