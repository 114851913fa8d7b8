//! Widget registry for WidgetDeck
//!
//! Holds the widget descriptors plugins register through their API facade.
//! The render reference is never interpreted here; it is forwarded to the UI
//! layer as-is. Ownership rules mirror the command registry: only the owner
//! may replace or remove a widget, and widgets of a disabled plugin are kept
//! but left out of `list()`.

use std::collections::HashSet;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::error::{DeckError, Result};
use crate::utils::lock;

/// Opaque reference the UI layer uses to render a widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenderRef(pub String);

/// A widget a plugin contributes to the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetDescriptor {
    pub id: String,
    pub name: String,
    pub render: RenderRef,
    #[serde(default)]
    pub settings: Map<String, Value>,
}

impl WidgetDescriptor {
    pub fn new(id: &str, name: &str, render: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            render: RenderRef(render.to_string()),
            settings: Map::new(),
        }
    }

    pub fn with_settings(mut self, settings: Map<String, Value>) -> Self {
        self.settings = settings;
        self
    }
}

/// A registered widget and the plugin that owns it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegisteredWidget {
    pub owner: String,
    pub widget: WidgetDescriptor,
}

#[derive(Default)]
struct WidgetInner {
    widgets: Vec<RegisteredWidget>,
    inactive_owners: HashSet<String>,
}

/// Shared, internally synchronized widget table.
#[derive(Default)]
pub struct WidgetRegistry {
    inner: Mutex<WidgetInner>,
}

impl WidgetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or (for the same owner) replace a widget.
    pub fn register(&self, owner: &str, widget: WidgetDescriptor) -> Result<()> {
        let mut inner = lock(&self.inner);

        if let Some(existing) = inner.widgets.iter_mut().find(|w| w.widget.id == widget.id) {
            if existing.owner != owner {
                return Err(DeckError::Widget(format!(
                    "Widget '{}' is owned by '{}' and cannot be replaced by '{}'",
                    widget.id, existing.owner, owner
                )));
            }
            existing.widget = widget;
            return Ok(());
        }

        info!(widget = %widget.id, owner, "Registered widget");
        inner.widgets.push(RegisteredWidget {
            owner: owner.to_string(),
            widget,
        });
        Ok(())
    }

    /// Remove a widget if `owner` owns it.
    pub fn unregister_owned(&self, owner: &str, id: &str) -> Result<WidgetDescriptor> {
        let mut inner = lock(&self.inner);
        let pos = inner
            .widgets
            .iter()
            .position(|w| w.widget.id == id)
            .ok_or_else(|| DeckError::NotFound(format!("widget '{}'", id)))?;

        if inner.widgets[pos].owner != owner {
            return Err(DeckError::Widget(format!(
                "Widget '{}' is owned by '{}', not '{}'",
                id, inner.widgets[pos].owner, owner
            )));
        }
        Ok(inner.widgets.remove(pos).widget)
    }

    /// Remove every widget owned by `owner`.
    pub fn unregister_all_from(&self, owner: &str) -> usize {
        let mut inner = lock(&self.inner);
        let before = inner.widgets.len();
        inner.widgets.retain(|w| w.owner != owner);
        inner.inactive_owners.remove(owner);
        before - inner.widgets.len()
    }

    /// Show (`true`) or hide (`false`) an owner's widgets.
    pub fn set_owner_active(&self, owner: &str, active: bool) {
        let mut inner = lock(&self.inner);
        if active {
            inner.inactive_owners.remove(owner);
        } else {
            inner.inactive_owners.insert(owner.to_string());
        }
    }

    /// Widgets of active owners, in registration order.
    pub fn list(&self) -> Vec<RegisteredWidget> {
        let inner = lock(&self.inner);
        inner
            .widgets
            .iter()
            .filter(|w| !inner.inactive_owners.contains(&w.owner))
            .cloned()
            .collect()
    }

    /// Every registered widget, in registration order.
    pub fn list_all(&self) -> Vec<RegisteredWidget> {
        lock(&self.inner).widgets.clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
