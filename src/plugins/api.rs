//! Plugin API facade
//!
//! Each plugin instance receives its own `PluginApi` in `init()`. Every call
//! is checked against the manifest's permissions before it reaches the
//! command registry, widget registry, event bus or storage. Denied calls
//! return `PluginError::PermissionDenied` and have no effect.
//!
//! Once the manager purges an instance (failed `init()` or unload) its
//! facade is revoked: every later call, including calls from clones the
//! plugin kept around, returns `PluginError::Revoked`.
//!
//! | Call | Permission |
//! |------|------------|
//! | `register_widget`, `unregister_widget` | `widgets` |
//! | `add_command`, `remove_command` | `commands` |
//! | `show_toast` | `notifications` |
//! | `listen_to_activity` | `activity` |
//! | `read_storage`, `write_storage`, `remove_storage`, `storage_keys` | `storage` |

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};
use tracing::debug;

use crate::bus::{
    ActivityEvent, CommandEvent, Event, EventBus, Subscription, Toast, ToastLevel, Topic,
    WidgetEvent,
};
use crate::commands::{Command, CommandRegistry, CommandSource};
use crate::error::PluginError;
use crate::storage::Storage;
use crate::utils::lock;
use crate::widgets::{WidgetDescriptor, WidgetRegistry};

use super::capability::CapabilityGate;
use super::types::{Permission, PluginManifest};

/// The host surface handed to one plugin.
///
/// Cloning is cheap and clones share subscription tracking, so a plugin may
/// keep copies around (e.g. inside command actions).
#[derive(Clone)]
pub struct PluginApi {
    manifest: Arc<PluginManifest>,
    gate: CapabilityGate,
    bus: EventBus,
    commands: Arc<CommandRegistry>,
    widgets: Arc<WidgetRegistry>,
    storage: Arc<dyn Storage>,
    subscriptions: Arc<Mutex<Vec<Subscription>>>,
    live: Arc<AtomicBool>,
    revoked: Arc<AtomicBool>,
}

impl PluginApi {
    pub(crate) fn new(
        manifest: Arc<PluginManifest>,
        bus: EventBus,
        commands: Arc<CommandRegistry>,
        widgets: Arc<WidgetRegistry>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self {
            gate: CapabilityGate::new(&manifest),
            manifest,
            bus,
            commands,
            widgets,
            storage,
            subscriptions: Arc::new(Mutex::new(Vec::new())),
            live: Arc::new(AtomicBool::new(false)),
            revoked: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The id of the plugin this facade belongs to.
    pub fn plugin_id(&self) -> &str {
        &self.manifest.id
    }

    pub fn permissions(&self) -> impl Iterator<Item = Permission> + '_ {
        self.gate.granted().iter().copied()
    }

    /// The plugin's own settings from its manifest.
    pub fn settings(&self) -> &Map<String, Value> {
        &self.manifest.settings
    }

    fn source(&self) -> CommandSource {
        CommandSource::Plugin(self.manifest.id.clone())
    }

    fn ensure_usable(&self) -> Result<(), PluginError> {
        if self.is_revoked() {
            debug!(plugin = %self.manifest.id, "Call on revoked plugin API");
            return Err(PluginError::Revoked(self.manifest.id.clone()));
        }
        Ok(())
    }

    fn rejected(&self, reason: impl fmt::Display) -> PluginError {
        PluginError::Rejected {
            plugin: self.manifest.id.clone(),
            reason: reason.to_string(),
        }
    }

    fn storage_error(&self, reason: impl fmt::Display) -> PluginError {
        PluginError::Storage {
            plugin: self.manifest.id.clone(),
            reason: reason.to_string(),
        }
    }

    /// Add a widget to the dashboard, or replace one this plugin owns.
    pub fn register_widget(&self, widget: WidgetDescriptor) -> Result<(), PluginError> {
        self.ensure_usable()?;
        self.gate.check(Permission::Widgets)?;
        let id = widget.id.clone();
        self.widgets
            .register(&self.manifest.id, widget.clone())
            .map_err(|e| self.rejected(e))?;
        // Revoked while registering: the purge may already have run.
        if self.is_revoked() {
            let _ = self.widgets.unregister_owned(&self.manifest.id, &id);
            return Err(PluginError::Revoked(self.manifest.id.clone()));
        }
        self.bus.publish(Event::RegisterWidget(WidgetEvent {
            owner: self.manifest.id.clone(),
            widget,
        }));
        Ok(())
    }

    /// Remove a widget this plugin owns.
    pub fn unregister_widget(&self, id: &str) -> Result<(), PluginError> {
        self.ensure_usable()?;
        self.gate.check(Permission::Widgets)?;
        self.widgets
            .unregister_owned(&self.manifest.id, id)
            .map(|_| ())
            .map_err(|e| self.rejected(e))
    }

    /// Register a command owned by this plugin.
    ///
    /// Any `source` set on `command` is overwritten with this plugin's id.
    pub fn add_command(&self, command: Command) -> Result<(), PluginError> {
        self.ensure_usable()?;
        self.gate.check(Permission::Commands)?;
        let command = command.with_source(self.source());
        let event = CommandEvent {
            id: command.id.clone(),
            label: command.label.clone(),
            source: command.source.clone(),
        };
        self.commands
            .register(command)
            .map_err(|e| self.rejected(e))?;
        if self.is_revoked() {
            let _ = self.commands.unregister_owned(&event.id, &event.source);
            return Err(PluginError::Revoked(self.manifest.id.clone()));
        }
        self.bus.publish(Event::AddCommand(event));
        Ok(())
    }

    /// Remove a command this plugin owns.
    pub fn remove_command(&self, id: &str) -> Result<(), PluginError> {
        self.ensure_usable()?;
        self.gate.check(Permission::Commands)?;
        self.commands
            .unregister_owned(id, &self.source())
            .map(|_| ())
            .map_err(|e| self.rejected(e))
    }

    /// Ask the host to show a notification.
    pub fn show_toast(&self, message: &str, level: ToastLevel) -> Result<(), PluginError> {
        self.ensure_usable()?;
        self.gate.check(Permission::Notifications)?;
        self.bus
            .publish(Event::Toast(Toast::new(&self.manifest.id, message, level)));
        Ok(())
    }

    /// Receive activity events while this plugin is active.
    ///
    /// The subscription is removed automatically when the plugin unloads; the
    /// returned handle lets the plugin stop listening earlier.
    pub fn listen_to_activity<F>(&self, handler: F) -> Result<Subscription, PluginError>
    where
        F: Fn(&ActivityEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.ensure_usable()?;
        self.gate.check(Permission::Activity)?;
        let live = Arc::clone(&self.live);
        let subscription = self.bus.subscribe(Topic::Activity, move |event| {
            if !live.load(Ordering::SeqCst) {
                return Ok(());
            }
            match event {
                Event::Activity(activity) => handler(activity),
                _ => Ok(()),
            }
        });
        lock(&self.subscriptions).push(subscription.clone());
        if self.is_revoked() {
            self.release_subscriptions();
            return Err(PluginError::Revoked(self.manifest.id.clone()));
        }
        debug!(plugin = %self.manifest.id, "Listening to activity");
        Ok(subscription)
    }

    /// Read a value from this plugin's storage namespace.
    pub fn read_storage(&self, key: &str) -> Result<Option<Value>, PluginError> {
        self.ensure_usable()?;
        self.gate.check(Permission::Storage)?;
        self.storage
            .get(&self.manifest.id, key)
            .map_err(|e| self.storage_error(e))
    }

    /// Write a value into this plugin's storage namespace.
    pub fn write_storage(&self, key: &str, value: Value) -> Result<(), PluginError> {
        self.ensure_usable()?;
        self.gate.check(Permission::Storage)?;
        self.storage
            .set(&self.manifest.id, key, value)
            .map_err(|e| self.storage_error(e))
    }

    pub fn remove_storage(&self, key: &str) -> Result<bool, PluginError> {
        self.ensure_usable()?;
        self.gate.check(Permission::Storage)?;
        self.storage
            .remove(&self.manifest.id, key)
            .map_err(|e| self.storage_error(e))
    }

    pub fn storage_keys(&self) -> Result<Vec<String>, PluginError> {
        self.ensure_usable()?;
        self.gate.check(Permission::Storage)?;
        self.storage
            .keys(&self.manifest.id)
            .map_err(|e| self.storage_error(e))
    }

    /// Start or stop delivering events to this plugin's handlers.
    pub(crate) fn set_live(&self, live: bool) {
        self.live.store(live, Ordering::SeqCst);
    }

    /// Permanently shut this facade (and every clone of it) off.
    pub(crate) fn revoke(&self) {
        self.live.store(false, Ordering::SeqCst);
        self.revoked.store(true, Ordering::SeqCst);
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked.load(Ordering::SeqCst)
    }

    /// Remove every bus subscription created through this facade.
    pub(crate) fn release_subscriptions(&self) -> usize {
        let subs: Vec<Subscription> = lock(&self.subscriptions).drain(..).collect();
        subs.iter().filter(|s| s.unsubscribe()).count()
    }

    /// Subscriptions currently tracked for this plugin.
    pub fn subscription_count(&self) -> usize {
        lock(&self.subscriptions).len()
    }
}

impl fmt::Debug for PluginApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginApi")
            .field("plugin", &self.manifest.id)
            .field("permissions", self.gate.granted())
            .field("live", &self.live.load(Ordering::SeqCst))
            .field("revoked", &self.is_revoked())
            .finish()
    }
}
