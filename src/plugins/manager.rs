//! Plugin manager for WidgetDeck
//!
//! Owns the table of plugin instances and drives each one through its
//! lifecycle:
//!
//! ```text
//! Discovered -> Loading -> Active <-> Disabled
//!                  |
//!                  v
//!                Error          (any) -> Unloaded (removed from the table)
//! ```
//!
//! Lifecycle operations on one id are serialized: while an id is mid
//! transition, further `load`/`unload`/`toggle` calls for it are rejected
//! rather than queued. The table lock is never held while plugin code runs,
//! so hooks may freely publish on the bus or touch the registries.
//!
//! The manager never calls UI code. Host-side reactions to plugin activity
//! subscribe to the event bus instead.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tracing::{info, warn};

use crate::bus::{ActivityEvent, Event, EventBus, ThemeChange};
use crate::commands::{CommandRegistry, CommandSource};
use crate::config::PluginConfig;
use crate::error::PluginError;
use crate::storage::Storage;
use crate::utils::lock;
use crate::widgets::WidgetRegistry;

use super::api::PluginApi;
use super::catalog::{Plugin, PluginCatalog};
use super::loader::{read_manifest, validate_manifest};
use super::types::{PluginManifest, PluginSnapshot, PluginState};

type LifecycleResult<T> = std::result::Result<T, PluginError>;

struct Slot {
    manifest: Arc<PluginManifest>,
    state: PluginState,
    // None while the object is lent out to a running hook.
    plugin: Option<Box<dyn Plugin>>,
    api: PluginApi,
    last_error: Option<String>,
    path: Option<PathBuf>,
    busy: bool,
}

impl Slot {
    fn snapshot(&self) -> PluginSnapshot {
        PluginSnapshot {
            manifest: (*self.manifest).clone(),
            state: self.state,
            last_error: self.last_error.clone(),
            path: self.path.clone(),
        }
    }
}

#[derive(Default)]
struct Table {
    order: Vec<String>,
    slots: HashMap<String, Slot>,
}

impl Table {
    fn insert(&mut self, id: String, slot: Slot) {
        self.order.retain(|existing| existing != &id);
        self.order.push(id.clone());
        self.slots.insert(id, slot);
    }

    fn remove(&mut self, id: &str) -> Option<Slot> {
        self.order.retain(|existing| existing != id);
        self.slots.remove(id)
    }

    fn state_of(&self, id: &str) -> Option<PluginState> {
        self.slots.get(id).map(|s| s.state)
    }
}

/// Orchestrates plugin load, enable/disable and unload.
pub struct PluginManager {
    bus: EventBus,
    commands: Arc<CommandRegistry>,
    widgets: Arc<WidgetRegistry>,
    storage: Arc<dyn Storage>,
    catalog: PluginCatalog,
    config: PluginConfig,
    table: Mutex<Table>,
}

impl PluginManager {
    /// Create a manager wired to the given shared services.
    pub fn new(
        bus: EventBus,
        commands: Arc<CommandRegistry>,
        widgets: Arc<WidgetRegistry>,
        storage: Arc<dyn Storage>,
        catalog: PluginCatalog,
    ) -> Self {
        Self {
            bus,
            commands,
            widgets,
            storage,
            catalog,
            config: PluginConfig::default(),
            table: Mutex::new(Table::default()),
        }
    }

    /// Apply allow/block lists from configuration.
    pub fn with_config(mut self, config: PluginConfig) -> Self {
        self.config = config;
        self
    }

    pub fn catalog(&self) -> &PluginCatalog {
        &self.catalog
    }

    /// Load a plugin from a directory containing `plugin.json` (or the file itself).
    pub async fn load_plugin(&self, path: &Path) -> LifecycleResult<()> {
        let manifest = read_manifest(path).map_err(|e| {
            warn!(path = %path.display(), error = %e, "Rejected plugin manifest");
            e
        })?;
        self.load(manifest, Some(path.to_path_buf())).await
    }

    /// Like `load_plugin`, but stop waiting for `init()` after `limit`.
    ///
    /// The load runs on its own task. On timeout the caller gets
    /// `InitTimedOut` while `init()` keeps running; the instance stays in
    /// `Loading` until it settles into `Active` or `Error`.
    pub async fn load_plugin_with_timeout(
        self: &Arc<Self>,
        path: &Path,
        limit: Duration,
    ) -> LifecycleResult<()> {
        let manifest = read_manifest(path)?;
        let id = manifest.id.clone();
        let manager = Arc::clone(self);
        let path = path.to_path_buf();
        let mut task = tokio::spawn(async move { manager.load(manifest, Some(path)).await });

        match tokio::time::timeout(limit, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(PluginError::InitFailed {
                plugin: id,
                reason: join_error.to_string(),
            }),
            Err(_) => {
                warn!(
                    plugin = %id,
                    timeout_ms = limit.as_millis() as u64,
                    "Plugin init timed out, still loading in the background"
                );
                Err(PluginError::InitTimedOut(id))
            }
        }
    }

    /// Load a plugin from an in-memory manifest (bundled plugins, tests).
    pub async fn load_manifest(&self, manifest: PluginManifest) -> LifecycleResult<()> {
        self.load(manifest, None).await
    }

    async fn load(&self, manifest: PluginManifest, path: Option<PathBuf>) -> LifecycleResult<()> {
        validate_manifest(&manifest)?;
        let id = manifest.id.clone();

        if !self.config.is_plugin_permitted(&id) {
            warn!(plugin = %id, "Plugin blocked by configuration");
            return Err(PluginError::Blocked(id));
        }

        let manifest = Arc::new(manifest);
        let (mut plugin, api) = {
            let mut table = lock(&self.table);

            if let Some(existing) = table.slots.get(&id) {
                if existing.busy || existing.state.is_live() {
                    warn!(plugin = %id, state = %existing.state, "Rejected duplicate load");
                    return Err(PluginError::DuplicateId(id));
                }
            }

            for dep in &manifest.dependencies {
                if table.state_of(dep) != Some(PluginState::Active) {
                    warn!(plugin = %id, dependency = %dep, "Dependency not active");
                    return Err(PluginError::DependencyUnsatisfied {
                        plugin: id,
                        dependency: dep.clone(),
                    });
                }
            }

            let plugin = self
                .catalog
                .create(&id)
                .ok_or_else(|| PluginError::NotInstalled(id.clone()))?;

            let api = PluginApi::new(
                Arc::clone(&manifest),
                self.bus.clone(),
                Arc::clone(&self.commands),
                Arc::clone(&self.widgets),
                Arc::clone(&self.storage),
            );

            // Anything registered during init stays hidden until the plugin is active.
            self.commands.set_plugin_active(&id, false);
            self.widgets.set_owner_active(&id, false);

            table.insert(
                id.clone(),
                Slot {
                    manifest: Arc::clone(&manifest),
                    state: PluginState::Loading,
                    plugin: None,
                    api: api.clone(),
                    last_error: None,
                    path,
                    busy: true,
                },
            );
            (plugin, api)
        };

        info!(
            plugin = %id,
            version = %manifest.version,
            state = %PluginState::Loading,
            "Loading plugin"
        );

        let outcome = AssertUnwindSafe(plugin.init(api.clone()))
            .catch_unwind()
            .await;
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(format!("{:#}", e)),
            Err(panic) => Some(panic_message(panic.as_ref())),
        };

        match failure {
            None => {
                api.set_live(true);
                self.commands.set_plugin_active(&id, true);
                self.widgets.set_owner_active(&id, true);
                self.settle(&id, plugin, PluginState::Active, None);
                info!(plugin = %id, state = %PluginState::Active, "Plugin active");
                Ok(())
            }
            Some(reason) => {
                self.purge_registrations(&id, &api);
                self.settle(&id, plugin, PluginState::Error, Some(reason.clone()));
                warn!(
                    plugin = %id,
                    state = %PluginState::Error,
                    error = %reason,
                    "Plugin init failed"
                );
                Err(PluginError::InitFailed { plugin: id, reason })
            }
        }
    }

    /// Put the plugin object back into its slot and finish a transition.
    fn settle(
        &self,
        id: &str,
        plugin: Box<dyn Plugin>,
        state: PluginState,
        error: Option<String>,
    ) {
        let mut table = lock(&self.table);
        if let Some(slot) = table.slots.get_mut(id) {
            slot.plugin = Some(plugin);
            slot.state = state;
            slot.busy = false;
            if error.is_some() {
                slot.last_error = error;
            }
        }
    }

    /// Revoke `api` and remove every command, widget and subscription
    /// created through it.
    fn purge_registrations(&self, id: &str, api: &PluginApi) {
        api.revoke();
        let subscriptions = api.release_subscriptions();
        let commands = self
            .commands
            .unregister_all_from(&CommandSource::Plugin(id.to_string()));
        self.commands.clear_plugin_marker(id);
        let widgets = self.widgets.unregister_all_from(id);
        info!(
            plugin = %id,
            subscriptions,
            commands,
            widgets,
            "Released plugin registrations"
        );
    }

    /// Take the plugin object out of its slot for a hook call.
    fn begin(
        &self,
        id: &str,
        operation: &'static str,
        allowed: &[PluginState],
    ) -> LifecycleResult<(Box<dyn Plugin>, PluginApi, PluginState)> {
        let mut table = lock(&self.table);
        let slot = table
            .slots
            .get_mut(id)
            .ok_or_else(|| PluginError::NotFound(id.to_string()))?;

        if slot.busy {
            return Err(PluginError::Busy(id.to_string()));
        }
        if !allowed.contains(&slot.state) {
            return Err(PluginError::InvalidTransition {
                plugin: id.to_string(),
                operation,
                state: slot.state.to_string(),
            });
        }
        let plugin = slot
            .plugin
            .take()
            .ok_or_else(|| PluginError::Busy(id.to_string()))?;
        slot.busy = true;
        Ok((plugin, slot.api.clone(), slot.state))
    }

    /// Unload a plugin from `Active`, `Disabled` or `Error`.
    ///
    /// `cleanup()` failures are logged; the plugin is removed regardless,
    /// together with its commands, widgets and bus subscriptions. An `Error`
    /// instance never completed `init()`, so it gets no `cleanup()` call.
    pub fn unload_plugin(&self, id: &str) -> LifecycleResult<()> {
        let (mut plugin, api, state) = self.begin(
            id,
            "unload",
            &[PluginState::Active, PluginState::Disabled, PluginState::Error],
        )?;

        let dependents = self.active_dependents(id);
        if !dependents.is_empty() {
            warn!(
                plugin = %id,
                dependents = ?dependents,
                "Unloading plugin other active plugins depend on"
            );
        }

        api.set_live(false);
        if state != PluginState::Error {
            if let Err(e) = run_hook(id, "cleanup", || plugin.cleanup()) {
                warn!(plugin = %id, error = %e, "Ignoring cleanup failure");
            }
        }
        self.purge_registrations(id, &api);

        lock(&self.table).remove(id);
        drop(plugin);
        info!(plugin = %id, state = %PluginState::Unloaded, "Plugin unloaded");
        Ok(())
    }

    /// Flip a plugin between `Active` and `Disabled`.
    ///
    /// Returns the new enabled state. Commands and widgets are hidden, not
    /// removed, while disabled.
    pub fn toggle_plugin(&self, id: &str) -> LifecycleResult<bool> {
        let (mut plugin, api, state) =
            self.begin(id, "toggle", &[PluginState::Active, PluginState::Disabled])?;

        let enabling = state == PluginState::Disabled;
        let hook_result = if enabling {
            run_hook(id, "enable", || plugin.enable())
        } else {
            run_hook(id, "disable", || plugin.disable())
        };
        let hook_error = hook_result.err().map(|e| {
            warn!(plugin = %id, error = %e, "Ignoring toggle hook failure");
            e.to_string()
        });

        api.set_live(enabling);
        self.commands.set_plugin_active(id, enabling);
        self.widgets.set_owner_active(id, enabling);

        let new_state = if enabling {
            PluginState::Active
        } else {
            PluginState::Disabled
        };
        self.settle(id, plugin, new_state, hook_error);
        info!(plugin = %id, state = %new_state, "Plugin toggled");
        Ok(enabling)
    }

    /// Snapshots of every known instance, in load order.
    pub fn get_installed_plugins(&self) -> Vec<PluginSnapshot> {
        let table = lock(&self.table);
        table
            .order
            .iter()
            .filter_map(|id| table.slots.get(id))
            .map(Slot::snapshot)
            .collect()
    }

    pub fn get_plugin(&self, id: &str) -> Option<PluginSnapshot> {
        lock(&self.table).slots.get(id).map(Slot::snapshot)
    }

    pub fn plugin_state(&self, id: &str) -> Option<PluginState> {
        lock(&self.table).state_of(id)
    }

    fn active_dependents(&self, id: &str) -> Vec<String> {
        let table = lock(&self.table);
        table
            .order
            .iter()
            .filter_map(|other| table.slots.get(other))
            .filter(|slot| {
                slot.state.is_live() && slot.manifest.dependencies.iter().any(|d| d == id)
            })
            .map(|slot| slot.manifest.id.clone())
            .collect()
    }

    /// Publish an activity event to every listening plugin and host subscriber.
    pub fn emit_activity(&self, mut activity: ActivityEvent) -> usize {
        activity.at = Utc::now();
        self.bus.publish(Event::Activity(activity))
    }

    /// Announce a theme change to host-side consumers.
    pub fn set_theme(&self, theme: &str) -> usize {
        self.bus.publish(Event::SetTheme(ThemeChange {
            theme: theme.to_string(),
        }))
    }

    /// Unload every unloadable plugin, most recently loaded first.
    pub fn unload_all(&self) -> usize {
        let ids: Vec<String> = lock(&self.table).order.iter().rev().cloned().collect();
        ids.iter()
            .filter(|id| match self.unload_plugin(id) {
                Ok(()) => true,
                Err(e) => {
                    warn!(plugin = %id, error = %e, "Could not unload plugin");
                    false
                }
            })
            .count()
    }
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager")
            .field("plugins", &lock(&self.table).order)
            .field("catalog", &self.catalog)
            .finish()
    }
}

/// Run a synchronous lifecycle hook, turning errors and panics into
/// `LifecycleHookFailed`.
fn run_hook<F>(id: &str, hook: &'static str, f: F) -> LifecycleResult<()>
where
    F: FnOnce() -> anyhow::Result<()>,
{
    let reason = match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => return Ok(()),
        Ok(Err(e)) => format!("{:#}", e),
        Err(panic) => panic_message(panic.as_ref()),
    };
    Err(PluginError::LifecycleHookFailed {
        plugin: id.to_string(),
        hook,
        reason,
    })
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}
