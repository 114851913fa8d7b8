//! Runtime context
//!
//! `DeckContext` owns every piece of shared runtime state: the event bus, the
//! command and widget registries, storage, the plugin manager and the live
//! voice router. Nothing here is global, so tests (and multiple dashboards in
//! one process) can build independent instances.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::builtin::register_host_commands;
use crate::bus::EventBus;
use crate::commands::CommandRegistry;
use crate::config::{DeckConfig, StorageBackend};
use crate::error::{PluginError, Result};
use crate::plugins::{discover_manifests, DiscoveredPlugin, PluginCatalog, PluginManager};
use crate::storage::{JsonFileStorage, MemoryStorage, Storage};
use crate::voice::LiveVoiceRouter;
use crate::widgets::WidgetRegistry;

/// Outcome of one load attempt during a batch load.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub id: String,
    pub path: Option<PathBuf>,
    pub result: std::result::Result<(), PluginError>,
}

/// All runtime state of one dashboard.
pub struct DeckContext {
    pub config: DeckConfig,
    pub bus: EventBus,
    pub commands: Arc<CommandRegistry>,
    pub widgets: Arc<WidgetRegistry>,
    pub storage: Arc<dyn Storage>,
    pub manager: Arc<PluginManager>,
    pub voice: LiveVoiceRouter,
}

impl DeckContext {
    /// Build a context using the storage backend named in `config`.
    pub fn new(config: DeckConfig, catalog: PluginCatalog) -> Result<Self> {
        let storage: Arc<dyn Storage> = match config.storage.backend {
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
            StorageBackend::Json => {
                Arc::new(JsonFileStorage::new(config.storage.resolved_data_dir())?)
            }
        };
        Self::with_storage(config, catalog, storage)
    }

    /// Build a context around an existing storage backend.
    pub fn with_storage(
        config: DeckConfig,
        catalog: PluginCatalog,
        storage: Arc<dyn Storage>,
    ) -> Result<Self> {
        let bus = EventBus::new();
        let commands = Arc::new(CommandRegistry::new());
        let widgets = Arc::new(WidgetRegistry::new());

        register_host_commands(&commands, &bus)?;

        let manager = Arc::new(
            PluginManager::new(
                bus.clone(),
                Arc::clone(&commands),
                Arc::clone(&widgets),
                Arc::clone(&storage),
                catalog,
            )
            .with_config(config.plugins.clone()),
        );
        let voice = LiveVoiceRouter::new(Arc::clone(&commands));

        info!(
            backend = ?config.storage.backend,
            voice = config.voice.enabled,
            "Dashboard context ready"
        );
        Ok(Self {
            config,
            bus,
            commands,
            widgets,
            storage,
            manager,
            voice,
        })
    }

    /// Load every bundled plugin the configuration permits.
    pub async fn load_bundled(&self) -> Vec<LoadReport> {
        let manifests = self.manager.catalog().bundled_manifests().to_vec();
        let mut reports = Vec::with_capacity(manifests.len());
        for manifest in manifests {
            if !self.config.plugins.is_plugin_permitted(&manifest.id) {
                continue;
            }
            let id = manifest.id.clone();
            let result = self.manager.load_manifest(manifest).await;
            reports.push(LoadReport {
                id,
                path: None,
                result,
            });
        }
        reports
    }

    /// Discover manifests in the configured plugin directories and load them.
    ///
    /// Plugins whose dependencies are not active yet are retried after the
    /// others, until a pass makes no progress.
    pub async fn load_discovered(&self) -> Result<Vec<LoadReport>> {
        let dirs = self.config.plugins.resolved_plugin_dirs();
        let mut pending: Vec<DiscoveredPlugin> = discover_manifests(&dirs)?;
        let timeout = self.config.plugins.init_timeout();
        let mut reports = Vec::new();

        loop {
            let mut deferred = Vec::new();
            let mut deferred_errors = Vec::new();
            let before = pending.len();

            for plugin in pending {
                let result = self
                    .manager
                    .load_plugin_with_timeout(&plugin.path, timeout)
                    .await;
                match result {
                    Err(e @ PluginError::DependencyUnsatisfied { .. }) => {
                        deferred_errors.push(e);
                        deferred.push(plugin);
                    }
                    result => reports.push(LoadReport {
                        id: plugin.manifest.id,
                        path: Some(plugin.path),
                        result,
                    }),
                }
            }

            if deferred.is_empty() || deferred.len() == before {
                for (plugin, error) in deferred.into_iter().zip(deferred_errors) {
                    warn!(plugin = %plugin.manifest.id, error = %error, "Giving up on plugin");
                    reports.push(LoadReport {
                        id: plugin.manifest.id,
                        path: Some(plugin.path),
                        result: Err(error),
                    });
                }
                break;
            }
            pending = deferred;
        }

        Ok(reports)
    }

    /// Unload every plugin, most recent first.
    pub fn shutdown(&self) -> usize {
        let unloaded = self.manager.unload_all();
        info!(unloaded, "Dashboard shut down");
        unloaded
    }
}

impl std::fmt::Debug for DeckContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeckContext")
            .field("config", &self.config)
            .field("bus", &self.bus)
            .field("commands", &self.commands.len())
            .field("widgets", &self.widgets.len())
            .field("manager", &self.manager)
            .finish()
    }
}
