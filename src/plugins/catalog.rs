//! The plugin contract and the catalog of installed implementations.
//!
//! Plugin code is never loaded from arbitrary files. Every implementation is
//! compiled in and registered in a `PluginCatalog` under its manifest id; the
//! manager looks up the factory only after the manifest has been validated.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::api::PluginApi;
use super::types::PluginManifest;

/// Lifecycle hooks every plugin implements.
///
/// An `Err` from any hook is treated as that hook failing. `init` failures
/// put the instance into the `Error` state; `cleanup`, `enable` and
/// `disable` failures are logged and never block the transition.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Set the plugin up. The instance is not active until this resolves.
    async fn init(&mut self, api: PluginApi) -> anyhow::Result<()>;

    /// Release resources before the plugin is unloaded.
    fn cleanup(&mut self) -> anyhow::Result<()>;

    /// Called when a disabled plugin is re-enabled.
    fn enable(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called when an active plugin is disabled.
    fn disable(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Constructs a fresh plugin instance.
pub type PluginFactory = Arc<dyn Fn() -> Box<dyn Plugin> + Send + Sync>;

/// Table of compiled-in plugin implementations keyed by manifest id.
#[derive(Clone, Default)]
pub struct PluginCatalog {
    factories: HashMap<String, PluginFactory>,
    bundled: Vec<PluginManifest>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the implementation for manifests with id `id`.
    pub fn register<F>(&mut self, id: &str, factory: F)
    where
        F: Fn() -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        self.factories.insert(id.to_string(), Arc::new(factory));
    }

    /// Register an implementation that ships its own manifest.
    pub fn register_bundled<F>(&mut self, manifest: PluginManifest, factory: F)
    where
        F: Fn() -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        self.register(&manifest.id, factory);
        self.bundled.retain(|m| m.id != manifest.id);
        self.bundled.push(manifest);
    }

    /// Instantiate the plugin for `id`, if installed.
    pub fn create(&self, id: &str) -> Option<Box<dyn Plugin>> {
        self.factories.get(id).map(|factory| factory())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Installed ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.factories.keys().map(|k| k.as_str()).collect();
        ids.sort();
        ids
    }

    /// Manifests of bundled plugins, in registration order.
    pub fn bundled_manifests(&self) -> &[PluginManifest] {
        &self.bundled
    }
}

impl fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginCatalog")
            .field("ids", &self.ids())
            .field("bundled", &self.bundled.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::types::PluginType;

    struct Nop;

    #[async_trait]
    impl Plugin for Nop {
        async fn init(&mut self, _api: PluginApi) -> anyhow::Result<()> {
            Ok(())
        }

        fn cleanup(&mut self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_catalog_register_and_create() {
        let mut catalog = PluginCatalog::new();
        catalog.register("nop", || Box::new(Nop));

        assert!(catalog.contains("nop"));
        assert!(catalog.create("nop").is_some());
        assert!(catalog.create("missing").is_none());
    }

    #[test]
    fn test_bundled_manifest_replaced_on_reregister() {
        let mut catalog = PluginCatalog::new();
        let mut m = PluginManifest::new("nop", "Nop", PluginType::Command);
        catalog.register_bundled(m.clone(), || Box::new(Nop));
        m.version = "2.0.0".into();
        catalog.register_bundled(m, || Box::new(Nop));

        assert_eq!(catalog.bundled_manifests().len(), 1);
        assert_eq!(catalog.bundled_manifests()[0].version, "2.0.0");
        assert_eq!(catalog.ids(), vec!["nop"]);
    }

    #[test]
    fn test_created_plugin_initializes() {
        use crate::bus::EventBus;
        use crate::commands::CommandRegistry;
        use crate::storage::MemoryStorage;
        use crate::widgets::WidgetRegistry;

        let mut catalog = PluginCatalog::new();
        catalog.register("nop", || Box::new(Nop));
        let api = PluginApi::new(
            Arc::new(PluginManifest::new("nop", "Nop", PluginType::Command)),
            EventBus::new(),
            Arc::new(CommandRegistry::new()),
            Arc::new(WidgetRegistry::new()),
            Arc::new(MemoryStorage::new()),
        );

        let mut plugin = catalog.create("nop").unwrap();
        tokio_test::assert_ok!(tokio_test::block_on(plugin.init(api)));
        tokio_test::assert_ok!(plugin.cleanup());
    }

    #[test]
    fn test_default_enable_disable_are_noops() {
        let mut plugin = Nop;
        assert!(plugin.enable().is_ok());
        assert!(plugin.disable().is_ok());
    }
}
