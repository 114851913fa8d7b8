//! `plugins` and `status` command handlers.

use std::path::PathBuf;

use anyhow::{Context, Result};

use widgetdeck::plugins::{discover_manifests, PluginManifest};
use widgetdeck::DeckConfig;

use super::open_deck;

fn permissions_line(manifest: &PluginManifest) -> String {
    if manifest.permissions.is_empty() {
        return "-".to_string();
    }
    manifest
        .permissions
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Discover and validate manifests without running any plugin code.
pub(crate) fn cmd_plugins(config: DeckConfig, extra_dirs: Vec<PathBuf>) -> Result<()> {
    let mut dirs = config.plugins.resolved_plugin_dirs();
    dirs.extend(extra_dirs);

    let discovered =
        discover_manifests(&dirs).with_context(|| "Failed to scan plugin directories")?;

    println!("Plugin directories:");
    for dir in &dirs {
        println!("  {}", dir.display());
    }
    println!();

    if discovered.is_empty() {
        println!("No valid plugins found. Invalid manifests are reported in the log.");
        return Ok(());
    }

    for plugin in &discovered {
        let m = &plugin.manifest;
        let admitted = if config.plugins.is_plugin_permitted(&m.id) {
            ""
        } else {
            " [blocked]"
        };
        println!("{} v{} ({}){}", m.id, m.version, m.plugin_type, admitted);
        println!("  name:        {}", m.name);
        println!("  author:      {}", m.author);
        println!("  permissions: {}", permissions_line(m));
        if !m.dependencies.is_empty() {
            println!("  depends on:  {}", m.dependencies.join(", "));
        }
        println!("  path:        {}", plugin.path.display());
    }
    println!();
    println!("{} valid plugin(s)", discovered.len());
    Ok(())
}

pub(crate) async fn cmd_status(config: DeckConfig) -> Result<()> {
    let ctx = open_deck(config).await?;

    println!("Plugins:");
    for snapshot in ctx.manager.get_installed_plugins() {
        println!(
            "  {:<12} {:<9} v{}",
            snapshot.id(),
            snapshot.state.to_string(),
            snapshot.manifest.version
        );
        if let Some(error) = &snapshot.last_error {
            println!("    last error: {}", error);
        }
    }
    println!();
    println!(
        "Commands: {} active / {} registered",
        ctx.commands.list().len(),
        ctx.commands.len()
    );
    println!("Widgets:  {}", ctx.widgets.list().len());
    println!("Bus subscribers: {}", ctx.bus.total_subscribers());
    println!(
        "Voice: {}",
        if ctx.config.voice.enabled {
            "enabled"
        } else {
            "disabled"
        }
    );

    ctx.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use widgetdeck::plugins::{Permission, PluginType};

    #[test]
    fn test_permissions_line() {
        let bare = PluginManifest::new("bare", "Bare", PluginType::Command);
        assert_eq!(permissions_line(&bare), "-");

        let full = bare.with_permissions(&[Permission::Storage, Permission::Commands]);
        assert_eq!(permissions_line(&full), "storage, commands");
    }
}
