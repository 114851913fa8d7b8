//! Command registry for WidgetDeck
//!
//! Maps command ids to command descriptors. Both the host (built-in
//! commands) and plugins (through their API facade) register here. The
//! registry preserves registration order so the command palette and the
//! voice router see a stable ordering.
//!
//! Commands owned by a disabled plugin stay registered but are left out of
//! `list()`; re-enabling the plugin brings them back in their original
//! positions.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{DeckError, Result};
use crate::utils::lock;

/// Zero-argument side-effecting operation run when a command fires.
pub type CommandAction = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// Who registered a command.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub enum CommandSource {
    /// Registered by the host itself.
    Builtin,
    /// Registered by the plugin with this id.
    Plugin(String),
}

impl CommandSource {
    /// The owning plugin id, if any.
    pub fn plugin_id(&self) -> Option<&str> {
        match self {
            CommandSource::Builtin => None,
            CommandSource::Plugin(id) => Some(id),
        }
    }
}

impl fmt::Display for CommandSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandSource::Builtin => f.write_str("builtin"),
            CommandSource::Plugin(id) => f.write_str(id),
        }
    }
}

impl From<CommandSource> for String {
    fn from(source: CommandSource) -> Self {
        source.to_string()
    }
}

/// A palette / voice command.
#[derive(Clone)]
pub struct Command {
    pub id: String,
    pub label: String,
    /// Extra words used for matching, in declaration order.
    pub keywords: Vec<String>,
    pub shortcut: Option<String>,
    pub action: CommandAction,
    pub source: CommandSource,
}

impl Command {
    /// Create a built-in command with no keywords or shortcut.
    pub fn new<F>(id: &str, label: &str, action: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            keywords: Vec::new(),
            shortcut: None,
            action: Arc::new(action),
            source: CommandSource::Builtin,
        }
    }

    /// Add matching keywords. Duplicates are ignored.
    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        for kw in keywords {
            if !self.keywords.iter().any(|k| k == kw) {
                self.keywords.push(kw.to_string());
            }
        }
        self
    }

    pub fn with_shortcut(mut self, shortcut: &str) -> Self {
        self.shortcut = Some(shortcut.to_string());
        self
    }

    pub fn with_source(mut self, source: CommandSource) -> Self {
        self.source = source;
        self
    }

    /// Run the command's action.
    pub fn run(&self) -> anyhow::Result<()> {
        (self.action)()
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("keywords", &self.keywords)
            .field("shortcut", &self.shortcut)
            .field("source", &self.source)
            .finish()
    }
}

#[derive(Default)]
struct RegistryInner {
    commands: Vec<Command>,
    inactive_sources: HashSet<String>,
    revision: u64,
}

impl RegistryInner {
    fn is_active(&self, command: &Command) -> bool {
        match &command.source {
            CommandSource::Builtin => true,
            CommandSource::Plugin(id) => !self.inactive_sources.contains(id),
        }
    }
}

/// Shared, internally synchronized command table.
#[derive(Default)]
pub struct CommandRegistry {
    inner: Mutex<RegistryInner>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command.
    ///
    /// A new id is appended. An existing id is replaced in place only when
    /// `command.source` matches the current owner; otherwise the call fails
    /// and the registry is unchanged.
    pub fn register(&self, command: Command) -> Result<()> {
        let mut inner = lock(&self.inner);

        if let Some(pos) = inner.commands.iter().position(|c| c.id == command.id) {
            let owner = &inner.commands[pos].source;
            if owner != &command.source {
                return Err(DeckError::Command(format!(
                    "Command '{}' is owned by '{}' and cannot be replaced by '{}'",
                    command.id, owner, command.source
                )));
            }
            debug!(command = %command.id, source = %command.source, "Replaced command");
            inner.commands[pos] = command;
        } else {
            info!(command = %command.id, source = %command.source, "Registered command");
            inner.commands.push(command);
        }

        inner.revision += 1;
        Ok(())
    }

    /// Remove a command regardless of owner.
    pub fn unregister(&self, id: &str) -> Option<Command> {
        let mut inner = lock(&self.inner);
        let pos = inner.commands.iter().position(|c| c.id == id)?;
        inner.revision += 1;
        Some(inner.commands.remove(pos))
    }

    /// Remove a command only if `source` owns it.
    pub fn unregister_owned(&self, id: &str, source: &CommandSource) -> Result<Command> {
        let mut inner = lock(&self.inner);
        let pos = inner
            .commands
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| DeckError::NotFound(format!("command '{}'", id)))?;

        if &inner.commands[pos].source != source {
            return Err(DeckError::Command(format!(
                "Command '{}' is owned by '{}', not '{}'",
                id, inner.commands[pos].source, source
            )));
        }

        inner.revision += 1;
        Ok(inner.commands.remove(pos))
    }

    /// Remove every command owned by `source`. Returns how many were removed.
    pub fn unregister_all_from(&self, source: &CommandSource) -> usize {
        let mut inner = lock(&self.inner);
        let before = inner.commands.len();
        inner.commands.retain(|c| &c.source != source);
        let removed = before - inner.commands.len();
        if removed > 0 {
            inner.revision += 1;
            info!(source = %source, removed, "Removed commands");
        }
        removed
    }

    /// Mark a plugin's commands as offered (`true`) or hidden (`false`).
    pub fn set_plugin_active(&self, plugin_id: &str, active: bool) {
        let mut inner = lock(&self.inner);
        let changed = if active {
            inner.inactive_sources.remove(plugin_id)
        } else {
            inner.inactive_sources.insert(plugin_id.to_string())
        };
        if changed {
            inner.revision += 1;
        }
    }

    /// Forget any active/inactive marker for a plugin.
    pub(crate) fn clear_plugin_marker(&self, plugin_id: &str) {
        let mut inner = lock(&self.inner);
        if inner.inactive_sources.remove(plugin_id) {
            inner.revision += 1;
        }
    }

    /// Active commands in registration order.
    pub fn list(&self) -> Vec<Command> {
        let inner = lock(&self.inner);
        inner
            .commands
            .iter()
            .filter(|c| inner.is_active(c))
            .cloned()
            .collect()
    }

    /// Every registered command, active or not, in registration order.
    pub fn list_all(&self) -> Vec<Command> {
        lock(&self.inner).commands.clone()
    }

    /// Look up a command by id, active or not.
    pub fn get(&self, id: &str) -> Option<Command> {
        lock(&self.inner)
            .commands
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    /// Run an active command by id.
    ///
    /// The action runs after the registry lock is released, so actions may
    /// register or remove commands themselves.
    pub fn execute(&self, id: &str) -> Result<()> {
        let command = {
            let inner = lock(&self.inner);
            inner
                .commands
                .iter()
                .find(|c| c.id == id && inner.is_active(c))
                .cloned()
        };

        let command = command.ok_or_else(|| DeckError::NotFound(format!("command '{}'", id)))?;
        info!(command = %command.id, source = %command.source, "Running command");
        command
            .run()
            .map_err(|e| DeckError::Command(format!("Command '{}' failed: {}", id, e)))
    }

    /// Number of registered commands, active or not.
    pub fn len(&self) -> usize {
        lock(&self.inner).commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counter bumped on every change that can affect `list()`.
    pub fn revision(&self) -> u64 {
        lock(&self.inner).revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn noop(id: &str, label: &str) -> Command {
        Command::new(id, label, || Ok(()))
    }

    fn plugin(id: &str) -> CommandSource {
        CommandSource::Plugin(id.to_string())
    }

    fn ids(commands: &[Command]) -> Vec<&str> {
        commands.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn test_registration_order_is_preserved() {
        let registry = CommandRegistry::new();
        registry.register(noop("c", "C")).unwrap();
        registry.register(noop("a", "A")).unwrap();
        registry.register(noop("b", "B")).unwrap();

        assert_eq!(ids(&registry.list()), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_owner_can_replace_in_place() {
        let registry = CommandRegistry::new();
        registry.register(noop("a", "A")).unwrap();
        registry
            .register(noop("b", "Old").with_source(plugin("p")))
            .unwrap();
        registry.register(noop("c", "C")).unwrap();

        registry
            .register(noop("b", "New").with_source(plugin("p")))
            .unwrap();

        let list = registry.list();
        assert_eq!(ids(&list), vec!["a", "b", "c"]);
        assert_eq!(list[1].label, "New");
    }

    #[test]
    fn test_non_owner_cannot_replace() {
        let registry = CommandRegistry::new();
        registry
            .register(noop("shared", "Mine").with_source(plugin("p1")))
            .unwrap();

        let result = registry.register(noop("shared", "Theirs").with_source(plugin("p2")));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("owned by 'p1'"));
        assert_eq!(registry.get("shared").unwrap().label, "Mine");

        let result = registry.register(noop("shared", "Host"));
        assert!(result.is_err());
    }

    #[test]
    fn test_unregister_all_from_source() {
        let registry = CommandRegistry::new();
        registry.register(noop("builtin", "B")).unwrap();
        registry
            .register(noop("p1", "P1").with_source(plugin("p")))
            .unwrap();
        registry
            .register(noop("q1", "Q1").with_source(plugin("q")))
            .unwrap();
        registry
            .register(noop("p2", "P2").with_source(plugin("p")))
            .unwrap();

        assert_eq!(registry.unregister_all_from(&plugin("p")), 2);
        assert_eq!(ids(&registry.list()), vec!["builtin", "q1"]);
        assert_eq!(registry.unregister_all_from(&plugin("p")), 0);
    }

    #[test]
    fn test_unregister_owned() {
        let registry = CommandRegistry::new();
        registry
            .register(noop("x", "X").with_source(plugin("p")))
            .unwrap();

        assert!(registry.unregister_owned("x", &plugin("q")).is_err());
        assert!(registry.unregister_owned("x", &plugin("p")).is_ok());
        assert!(matches!(
            registry.unregister_owned("x", &plugin("p")),
            Err(DeckError::NotFound(_))
        ));
    }

    #[test]
    fn test_inactive_plugin_commands_hidden_then_restored_in_order() {
        let registry = CommandRegistry::new();
        registry
            .register(noop("p1", "P1").with_source(plugin("p")))
            .unwrap();
        registry.register(noop("b", "B")).unwrap();
        registry
            .register(noop("p2", "P2").with_source(plugin("p")))
            .unwrap();

        registry.set_plugin_active("p", false);
        assert_eq!(ids(&registry.list()), vec!["b"]);
        assert_eq!(registry.len(), 3);

        registry.set_plugin_active("p", true);
        assert_eq!(ids(&registry.list()), vec!["p1", "b", "p2"]);
    }

    #[test]
    fn test_execute_runs_active_command_only() {
        let registry = CommandRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        registry
            .register(
                Command::new("count", "Count", move || {
                    h.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .with_source(plugin("p")),
            )
            .unwrap();

        registry.execute("count").unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        registry.set_plugin_active("p", false);
        assert!(registry.execute("count").is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_execute_reports_action_failure() {
        let registry = CommandRegistry::new();
        registry
            .register(Command::new("bad", "Bad", || anyhow::bail!("disk full")))
            .unwrap();

        let err = registry.execute("bad").unwrap_err();
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_revision_tracks_changes() {
        let registry = CommandRegistry::new();
        let r0 = registry.revision();
        registry
            .register(noop("a", "A").with_source(plugin("p")))
            .unwrap();
        let r1 = registry.revision();
        assert!(r1 > r0);

        registry.set_plugin_active("p", false);
        let r2 = registry.revision();
        assert!(r2 > r1);

        // No-op toggle leaves the revision alone
        registry.set_plugin_active("p", false);
        assert_eq!(registry.revision(), r2);
    }

    #[test]
    fn test_keywords_deduplicated() {
        let cmd = noop("a", "A").with_keywords(&["x", "y", "x"]);
        assert_eq!(cmd.keywords, vec!["x", "y"]);
    }

    #[test]
    fn test_source_serializes_as_string() {
        assert_eq!(serde_json::to_value(CommandSource::Builtin).unwrap(), "builtin");
        assert_eq!(serde_json::to_value(plugin("notes")).unwrap(), "notes");
    }
}
