//! Commands the host itself provides (source `builtin`).

use tracing::info;

use crate::bus::{ActivityEvent, Event, EventBus};
use crate::commands::{Command, CommandRegistry};
use crate::error::Result;

/// Describes one host command: id, label, keywords, shortcut, activity kind.
struct HostCommand {
    id: &'static str,
    label: &'static str,
    keywords: &'static [&'static str],
    shortcut: &'static str,
    activity: &'static str,
}

const HOST_COMMANDS: &[HostCommand] = &[
    HostCommand {
        id: "settings.open",
        label: "Open Settings",
        keywords: &["settings", "preferences"],
        shortcut: "Ctrl+,",
        activity: "settings.opened",
    },
    HostCommand {
        id: "workspace.switch",
        label: "Switch Workspace",
        keywords: &["workspace"],
        shortcut: "Ctrl+Shift+W",
        activity: "workspace.switched",
    },
    HostCommand {
        id: "sync.now",
        label: "Sync Now",
        keywords: &["sync", "backup"],
        shortcut: "Ctrl+Shift+S",
        activity: "sync.requested",
    },
];

/// Register the host's built-in commands. Each one reports itself on the
/// `activity` topic when run.
pub fn register_host_commands(registry: &CommandRegistry, bus: &EventBus) -> Result<()> {
    for entry in HOST_COMMANDS {
        let bus = bus.clone();
        let kind = entry.activity;
        let label = entry.label;
        let command = Command::new(entry.id, entry.label, move || {
            bus.publish(Event::Activity(ActivityEvent::new(kind, "builtin", label)));
            Ok(())
        })
        .with_keywords(entry.keywords)
        .with_shortcut(entry.shortcut);
        registry.register(command)?;
    }
    info!(count = HOST_COMMANDS.len(), "Registered host commands");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Topic;
    use crate::commands::CommandSource;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_host_commands_registered_as_builtin() {
        let registry = CommandRegistry::new();
        register_host_commands(&registry, &EventBus::new()).unwrap();

        let commands = registry.list();
        let labels: Vec<&str> = commands.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["Open Settings", "Switch Workspace", "Sync Now"]);
        assert!(commands.iter().all(|c| c.source == CommandSource::Builtin));
    }

    #[test]
    fn test_host_command_publishes_activity() {
        let registry = CommandRegistry::new();
        let bus = EventBus::new();
        register_host_commands(&registry, &bus).unwrap();
        let kinds = Arc::new(Mutex::new(Vec::new()));
        let k = Arc::clone(&kinds);
        bus.subscribe(Topic::Activity, move |event| {
            if let Event::Activity(activity) = event {
                k.lock().unwrap().push(activity.kind.clone());
            }
            Ok(())
        });

        registry.execute("sync.now").unwrap();
        assert_eq!(*kinds.lock().unwrap(), vec!["sync.requested"]);
    }

    #[test]
    fn test_registering_twice_replaces_in_place() {
        let registry = CommandRegistry::new();
        let bus = EventBus::new();
        register_host_commands(&registry, &bus).unwrap();
        register_host_commands(&registry, &bus).unwrap();
        assert_eq!(registry.len(), 3);
    }
}
