//! `commands` and `voice` command handlers.

use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};

use widgetdeck::bus::{Event, Topic};
use widgetdeck::commands::Command;
use widgetdeck::DeckConfig;

use super::open_deck;

fn describe(command: &Command) -> String {
    let mut line = format!("{:<20} {:<18} [{}]", command.label, command.id, command.source);
    if let Some(shortcut) = &command.shortcut {
        line.push_str(&format!(" {}", shortcut));
    }
    if !command.keywords.is_empty() {
        line.push_str(&format!("  ({})", command.keywords.join(", ")));
    }
    line
}

/// Print the command palette in registration order.
pub(crate) async fn cmd_commands(config: DeckConfig, all: bool) -> Result<()> {
    let ctx = open_deck(config).await?;
    let active = ctx.commands.list();

    if all {
        for command in ctx.commands.list_all() {
            let hidden = !active.iter().any(|c| c.id == command.id);
            println!(
                "{}{}",
                describe(&command),
                if hidden { "  (inactive)" } else { "" }
            );
        }
    } else {
        for command in &active {
            println!("{}", describe(command));
        }
    }

    ctx.shutdown();
    Ok(())
}

/// Resolve a transcript and run (or just show) the matching command.
pub(crate) async fn cmd_voice(config: DeckConfig, transcript: String, dry_run: bool) -> Result<()> {
    if !config.voice.enabled {
        bail!("Voice commands are disabled in the configuration");
    }
    let ctx = open_deck(config).await?;

    let Some(command) = ctx.voice.resolve(&transcript) else {
        println!("No command matches \"{}\"", transcript.trim());
        ctx.shutdown();
        return Ok(());
    };

    if dry_run {
        println!("Would run: {}", describe(&command));
        ctx.shutdown();
        return Ok(());
    }

    let toasts = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&toasts);
    let subscription = ctx.bus.subscribe(Topic::Toast, move |event| {
        if let Event::Toast(toast) = event {
            if let Ok(mut toasts) = sink.lock() {
                toasts.push(format!("[{}] {}", toast.level, toast.message));
            }
        }
        Ok(())
    });

    let result = ctx.voice.dispatch(&transcript);
    subscription.unsubscribe();

    match result {
        Ok(id) => {
            println!("Ran: {} ({})", command.label, id);
            if let Ok(toasts) = toasts.lock() {
                for toast in toasts.iter() {
                    println!("  {}", toast);
                }
            }
        }
        Err(e) => eprintln!("Command failed: {}", e),
    }

    ctx.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_includes_shortcut_and_keywords() {
        let command = Command::new("sync.now", "Sync Now", || Ok(()))
            .with_keywords(&["sync", "backup"])
            .with_shortcut("Ctrl+Shift+S");
        let line = describe(&command);
        assert!(line.starts_with("Sync Now"));
        assert!(line.contains("[builtin]"));
        assert!(line.contains("Ctrl+Shift+S"));
        assert!(line.ends_with("(sync, backup)"));
    }
}
