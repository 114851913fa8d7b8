//! Voice command routing
//!
//! Resolves a free-text transcript to one of the currently active commands.
//! A `VoiceRouter` is a pure function of a command snapshot: it expands every
//! command into a set of spoken phrases (label, keywords and a few fixed
//! synonyms) and matches transcripts against that table.
//!
//! `LiveVoiceRouter` keeps a router in sync with a `CommandRegistry`, building
//! a new table only when the registry's revision has moved.
//!
//! # Example
//!
//! ```
//! use widgetdeck::commands::Command;
//! use widgetdeck::voice::VoiceRouter;
//!
//! let spotify = Command::new("music.controls", "Spotify Controls", || Ok(()))
//!     .with_keywords(&["spotify"]);
//! let router = VoiceRouter::build(&[spotify]);
//!
//! assert_eq!(router.resolve("play music").map(|c| c.id.as_str()), Some("music.controls"));
//! assert!(router.resolve("completely unrelated gibberish").is_none());
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::commands::{Command, CommandRegistry};
use crate::error::{DeckError, Result};
use crate::utils::lock;

/// Substring triggers and the phrases they add.
const SYNONYMS: &[(&[&str], &[&str])] = &[
    (&["note"], &["new note", "add note", "make a note"]),
    (&["timer"], &["start timer", "begin timer", "set timer"]),
    (
        &["music", "spotify"],
        &["play music", "pause music", "next track", "previous track"],
    ),
    (&["workspace"], &["switch workspace", "change workspace"]),
    (&["sync"], &["sync", "synchronize", "backup"]),
];

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Phrase table built from a command snapshot.
#[derive(Debug, Clone, Default)]
pub struct VoiceRouter {
    commands: Vec<Command>,
    // (phrase, index into `commands`) in first-insertion order
    phrases: Vec<(String, usize)>,
    index: HashMap<String, usize>,
}

impl VoiceRouter {
    /// Build the phrase table for `commands`.
    ///
    /// A phrase produced by more than one command maps to the last one but
    /// keeps the position where it first appeared.
    pub fn build(commands: &[Command]) -> Self {
        let mut router = Self {
            commands: commands.to_vec(),
            ..Default::default()
        };
        for (i, command) in commands.iter().enumerate() {
            let label = normalize(&command.label);
            let keywords: Vec<String> = command.keywords.iter().map(|k| normalize(k)).collect();

            router.insert(&label, i);
            for keyword in &keywords {
                router.insert(keyword, i);
            }
            for (triggers, expansions) in SYNONYMS {
                let triggered = triggers
                    .iter()
                    .any(|t| label.contains(t) || keywords.iter().any(|k| k.contains(t)));
                if triggered {
                    for phrase in *expansions {
                        router.insert(phrase, i);
                    }
                }
            }
        }
        debug!(
            commands = router.commands.len(),
            phrases = router.phrases.len(),
            "Built voice phrase table"
        );
        router
    }

    fn insert(&mut self, phrase: &str, command: usize) {
        if phrase.is_empty() {
            return;
        }
        match self.index.get(phrase) {
            Some(&slot) => self.phrases[slot].1 = command,
            None => {
                self.index.insert(phrase.to_string(), self.phrases.len());
                self.phrases.push((phrase.to_string(), command));
            }
        }
    }

    /// Phrase table in iteration order.
    pub fn phrases(&self) -> impl Iterator<Item = (&str, &Command)> {
        self.phrases
            .iter()
            .map(|(phrase, i)| (phrase.as_str(), &self.commands[*i]))
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    /// Resolve a transcript to a command.
    ///
    /// An exact phrase match wins. Otherwise the first phrase (in table
    /// order) where the number of word pairs in which one word contains the
    /// other is at least half of the shorter word count is accepted.
    pub fn resolve(&self, transcript: &str) -> Option<&Command> {
        let transcript = normalize(transcript);
        if transcript.is_empty() {
            return None;
        }

        if let Some(&slot) = self.index.get(&transcript) {
            return Some(&self.commands[self.phrases[slot].1]);
        }

        let spoken: Vec<&str> = transcript.split_whitespace().collect();
        self.phrases
            .iter()
            .find(|(phrase, _)| {
                let words: Vec<&str> = phrase.split_whitespace().collect();
                let matches = word_matches(&spoken, &words);
                // Half, never rounded down: 2 * matches >= shorter
                matches > 0 && 2 * matches >= spoken.len().min(words.len())
            })
            .map(|(_, i)| &self.commands[*i])
    }
}

fn word_matches(spoken: &[&str], phrase: &[&str]) -> usize {
    spoken
        .iter()
        .map(|s| {
            phrase
                .iter()
                .filter(|p| s.contains(*p) || p.contains(*s))
                .count()
        })
        .sum()
}

/// A `VoiceRouter` that follows the active command set of a registry.
pub struct LiveVoiceRouter {
    registry: Arc<CommandRegistry>,
    state: Mutex<LiveState>,
}

struct LiveState {
    revision: Option<u64>,
    router: Arc<VoiceRouter>,
    rebuilds: u64,
}

impl LiveVoiceRouter {
    pub fn new(registry: Arc<CommandRegistry>) -> Self {
        Self {
            registry,
            state: Mutex::new(LiveState {
                revision: None,
                router: Arc::new(VoiceRouter::default()),
                rebuilds: 0,
            }),
        }
    }

    /// Current router, rebuilt first if the registry changed since the last build.
    pub fn router(&self) -> Arc<VoiceRouter> {
        let revision = self.registry.revision();
        let mut state = lock(&self.state);
        if state.revision != Some(revision) {
            state.router = Arc::new(VoiceRouter::build(&self.registry.list()));
            state.revision = Some(revision);
            state.rebuilds += 1;
        }
        Arc::clone(&state.router)
    }

    /// Number of times the phrase table has been rebuilt.
    pub fn rebuilds(&self) -> u64 {
        lock(&self.state).rebuilds
    }

    pub fn resolve(&self, transcript: &str) -> Option<Command> {
        self.router().resolve(transcript).cloned()
    }

    /// Resolve `transcript` and run the matching command.
    ///
    /// Returns the id of the command that ran.
    pub fn dispatch(&self, transcript: &str) -> Result<String> {
        let command = self.resolve(transcript).ok_or_else(|| {
            DeckError::NotFound(format!("No command matches \"{}\"", transcript.trim()))
        })?;
        info!(transcript = %transcript.trim(), command = %command.id, "Voice command matched");
        self.registry.execute(&command.id)?;
        Ok(command.id)
    }
}

impl std::fmt::Debug for LiveVoiceRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("LiveVoiceRouter")
            .field("revision", &state.revision)
            .field("phrases", &state.router.len())
            .finish()
    }
}
