//! WidgetDeck - personal productivity dashboard with a sandboxed plugin runtime

pub mod builtin;
pub mod bus;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod plugins;
pub mod storage;
pub mod utils;
pub mod voice;
pub mod widgets;

pub use config::DeckConfig;
pub use context::DeckContext;
pub use error::{DeckError, PluginError, Result};
