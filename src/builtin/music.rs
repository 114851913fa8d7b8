//! Music playback integration.
//!
//! Exposes a single "Spotify Controls" command that toggles playback. The
//! voice router expands its `spotify`/`music` keywords into the playback
//! phrases ("play music", "next track", ...).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::bus::ToastLevel;
use crate::commands::Command;
use crate::plugins::{Permission, Plugin, PluginApi, PluginManifest, PluginType};

pub fn manifest() -> PluginManifest {
    let mut manifest = PluginManifest::new("music", "Music", PluginType::Integration)
        .with_permissions(&[Permission::Commands, Permission::Notifications]);
    manifest.author = "WidgetDeck".into();
    manifest.description = Some("Control music playback from the palette or by voice".into());
    manifest
}

#[derive(Default)]
pub struct MusicPlugin {
    playing: Arc<AtomicBool>,
    api: Option<PluginApi>,
}

impl MusicPlugin {
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Plugin for MusicPlugin {
    async fn init(&mut self, api: PluginApi) -> anyhow::Result<()> {
        let handle = api.clone();
        let playing = Arc::clone(&self.playing);
        api.add_command(
            Command::new("music.controls", "Spotify Controls", move || {
                let now_playing = !playing.fetch_xor(true, Ordering::SeqCst);
                let message = if now_playing { "Playing" } else { "Paused" };
                handle.show_toast(message, ToastLevel::Info)?;
                Ok(())
            })
            .with_keywords(&["spotify", "music"]),
        )?;
        self.api = Some(api);
        Ok(())
    }

    fn cleanup(&mut self) -> anyhow::Result<()> {
        self.playing.store(false, Ordering::SeqCst);
        self.api = None;
        Ok(())
    }

    fn disable(&mut self) -> anyhow::Result<()> {
        if self.playing.swap(false, Ordering::SeqCst) {
            if let Some(api) = &self.api {
                api.show_toast("Paused", ToastLevel::Info)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::testing::deck;
    use crate::bus::{Event, Topic};
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_controls_toggle_playback() {
        let deck = deck();
        let toasts = Arc::new(Mutex::new(Vec::new()));
        let t = Arc::clone(&toasts);
        deck.bus.subscribe(Topic::Toast, move |event| {
            if let Event::Toast(toast) = event {
                t.lock().unwrap().push(toast.message.clone());
            }
            Ok(())
        });
        deck.manager.load_manifest(manifest()).await.unwrap();

        deck.commands.execute("music.controls").unwrap();
        deck.commands.execute("music.controls").unwrap();
        deck.commands.execute("music.controls").unwrap();
        deck.manager.toggle_plugin("music").unwrap();

        assert_eq!(
            *toasts.lock().unwrap(),
            vec!["Playing", "Paused", "Playing", "Paused"]
        );
    }

    #[test]
    fn test_cleanup_stops_playback() {
        let mut plugin = MusicPlugin::default();
        plugin.playing.store(true, Ordering::SeqCst);
        plugin.cleanup().unwrap();
        assert!(!plugin.is_playing());
    }
}
