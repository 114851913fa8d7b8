//! Focus timer widget.
//!
//! The "Timer" command starts and stops a session. While a session runs,
//! every activity event on the bus is counted as an interruption; the total
//! focused time is kept in storage.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::debug;

use crate::bus::ToastLevel;
use crate::commands::Command;
use crate::plugins::{Permission, Plugin, PluginApi, PluginManifest, PluginType};
use crate::utils::lock;
use crate::widgets::WidgetDescriptor;

const TOTAL_KEY: &str = "totalSeconds";

pub fn manifest() -> PluginManifest {
    let mut manifest = PluginManifest::new("timer", "Focus Timer", PluginType::Widget)
        .with_permissions(&[
            Permission::Widgets,
            Permission::Commands,
            Permission::Activity,
            Permission::Storage,
            Permission::Notifications,
        ]);
    manifest.author = "WidgetDeck".into();
    manifest.slot = Some("header".into());
    manifest
}

#[derive(Debug, Default)]
struct Session {
    started: Option<DateTime<Utc>>,
    interruptions: u32,
}

#[derive(Default)]
pub struct TimerPlugin {
    session: Arc<Mutex<Session>>,
    api: Option<PluginApi>,
}

/// Start a session, or stop the running one and add its length to the total.
fn toggle(api: &PluginApi, session: &Mutex<Session>) -> anyhow::Result<()> {
    let finished = {
        let mut s = lock(session);
        match s.started.take() {
            None => {
                s.started = Some(Utc::now());
                s.interruptions = 0;
                None
            }
            Some(started) => Some(((Utc::now() - started).num_seconds().max(0), s.interruptions)),
        }
    };

    match finished {
        None => api.show_toast("Timer started", ToastLevel::Info)?,
        Some((seconds, interruptions)) => {
            let total = api
                .read_storage(TOTAL_KEY)?
                .and_then(|v| v.as_i64())
                .unwrap_or(0)
                + seconds;
            api.write_storage(TOTAL_KEY, json!(total))?;
            api.show_toast(
                &format!(
                    "Focused for {}s with {} interruption(s)",
                    seconds, interruptions
                ),
                ToastLevel::Success,
            )?;
        }
    }
    Ok(())
}

impl TimerPlugin {
    pub fn is_running(&self) -> bool {
        lock(&self.session).started.is_some()
    }

    pub fn interruptions(&self) -> u32 {
        lock(&self.session).interruptions
    }
}

#[async_trait]
impl Plugin for TimerPlugin {
    async fn init(&mut self, api: PluginApi) -> anyhow::Result<()> {
        api.register_widget(WidgetDescriptor::new("timer", "Focus Timer", "TimerWidget"))?;

        let session = Arc::clone(&self.session);
        api.listen_to_activity(move |activity| {
            let mut s = lock(&session);
            if s.started.is_some() {
                s.interruptions += 1;
                debug!(kind = %activity.kind, "Timer session interrupted");
            }
            Ok(())
        })?;

        let handle = api.clone();
        let session = Arc::clone(&self.session);
        api.add_command(
            Command::new("timer.toggle", "Timer", move || toggle(&handle, &session))
                .with_keywords(&["pomodoro"]),
        )?;

        self.api = Some(api);
        Ok(())
    }

    fn cleanup(&mut self) -> anyhow::Result<()> {
        *lock(&self.session) = Session::default();
        self.api = None;
        Ok(())
    }

    fn disable(&mut self) -> anyhow::Result<()> {
        // A hidden timer cannot be stopped, so drop the running session.
        lock(&self.session).started = None;
        Ok(())
    }
}
