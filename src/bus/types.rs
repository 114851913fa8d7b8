//! Topics and typed payloads carried by the event bus.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::commands::CommandSource;
use crate::widgets::WidgetDescriptor;

/// Named topics. The string forms are part of the host contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    RegisterWidget,
    AddCommand,
    SetTheme,
    Activity,
    Toast,
}

impl Topic {
    /// Every topic, in declaration order.
    pub const ALL: [Topic; 5] = [
        Topic::RegisterWidget,
        Topic::AddCommand,
        Topic::SetTheme,
        Topic::Activity,
        Topic::Toast,
    ];

    /// Wire name of the topic.
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::RegisterWidget => "plugin:register-widget",
            Topic::AddCommand => "plugin:add-command",
            Topic::SetTheme => "plugin:set-theme",
            Topic::Activity => "activity",
            Topic::Toast => "toast",
        }
    }

    /// Look up a topic by wire name.
    pub fn from_name(name: &str) -> Option<Topic> {
        Topic::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event on the bus. The variant determines the topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "topic", content = "payload")]
pub enum Event {
    #[serde(rename = "plugin:register-widget")]
    RegisterWidget(WidgetEvent),
    #[serde(rename = "plugin:add-command")]
    AddCommand(CommandEvent),
    #[serde(rename = "plugin:set-theme")]
    SetTheme(ThemeChange),
    #[serde(rename = "activity")]
    Activity(ActivityEvent),
    #[serde(rename = "toast")]
    Toast(Toast),
}

impl Event {
    /// The topic this event is published on.
    pub fn topic(&self) -> Topic {
        match self {
            Event::RegisterWidget(_) => Topic::RegisterWidget,
            Event::AddCommand(_) => Topic::AddCommand,
            Event::SetTheme(_) => Topic::SetTheme,
            Event::Activity(_) => Topic::Activity,
            Event::Toast(_) => Topic::Toast,
        }
    }
}

/// Payload of `plugin:register-widget`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidgetEvent {
    pub owner: String,
    pub widget: WidgetDescriptor,
}

/// Payload of `plugin:add-command`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandEvent {
    pub id: String,
    pub label: String,
    pub source: CommandSource,
}

/// Payload of `plugin:set-theme`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeChange {
    pub theme: String,
}

/// Payload of `activity`: something happened on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    /// Short machine-readable kind, e.g. `note.created`.
    pub kind: String,
    /// Who produced the activity (`host` or a plugin id).
    pub source: String,
    /// Human-readable description for the activity feed.
    pub message: String,
    /// Extra structured data.
    #[serde(default)]
    pub data: Value,
    pub at: DateTime<Utc>,
}

impl ActivityEvent {
    pub fn new(kind: &str, source: &str, message: &str) -> Self {
        Self {
            kind: kind.to_string(),
            source: source.to_string(),
            message: message.to_string(),
            data: Value::Null,
            at: Utc::now(),
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}

/// Severity of a toast notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for ToastLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ToastLevel::Info => "info",
            ToastLevel::Success => "success",
            ToastLevel::Warning => "warning",
            ToastLevel::Error => "error",
        };
        f.write_str(s)
    }
}

/// Payload of `toast`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub plugin: String,
    pub message: String,
    pub level: ToastLevel,
}

impl Toast {
    pub fn new(plugin: &str, message: &str, level: ToastLevel) -> Self {
        Self {
            plugin: plugin.to_string(),
            message: message.to_string(),
            level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_names_round_trip() {
        for topic in Topic::ALL {
            assert_eq!(Topic::from_name(topic.as_str()), Some(topic));
        }
        assert_eq!(Topic::from_name("plugin:unknown"), None);
    }

    #[test]
    fn test_event_topic() {
        let event = Event::SetTheme(ThemeChange {
            theme: "dark".into(),
        });
        assert_eq!(event.topic(), Topic::SetTheme);
        assert_eq!(event.topic().to_string(), "plugin:set-theme");
    }

    #[test]
    fn test_event_serializes_with_topic_tag() {
        let event = Event::Toast(Toast::new("notes", "Saved", ToastLevel::Success));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["topic"], "toast");
        assert_eq!(json["payload"]["level"], "success");
    }
}
