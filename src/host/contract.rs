//! Versioned host command/response envelopes.

use serde::{Deserialize, Serialize};

/// Contract version for host envelopes.
pub const EVENT_VERSION: u32 = 1;

/// Commands understood by the host bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandName {
    #[serde(rename = "host.ping")]
    HostPing,
    #[serde(rename = "plugins.discover")]
    PluginsDiscover,
    #[serde(rename = "plugins.list")]
    PluginsList,
    #[serde(rename = "plugins.start")]
    PluginsStart,
    #[serde(rename = "plugins.stop")]
    PluginsStop,
    #[serde(rename = "plugins.stats")]
    PluginsStats,
    #[serde(rename = "search")]
    Search,
}

impl CommandName {
    /// Render command name to wire format.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HostPing => "host.ping",
            Self::PluginsDiscover => "plugins.discover",
            Self::PluginsList => "plugins.list",
            Self::PluginsStart => "plugins.start",
            Self::PluginsStop => "plugins.stop",
            Self::PluginsStats => "plugins.stats",
            Self::Search => "search",
        }
    }

    /// Parse a command name from wire format.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "host.ping" => Some(Self::HostPing),
            "plugins.discover" => Some(Self::PluginsDiscover),
            "plugins.list" => Some(Self::PluginsList),
            "plugins.start" => Some(Self::PluginsStart),
            "plugins.stop" => Some(Self::PluginsStop),
            "plugins.stats" => Some(Self::PluginsStats),
            "search" => Some(Self::Search),
            _ => None,
        }
    }
}

/// A command envelope from the host.
///
/// `command` stays a raw string so an unknown command can still be answered
/// with the caller's `request_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    #[serde(default = "default_version")]
    pub v: u32,
    pub request_id: String,
    pub command: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

fn default_version() -> u32 {
    EVENT_VERSION
}

impl CommandEnvelope {
    /// Build a v1 command envelope.
    #[must_use]
    pub fn new(
        request_id: impl Into<String>,
        command: CommandName,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            v: EVENT_VERSION,
            request_id: request_id.into(),
            command: command.as_str().to_owned(),
            payload,
        }
    }

    /// The typed command, if known.
    #[must_use]
    pub fn command_name(&self) -> Option<CommandName> {
        CommandName::parse(&self.command)
    }

    /// Check the envelope version and request id.
    pub fn validate(&self) -> Result<(), String> {
        if self.v != EVENT_VERSION {
            return Err(format!(
                "unsupported contract version {}; expected {EVENT_VERSION}",
                self.v
            ));
        }
        if self.request_id.trim().is_empty() {
            return Err("request_id cannot be empty".to_owned());
        }
        Ok(())
    }
}

/// A response envelope back to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub v: u32,
    pub request_id: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseEnvelope {
    /// Build a successful response envelope.
    #[must_use]
    pub fn ok(request_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            v: EVENT_VERSION,
            request_id: request_id.into(),
            ok: true,
            payload,
            error: None,
        }
    }

    /// Build an error response envelope.
    #[must_use]
    pub fn error(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            v: EVENT_VERSION,
            request_id: request_id.into(),
            ok: false,
            payload: serde_json::Value::Null,
            error: Some(message.into()),
        }
    }
}

/// Payload of the per-plugin commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamePayload {
    pub name: String,
}
