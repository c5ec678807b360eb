//! JSON-RPC 2.0 message types for `stdio` plugins.
//!
//! The host writes one request per line to the plugin's stdin and reads one
//! message per line from its stdout.
//!
//! # Handshake
//!
//! Sent once after spawning:
//!
//! ```json
//! {"jsonrpc":"2.0","method":"plugin.handshake","params":{"expected_name":"feed_5"},"id":1}
//! ```
//!
//! The plugin answers with its identity:
//!
//! ```json
//! {"jsonrpc":"2.0","result":{"name":"feed_5","version":"1.0.0"},"id":1}
//! ```
//!
//! # Search
//!
//! ```json
//! {"jsonrpc":"2.0","method":"plugin.search","params":{"keyword":"rust"},"id":2}
//! {"jsonrpc":"2.0","result":[{"platform":"feed_5","content":"...","url":"...","metadata":{}}],"id":2}
//! ```
//!
//! # Health
//!
//! ```json
//! {"jsonrpc":"2.0","method":"plugin.health","id":3}
//! {"jsonrpc":"2.0","result":{"status":"ok"},"id":3}
//! ```
//!
//! Lines without an `id` are notifications; the host logs and skips them.

use crate::error::CapabilityError;
use serde::{Deserialize, Serialize};

/// The JSON-RPC version string.
const JSONRPC_VERSION: &str = "2.0";

/// Method name for the handshake request.
pub const METHOD_HANDSHAKE: &str = "plugin.handshake";

/// Method name for the search request.
pub const METHOD_SEARCH: &str = "plugin.search";

/// Method name for the health-check request.
pub const METHOD_HEALTH: &str = "plugin.health";

/// A JSON-RPC 2.0 request sent to a plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version, always `"2.0"`.
    pub jsonrpc: String,
    /// Method name.
    pub method: String,
    /// Optional parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    /// Correlation id.
    pub id: u64,
}

impl JsonRpcRequest {
    /// Creates a request.
    pub fn new(method: &str, params: Option<serde_json::Value>, id: u64) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            method: method.to_owned(),
            params,
            id,
        }
    }

    /// Serializes to one JSON line with a trailing newline.
    pub fn to_line(&self) -> Result<String, CapabilityError> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Optional extra data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// A message read from a plugin's stdout.
#[derive(Debug, Clone)]
pub enum PluginMessage {
    /// Successful response.
    Response {
        /// Correlation id.
        id: u64,
        /// Result payload.
        result: serde_json::Value,
    },
    /// Error response.
    Error {
        /// Correlation id.
        id: u64,
        /// Error object.
        error: JsonRpcError,
    },
    /// Notification (no id).
    Notification {
        /// Notification method.
        method: String,
    },
}

impl PluginMessage {
    /// Parses one line.
    ///
    /// The variant is chosen by field presence: `id` + `result`, `id` +
    /// `error`, or no `id`.
    pub fn parse(line: &str) -> Result<Self, CapabilityError> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Err(CapabilityError::Protocol("empty message line".to_owned()));
        }

        let mut value: serde_json::Value = serde_json::from_str(trimmed)?;

        let version = value.get("jsonrpc").and_then(|v| v.as_str());
        if version != Some(JSONRPC_VERSION) {
            return Err(CapabilityError::Protocol(format!(
                "expected jsonrpc version \"{JSONRPC_VERSION}\", got {version:?}"
            )));
        }

        let Some(obj) = value.as_object_mut() else {
            return Err(CapabilityError::Protocol("message is not an object".to_owned()));
        };

        let id = match obj.get("id") {
            None | Some(serde_json::Value::Null) => None,
            Some(v) => Some(v.as_u64().ok_or_else(|| {
                CapabilityError::Protocol(format!("id must be an unsigned integer, got {v}"))
            })?),
        };

        match (id, obj.remove("result"), obj.remove("error")) {
            (Some(id), Some(result), _) => Ok(Self::Response { id, result }),
            (Some(id), None, Some(error)) => Ok(Self::Error {
                id,
                error: serde_json::from_value(error)?,
            }),
            (Some(_), None, None) => Err(CapabilityError::Protocol(
                "message has id but neither result nor error field".to_owned(),
            )),
            (None, _, _) => Ok(Self::Notification {
                method: obj
                    .get("method")
                    .and_then(|m| m.as_str())
                    .unwrap_or_default()
                    .to_owned(),
            }),
        }
    }
}

/// Params of `plugin.handshake`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HandshakeParams {
    /// The name the host expects the plugin to identify as.
    pub expected_name: String,
}

/// Result of `plugin.handshake`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HandshakeResult {
    /// Name reported by the plugin.
    pub name: String,
    /// Version reported by the plugin.
    pub version: String,
}

/// Params of `plugin.search`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchParams {
    /// Keyword to search for.
    pub keyword: String,
}

/// Result of `plugin.health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResult {
    /// `"ok"` when healthy.
    pub status: String,
}

impl HealthResult {
    /// Returns `true` if the status is `"ok"`.
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}
