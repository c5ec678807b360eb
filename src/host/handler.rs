//! Routes host command envelopes to the [`AdminApi`].

use crate::admin::AdminApi;
use crate::host::contract::{CommandEnvelope, CommandName, NamePayload, ResponseEnvelope};
use crate::types::SearchRequest;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;

/// Executes one command and builds its response.
///
/// Never fails: every problem is reported as an error envelope carrying the
/// caller's `request_id`.
pub async fn handle_command(api: &AdminApi, envelope: CommandEnvelope) -> ResponseEnvelope {
    let request_id = envelope.request_id.clone();
    if let Err(reason) = envelope.validate() {
        return ResponseEnvelope::error(request_id, reason);
    }
    let Some(command) = envelope.command_name() else {
        return ResponseEnvelope::error(
            request_id,
            format!("unknown command {:?}", envelope.command),
        );
    };

    tracing::debug!(request_id = %request_id, command = command.as_str(), "host command");
    match run(api, command, envelope.payload).await {
        Ok(payload) => ResponseEnvelope::ok(request_id, payload),
        Err(message) => {
            tracing::warn!(
                request_id = %request_id,
                command = command.as_str(),
                error = %message,
                "host command failed"
            );
            ResponseEnvelope::error(request_id, message)
        }
    }
}

async fn run(
    api: &AdminApi,
    command: CommandName,
    payload: serde_json::Value,
) -> Result<serde_json::Value, String> {
    match command {
        CommandName::HostPing => Ok(json!({
            "pong": true,
            "version": env!("CARGO_PKG_VERSION"),
        })),
        CommandName::PluginsDiscover => {
            to_payload(&api.discover().await.map_err(|e| e.to_string())?)
        }
        CommandName::PluginsList => {
            let plugins = api.list_active_plugins().map_err(|e| e.to_string())?;
            Ok(json!({ "plugins": to_payload(&plugins)? }))
        }
        CommandName::PluginsStart => {
            let NamePayload { name } = from_payload(payload)?;
            to_payload(&api.start_plugin(&name).await)
        }
        CommandName::PluginsStop => {
            let NamePayload { name } = from_payload(payload)?;
            to_payload(&api.stop_plugin(&name))
        }
        CommandName::PluginsStats => {
            let NamePayload { name } = from_payload(payload)?;
            to_payload(&api.get_plugin_stats(&name).map_err(|e| e.to_string())?)
        }
        CommandName::Search => {
            let request: SearchRequest = from_payload(payload)?;
            to_payload(&api.search(&request).await.map_err(|e| e.to_string())?)
        }
    }
}

fn from_payload<T: DeserializeOwned>(payload: serde_json::Value) -> Result<T, String> {
    serde_json::from_value(payload).map_err(|e| format!("invalid payload: {e}"))
}

fn to_payload<T: Serialize>(value: &T) -> Result<serde_json::Value, String> {
    serde_json::to_value(value).map_err(|e| format!("failed to encode payload: {e}"))
}
