//! Stdin/stdout JSON bridge for the host command channel.
//!
//! Reads newline-delimited JSON [`CommandEnvelope`] messages, runs each one
//! through [`handle_command`], and writes one [`ResponseEnvelope`] per line.
//! Commands are handled in arrival order.
//!
//! Stdout is exclusively reserved for the JSON protocol; all diagnostic
//! output (tracing, logs) must be routed to stderr.

use crate::admin::AdminApi;
use crate::error::BridgeError;
use crate::host::contract::{CommandEnvelope, ResponseEnvelope};
use crate::host::handler::handle_command;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};

/// Runs the bridge on the process's stdin and stdout until stdin closes.
///
/// # Errors
///
/// Returns [`BridgeError`] if stdin or stdout fails.
pub async fn run_stdio_bridge(api: &AdminApi) -> Result<(), BridgeError> {
    let reader = BufReader::new(tokio::io::stdin());
    let writer = BufWriter::new(tokio::io::stdout());
    serve(api, reader, writer).await
}

/// Serves envelopes from `reader` to `writer` until EOF.
///
/// A line that is not a valid envelope is answered with a `parse-error`
/// response and the loop continues.
///
/// # Errors
///
/// Returns [`BridgeError`] on I/O failure.
pub async fn serve<R, W>(api: &AdminApi, mut reader: R, mut writer: W) -> Result<(), BridgeError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            tracing::info!("stdin closed (EOF); shutting down stdio bridge");
            return Ok(());
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<CommandEnvelope>(trimmed) {
            Ok(envelope) => handle_command(api, envelope).await,
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse command envelope");
                ResponseEnvelope::error("parse-error", format!("invalid command envelope: {e}"))
            }
        };

        let json = serde_json::to_string(&response)?;
        write_line(&mut writer, &json).await?;
    }
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, json: &str) -> std::io::Result<()> {
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::config::DragnetConfig;

    async fn run_lines(input: &str) -> Vec<ResponseEnvelope> {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = DragnetConfig {
            plugin_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let api = AdminApi::from_config(&config).expect("api");
        let mut out: Vec<u8> = Vec::new();
        serve(&api, input.as_bytes(), &mut out).await.expect("serve");
        String::from_utf8(out)
            .expect("utf8")
            .lines()
            .map(|l| serde_json::from_str(l).expect("response envelope"))
            .collect()
    }

    #[tokio::test]
    async fn answers_each_line_in_order() {
        let responses = run_lines(concat!(
            r#"{"request_id":"a","command":"host.ping"}"#,
            "\n\n",
            r#"{"request_id":"b","command":"plugins.discover"}"#,
            "\n",
        ))
        .await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].request_id, "a");
        assert!(responses[0].ok);
        assert_eq!(responses[1].request_id, "b");
        assert!(responses[1].ok);
    }

    #[tokio::test]
    async fn garbage_line_yields_parse_error_and_loop_continues() {
        let responses = run_lines(concat!(
            "not json\n",
            r#"{"request_id":"c","command":"host.ping"}"#,
            "\n",
        ))
        .await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].request_id, "parse-error");
        assert!(!responses[0].ok);
        assert!(responses[0].error.as_deref().unwrap().contains("invalid command envelope"));
        assert!(responses[1].ok);
    }

    #[tokio::test]
    async fn empty_input_produces_nothing() {
        assert!(run_lines("").await.is_empty());
    }
}
