//! Out-of-process plugins reached over JSON-RPC 2.0 on stdin/stdout.
//!
//! - [`JsonRpcComm`]: writes newline-delimited requests to a child's stdin and
//!   reads the correlated response from its stdout, with a deadline and a
//!   per-line size bound.
//! - [`StdioCapability`]: owns the child process. The process is spawned
//!   lazily on first use, greeted with `plugin.handshake`, and replaced after
//!   a transport failure, an exit, or a request that was cancelled mid-flight.
//! - [`StdioBinder`]: binds `protocol = "stdio"` descriptors.
//!
//! The child runs as `<interpreter> <entry>` (or `<entry>` alone when the
//! environment has no interpreter) inside the plugin directory, with the
//! descriptor's `[settings]` table in `DRAGNET_PLUGIN_SETTINGS` as JSON.

use super::protocol::{
    HandshakeParams, HandshakeResult, HealthResult, JsonRpcError, JsonRpcRequest,
    METHOD_HANDSHAKE, METHOD_HEALTH, METHOD_SEARCH, PluginMessage, SearchParams,
};
use super::{BindContext, CapabilityBinder, PluginCapability};
use crate::error::CapabilityError;
use crate::types::RawResult;
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;

/// Maximum bytes in a single JSON line from a plugin (1 MiB).
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Environment variable carrying the plugin's settings as JSON.
pub const ENV_SETTINGS: &str = "DRAGNET_PLUGIN_SETTINGS";

/// Environment variable carrying the plugin's registered name.
pub const ENV_NAME: &str = "DRAGNET_PLUGIN_NAME";

/// JSON-RPC 2.0 communication over a child process's stdin/stdout.
pub struct JsonRpcComm {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    plugin: String,
}

impl fmt::Debug for JsonRpcComm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonRpcComm")
            .field("plugin", &self.plugin)
            .finish()
    }
}

impl JsonRpcComm {
    /// Wraps a child's stdio handles.
    pub fn new(stdin: ChildStdin, stdout: ChildStdout, plugin: &str) -> Self {
        Self {
            stdin,
            stdout: BufReader::new(stdout),
            plugin: plugin.to_owned(),
        }
    }

    /// Takes stdin/stdout from `child`. Returns `None` if either was not piped.
    pub fn from_child(child: &mut Child, plugin: &str) -> Option<Self> {
        let stdin = child.stdin.take()?;
        let stdout = child.stdout.take()?;
        Some(Self::new(stdin, stdout, plugin))
    }

    /// Sends `request` and waits for the response with the same id.
    ///
    /// Returns `Ok(Err(_))` when the plugin answered with a JSON-RPC error;
    /// the transport is still usable in that case.
    ///
    /// # Errors
    ///
    /// - [`CapabilityError::Timeout`] if no response arrives within `deadline`.
    /// - [`CapabilityError::Process`] if the child closed its pipes.
    /// - [`CapabilityError::Protocol`] for malformed, oversized or
    ///   mismatched responses.
    pub async fn send_request(
        &mut self,
        request: &JsonRpcRequest,
        deadline: Duration,
    ) -> Result<Result<serde_json::Value, JsonRpcError>, CapabilityError> {
        let line = request.to_line()?;
        tracing::debug!(
            plugin = %self.plugin,
            method = %request.method,
            id = request.id,
            "sending JSON-RPC request"
        );
        self.write_line(&line).await?;

        timeout(deadline, self.read_response(request.id))
            .await
            .map_err(|_| CapabilityError::Timeout {
                timeout_secs: deadline.as_secs(),
            })?
    }

    async fn write_line(&mut self, line: &str) -> Result<(), CapabilityError> {
        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| map_write_error(e, &self.plugin))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| map_write_error(e, &self.plugin))
    }

    async fn read_response(
        &mut self,
        expected_id: u64,
    ) -> Result<Result<serde_json::Value, JsonRpcError>, CapabilityError> {
        loop {
            match self.read_one_message().await? {
                PluginMessage::Notification { method } => {
                    tracing::debug!(
                        plugin = %self.plugin,
                        %method,
                        "ignoring notification while waiting for response"
                    );
                }
                PluginMessage::Response { id, result } if id == expected_id => {
                    return Ok(Ok(result));
                }
                PluginMessage::Error { id, error } if id == expected_id => {
                    return Ok(Err(error));
                }
                PluginMessage::Response { id, .. } | PluginMessage::Error { id, .. } => {
                    return Err(CapabilityError::Protocol(format!(
                        "response id mismatch: expected {expected_id}, got {id}"
                    )));
                }
            }
        }
    }

    async fn read_one_message(&mut self) -> Result<PluginMessage, CapabilityError> {
        let mut line = String::new();
        let limit = u64::try_from(MAX_LINE_BYTES).unwrap_or(u64::MAX).saturating_add(1);
        let n = (&mut self.stdout)
            .take(limit)
            .read_line(&mut line)
            .await
            .map_err(|e| CapabilityError::Protocol(format!("stdout read error: {e}")))?;

        if n == 0 {
            return Err(CapabilityError::Process(
                "plugin process closed stdout".to_owned(),
            ));
        }
        if line.len() > MAX_LINE_BYTES {
            return Err(CapabilityError::Protocol(format!(
                "response line exceeds {MAX_LINE_BYTES} bytes"
            )));
        }

        PluginMessage::parse(&line)
    }
}

fn map_write_error(e: std::io::Error, plugin: &str) -> CapabilityError {
    if e.kind() == std::io::ErrorKind::BrokenPipe {
        tracing::warn!(plugin = %plugin, "stdin broken pipe, plugin process exited");
        CapabilityError::Process("plugin process exited".to_owned())
    } else {
        CapabilityError::Protocol(format!("stdin write error: {e}"))
    }
}

fn rpc_error(error: JsonRpcError) -> CapabilityError {
    CapabilityError::Protocol(format!(
        "plugin returned error {}: {}",
        error.code, error.message
    ))
}

/// A running plugin process with its transport.
struct Session {
    child: Child,
    comm: JsonRpcComm,
    next_id: u64,
    /// Set while a request is outstanding; still set if the caller was
    /// cancelled before the response was read.
    in_flight: bool,
}

impl Session {
    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    async fn request(
        &mut self,
        method: &str,
        params: Option<serde_json::Value>,
        deadline: Duration,
    ) -> Result<Result<serde_json::Value, JsonRpcError>, CapabilityError> {
        self.next_id += 1;
        let request = JsonRpcRequest::new(method, params, self.next_id);
        self.in_flight = true;
        let outcome = self.comm.send_request(&request, deadline).await?;
        self.in_flight = false;
        Ok(outcome)
    }
}

/// How to launch a plugin process.
#[derive(Debug, Clone)]
struct Launch {
    name: String,
    interpreter: Option<PathBuf>,
    entry: PathBuf,
    dir: PathBuf,
    settings_json: String,
}

/// Capability backed by a long-lived child process.
pub struct StdioCapability {
    launch: Launch,
    request_timeout: Duration,
    session: tokio::sync::Mutex<Option<Session>>,
}

impl fmt::Debug for StdioCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdioCapability")
            .field("launch", &self.launch)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl StdioCapability {
    /// Returns `true` if a child process is currently attached.
    pub async fn is_running(&self) -> bool {
        self.session.lock().await.is_some()
    }

    async fn spawn(&self) -> Result<Session, CapabilityError> {
        let launch = &self.launch;
        let mut cmd = match &launch.interpreter {
            Some(interpreter) => {
                let mut cmd = Command::new(interpreter);
                cmd.arg(&launch.entry);
                cmd
            }
            None => Command::new(launch.dir.join(&launch.entry)),
        };
        cmd.current_dir(&launch.dir)
            .env(ENV_NAME, &launch.name)
            .env(ENV_SETTINGS, &launch.settings_json)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            CapabilityError::Process(format!(
                "failed to spawn {}: {e}",
                launch.entry.display()
            ))
        })?;

        if let Some(stderr) = child.stderr.take() {
            let plugin = launch.name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(plugin = %plugin, %line, "plugin stderr");
                }
            });
        }

        let comm = JsonRpcComm::from_child(&mut child, &launch.name).ok_or_else(|| {
            CapabilityError::Process("plugin stdio was not piped".to_owned())
        })?;
        let mut session = Session {
            child,
            comm,
            next_id: 0,
            in_flight: false,
        };

        let params = serde_json::to_value(HandshakeParams {
            expected_name: launch.name.clone(),
        })?;
        let result = session
            .request(METHOD_HANDSHAKE, Some(params), self.request_timeout)
            .await?
            .map_err(rpc_error)?;
        let handshake: HandshakeResult = serde_json::from_value(result)?;
        if handshake.name != launch.name {
            return Err(CapabilityError::Protocol(format!(
                "handshake name mismatch: expected {}, got {}",
                launch.name, handshake.name
            )));
        }

        tracing::info!(
            plugin = %launch.name,
            version = %handshake.version,
            "plugin process ready"
        );
        Ok(session)
    }

    async fn call(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, CapabilityError> {
        let mut guard = self.session.lock().await;

        if let Some(session) = guard.as_mut() {
            if session.in_flight {
                tracing::warn!(
                    plugin = %self.launch.name,
                    "previous request was interrupted, restarting plugin"
                );
                *guard = None;
            } else if !session.is_alive() {
                tracing::warn!(plugin = %self.launch.name, "plugin process exited, restarting");
                *guard = None;
            }
        }

        if guard.is_none() {
            *guard = Some(self.spawn().await?);
        }
        let Some(session) = guard.as_mut() else {
            return Err(CapabilityError::Process(
                "plugin process unavailable".to_owned(),
            ));
        };

        match session.request(method, params, self.request_timeout).await {
            Ok(outcome) => outcome.map_err(rpc_error),
            Err(e) => {
                tracing::warn!(
                    plugin = %self.launch.name,
                    error = %e,
                    "plugin transport failed, dropping process"
                );
                *guard = None;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl PluginCapability for StdioCapability {
    async fn search(&self, keyword: &str) -> Result<Vec<RawResult>, CapabilityError> {
        let params = serde_json::to_value(SearchParams {
            keyword: keyword.to_owned(),
        })?;
        let result = self.call(METHOD_SEARCH, Some(params)).await?;
        serde_json::from_value(result).map_err(|e| {
            CapabilityError::Parse(format!("search result is not a list of results: {e}"))
        })
    }

    async fn health_check(&self) -> Result<bool, CapabilityError> {
        let result = self.call(METHOD_HEALTH, None).await?;
        Ok(serde_json::from_value::<HealthResult>(result).is_ok_and(|h| h.is_ok()))
    }
}

/// Binds `protocol = "stdio"` descriptors to [`StdioCapability`].
#[derive(Debug, Clone)]
pub struct StdioBinder {
    request_timeout: Duration,
}

impl StdioBinder {
    /// `request_timeout` bounds every individual JSON-RPC exchange.
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

impl CapabilityBinder for StdioBinder {
    fn protocol(&self) -> &str {
        "stdio"
    }

    fn bind(&self, ctx: &BindContext<'_>) -> Result<Arc<dyn PluginCapability>, CapabilityError> {
        let entry = PathBuf::from(ctx.descriptor.environment.entry());
        if entry.is_absolute() || entry.components().any(|c| c.as_os_str() == "..") {
            return Err(CapabilityError::Unsupported(format!(
                "entry {} must be relative to the plugin directory",
                entry.display()
            )));
        }
        if !ctx.plugin_dir.join(&entry).is_file() {
            return Err(CapabilityError::Process(format!(
                "entry file {} not found",
                entry.display()
            )));
        }
        let settings_json = serde_json::to_string(&ctx.descriptor.settings)?;

        Ok(Arc::new(StdioCapability {
            launch: Launch {
                name: ctx.descriptor.name.clone(),
                interpreter: ctx.environment.interpreter.clone(),
                entry,
                dir: ctx.plugin_dir.to_path_buf(),
                settings_json,
            },
            request_timeout: self.request_timeout,
            session: tokio::sync::Mutex::new(None),
        }))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    /// Shell server answering every request with `"ok"` and the same id.
    fn spawn_echo_plugin() -> Child {
        Command::new("sh")
            .arg("-c")
            .arg(
                r#"
while IFS= read -r line; do
    id=$(echo "$line" | sed 's/.*"id":\([0-9]*\).*/\1/')
    printf '{"jsonrpc":"2.0","method":"plugin.log","params":{}}\n'
    printf '{"jsonrpc":"2.0","result":"ok","id":%s}\n' "$id"
done
"#,
            )
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .expect("spawn echo plugin")
    }

    fn spawn_with_output(script: &str) -> Child {
        Command::new("sh")
            .arg("-c")
            .arg(script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .expect("spawn plugin")
    }

    #[tokio::test]
    async fn round_trip_skips_notifications() {
        let mut child = spawn_echo_plugin();
        let mut comm = JsonRpcComm::from_child(&mut child, "echo").expect("from_child");

        let req = JsonRpcRequest::new("test.method", None, 42);
        let outcome = comm
            .send_request(&req, Duration::from_secs(5))
            .await
            .expect("send_request");
        assert_eq!(outcome.expect("success"), serde_json::json!("ok"));
    }

    #[tokio::test]
    async fn error_response_is_returned_inside() {
        let mut child = spawn_with_output(
            r#"read -r line; printf '{"jsonrpc":"2.0","error":{"code":-1,"message":"nope"},"id":1}\n'; sleep 5"#,
        );
        let mut comm = JsonRpcComm::from_child(&mut child, "err").expect("from_child");
        let outcome = comm
            .send_request(&JsonRpcRequest::new("x", None, 1), Duration::from_secs(5))
            .await
            .expect("transport ok");
        let err = outcome.expect_err("rpc error");
        assert_eq!(err.message, "nope");
    }

    #[tokio::test]
    async fn id_mismatch_is_protocol_error() {
        let mut child = spawn_with_output(
            r#"read -r line; printf '{"jsonrpc":"2.0","result":1,"id":99}\n'; sleep 5"#,
        );
        let mut comm = JsonRpcComm::from_child(&mut child, "bad").expect("from_child");
        let err = comm
            .send_request(&JsonRpcRequest::new("x", None, 1), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("id mismatch"));
    }

    #[tokio::test]
    async fn exited_process_is_process_error() {
        let mut child = spawn_with_output("read -r line; exit 0");
        let mut comm = JsonRpcComm::from_child(&mut child, "gone").expect("from_child");
        let err = comm
            .send_request(&JsonRpcRequest::new("x", None, 1), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::Process(_)));
    }

    #[tokio::test]
    async fn silent_process_times_out() {
        let mut child = spawn_with_output("sleep 30");
        let mut comm = JsonRpcComm::from_child(&mut child, "slow").expect("from_child");
        let err = comm
            .send_request(&JsonRpcRequest::new("x", None, 1), Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::Timeout { .. }));
    }

    #[tokio::test]
    async fn oversized_line_rejected() {
        // One line of MAX_LINE_BYTES + 100 'a' characters.
        let script = format!(
            "read -r line; head -c {} /dev/zero | tr '\\0' 'a'; echo; sleep 5",
            MAX_LINE_BYTES + 100
        );
        let mut child = spawn_with_output(&script);
        let mut comm = JsonRpcComm::from_child(&mut child, "big").expect("from_child");
        let err = comm
            .send_request(&JsonRpcRequest::new("x", None, 1), Duration::from_secs(10))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }
}
