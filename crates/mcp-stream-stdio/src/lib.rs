//! NDJSON subprocess transport (spec §4.5).
//!
//! Each line on the child's stdout/stdin is exactly one encoded
//! [`mcp_stream_wire::Message`]; there is no other framing. Shutdown follows
//! a fixed five-step escalation so a misbehaving child can never wedge the
//! parent: close stdin, wait, SIGTERM, wait, SIGKILL, wait, then report the
//! child as unresponsive if it is still alive.
//!
//! State that must never be held across an `.await` (the shutdown flag,
//! metrics) uses `std::sync::Mutex`; the child handle and its stdio pipes,
//! which are only ever touched inside async code, use `tokio::sync::Mutex`.

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use mcp_stream_core::{McpError, Result};
use mcp_stream_transport_traits::{BoxFuture, ConnectMode, Connection, Transport};
use mcp_stream_wire::{decode, encode, Message};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, Mutex as AsyncMutex};

/// Spawn configuration for a subprocess transport.
#[derive(Debug, Clone)]
pub struct StdioConfig {
    /// The executable to run.
    pub command: String,
    /// Arguments passed to `command`.
    pub args: Vec<String>,
    /// Environment variables set on the child, in addition to the parent's.
    pub environment: Vec<(String, String)>,
    /// Maximum size of one NDJSON line, in bytes. A longer line is treated
    /// as a transport error rather than silently truncated.
    pub max_line_bytes: usize,
    /// How long to wait after closing stdin before escalating to SIGTERM.
    pub terminate_duration: Duration,
    /// How long to wait after SIGTERM before escalating to SIGKILL.
    pub kill_duration: Duration,
    /// How long to wait after SIGKILL before giving up and reporting the
    /// child as unresponsive.
    pub reap_duration: Duration,
}

impl Default for StdioConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            args: Vec::new(),
            environment: Vec::new(),
            max_line_bytes: 10 * 1024 * 1024,
            terminate_duration: Duration::from_secs(5),
            kill_duration: Duration::from_secs(2),
            reap_duration: Duration::from_secs(2),
        }
    }
}

impl StdioConfig {
    /// Builds a config that runs `command` with no arguments.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    /// Appends `args`.
    #[must_use]
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// Counters exposed for observability (spec's supplemented `TransportMetrics`).
#[derive(Debug, Default)]
pub struct StdioMetrics {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
}

impl StdioMetrics {
    /// Messages successfully written to the child's stdin.
    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }
    /// Messages successfully read from the child's stdout.
    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }
}

/// A [`Transport`] that spawns a subprocess per [`Transport::connect`] call.
pub struct StdioTransport {
    config: StdioConfig,
}

impl StdioTransport {
    /// Builds a transport from `config`. The child is not spawned until
    /// [`Transport::connect`] is called.
    #[must_use]
    pub fn new(config: StdioConfig) -> Self {
        Self { config }
    }
}

impl Transport for StdioTransport {
    fn connect(&self, _mode: ConnectMode) -> BoxFuture<'_, Result<Box<dyn Connection>>> {
        let config = self.config.clone();
        Box::pin(async move {
            let conn = StdioConnection::spawn(config).await?;
            Ok(Box::new(conn) as Box<dyn Connection>)
        })
    }

    fn transport_type(&self) -> &'static str {
        "stdio"
    }
}

/// A live connection to one spawned child process.
pub struct StdioConnection {
    config: StdioConfig,
    child: AsyncMutex<Option<Child>>,
    stdin: AsyncMutex<Option<ChildStdin>>,
    lines_rx: AsyncMutex<mpsc::UnboundedReceiver<Result<String>>>,
    closed: StdMutex<bool>,
    metrics: StdioMetrics,
}

impl StdioConnection {
    /// Spawns the child named by `config` and wires up line-reader and
    /// stderr-logger background tasks.
    ///
    /// # Errors
    /// Returns [`McpError::Transport`] if the executable cannot be spawned.
    pub async fn spawn(config: StdioConfig) -> Result<Self> {
        let mut command = Command::new(&config.command);
        command
            .args(&config.args)
            .envs(config.environment.iter().map(|(k, v)| (k.clone(), v.clone())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|e| McpError::transport(format!("failed to spawn {}: {e}", config.command)))?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::transport("child has no stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| McpError::transport("child has no stderr"))?;

        let max_line_bytes = config.max_line_bytes;
        let (lines_tx, lines_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            loop {
                let mut line = String::new();
                match reader.read_line(&mut line).await {
                    Ok(0) => break,
                    Ok(_) => {
                        if line.len() > max_line_bytes {
                            let _ = lines_tx.send(Err(McpError::transport(
                                "line exceeded max_line_bytes",
                            )));
                            break;
                        }
                        if lines_tx.send(Ok(line)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = lines_tx.send(Err(McpError::transport(format!("stdout read: {e}"))));
                        break;
                    }
                }
            }
        });

        // stderr is diagnostic output, not an error signal (the subprocess may
        // legitimately log there); forward each line at debug level only.
        tokio::spawn(async move {
            let mut reader = BufReader::new(stderr);
            let mut line = String::new();
            while let Ok(n) = reader.read_line(&mut line).await {
                if n == 0 {
                    break;
                }
                tracing::debug!(target: "mcp_stream_stdio::child_stderr", "{}", line.trim_end());
                line.clear();
            }
        });

        Ok(Self {
            config,
            child: AsyncMutex::new(Some(child)),
            stdin: AsyncMutex::new(stdin),
            lines_rx: AsyncMutex::new(lines_rx),
            closed: StdMutex::new(false),
            metrics: StdioMetrics::default(),
        })
    }

    /// A snapshot of this connection's message counters.
    #[must_use]
    pub fn metrics(&self) -> &StdioMetrics {
        &self.metrics
    }

    fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Runs the five-step shutdown escalation:
    /// 1. drop the stdin handle, closing the child's stdin,
    /// 2. wait `terminate_duration` for a clean exit,
    /// 3. send `SIGTERM` (Unix) or `Child::start_kill` (other platforms),
    /// 4. wait `kill_duration`,
    /// 5. send `SIGKILL` (Unix) or force-kill, wait `reap_duration`, and
    ///    return [`McpError::Transport`] if the child is still alive.
    async fn shut_down(&self) -> Result<()> {
        {
            let mut stdin_guard = self.stdin.lock().await;
            *stdin_guard = None;
        }
        tracing::info!(target: "mcp_stream_stdio::shutdown", "stdin closed");

        if self.wait_exited(self.config.terminate_duration).await? {
            return Ok(());
        }

        if let Err(error) = self.send_signal(Signal::Term).await {
            tracing::warn!(%error, target: "mcp_stream_stdio::shutdown", "SIGTERM send failed, proceeding to SIGKILL");
        } else {
            tracing::warn!(target: "mcp_stream_stdio::shutdown", "SIGTERM sent");
        }
        if self.wait_exited(self.config.kill_duration).await? {
            return Ok(());
        }

        self.send_signal(Signal::Kill).await?;
        tracing::warn!(target: "mcp_stream_stdio::shutdown", "SIGKILL sent");
        if self.wait_exited(self.config.reap_duration).await? {
            return Ok(());
        }

        Err(McpError::transport("subprocess unresponsive to SIGKILL"))
    }

    async fn wait_exited(&self, timeout: Duration) -> Result<bool> {
        let mut guard = self.child.lock().await;
        let Some(child) = guard.as_mut() else {
            return Ok(true);
        };
        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(_status)) => {
                *guard = None;
                Ok(true)
            }
            Ok(Err(e)) => Err(McpError::transport(format!("wait failed: {e}"))),
            Err(_elapsed) => Ok(false),
        }
    }

    async fn send_signal(&self, signal: Signal) -> Result<()> {
        let mut guard = self.child.lock().await;
        let Some(child) = guard.as_mut() else {
            return Ok(());
        };
        send_signal_to_child(child, signal)
    }
}

enum Signal {
    Term,
    Kill,
}

#[cfg(unix)]
fn send_signal_to_child(child: &mut Child, signal: Signal) -> Result<()> {
    let Some(pid) = child.id() else {
        return Ok(());
    };
    let raw = match signal {
        Signal::Term => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };
    // SAFETY: `pid` comes from `Child::id`, which is valid for the lifetime
    // of this `Child` handle; sending a signal to a valid pid we own is safe.
    let rc = unsafe { libc::kill(pid as libc::pid_t, raw) };
    if rc == 0 {
        Ok(())
    } else {
        let err = std::io::Error::last_os_error();
        // ESRCH means the process already exited; not an error for our purposes.
        if err.raw_os_error() == Some(libc::ESRCH) {
            Ok(())
        } else {
            Err(McpError::transport(format!("kill({pid}, {raw}) failed: {err}")))
        }
    }
}

#[cfg(not(unix))]
fn send_signal_to_child(child: &mut Child, signal: Signal) -> Result<()> {
    match signal {
        Signal::Term => {
            let _ = child.start_kill();
            Ok(())
        }
        Signal::Kill => child
            .start_kill()
            .map_err(|e| McpError::transport(format!("kill failed: {e}"))),
    }
}

impl Connection for StdioConnection {
    fn read(&mut self) -> BoxFuture<'_, Result<Option<Message>>> {
        Box::pin(async move {
            loop {
                let mut rx = self.lines_rx.lock().await;
                match rx.recv().await {
                    None => return Ok(None),
                    Some(Err(e)) => return Err(e),
                    Some(Ok(line)) => {
                        drop(rx);
                        let trimmed = line.trim_end();
                        if trimmed.is_empty() {
                            continue;
                        }
                        let message = decode(trimmed).map_err(|e| {
                            McpError::protocol(format!("malformed NDJSON line: {}", e.message))
                        })?;
                        self.metrics.messages_received.fetch_add(1, Ordering::Relaxed);
                        return Ok(Some(message));
                    }
                }
            }
        })
    }

    fn write(&mut self, message: &Message) -> BoxFuture<'_, Result<()>> {
        let line = encode(message);
        Box::pin(async move {
            let mut line = line?;
            line.push('\n');
            let mut guard = self.stdin.lock().await;
            let stdin = guard
                .as_mut()
                .ok_or_else(|| McpError::Session(mcp_stream_core::SessionError::ConnectionClosed))?;
            stdin
                .write_all(line.as_bytes())
                .await
                .map_err(|e| McpError::transport(format!("stdin write: {e}")))?;
            self.metrics.messages_sent.fetch_add(1, Ordering::Relaxed);
            Ok(())
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.is_closed() {
                return Ok(());
            }
            *self.closed.lock().unwrap_or_else(|e| e.into_inner()) = true;
            self.shut_down().await
        })
    }

    fn session_id(&self) -> Option<&str> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let config = StdioConfig::default();
        assert_eq!(config.terminate_duration, Duration::from_secs(5));
        assert_eq!(config.max_line_bytes, 10 * 1024 * 1024);
    }

    #[tokio::test]
    async fn spawn_nonexistent_executable_errors() {
        let config = StdioConfig::new("definitely-not-a-real-binary-xyz");
        let result = StdioConnection::spawn(config).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn echo_round_trip_via_cat() {
        let config = StdioConfig::new("cat");
        let mut conn = StdioConnection::spawn(config).await.unwrap();
        let msg = Message::Request(mcp_stream_wire::Request::new("ping", 1i64));
        conn.write(&msg).await.unwrap();
        let echoed = conn.read().await.unwrap().unwrap();
        assert_eq!(echoed.method(), Some("ping"));
        conn.close().await.unwrap();
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let config = StdioConfig::new("cat");
        let mut conn = StdioConnection::spawn(config).await.unwrap();
        conn.close().await.unwrap();
        conn.close().await.unwrap();
    }
}
