//! The Streamable-HTTP client transport (spec §4.7).
//!
//! One POST per outgoing message; the response is decoded in whichever
//! mode the server chose (a single JSON body, or a short SSE stream whose
//! events are themselves JSON-RPC envelopes). Once a session id has been
//! learned, a standalone `GET` is kept open in the background for
//! server-initiated traffic, reconnecting with jittered exponential
//! backoff and `Last-Event-ID` resumption on drop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use mcp_stream_core::{McpError, Result, SessionError};
use mcp_stream_streamable::{SseDecoder, SseEvent};
use mcp_stream_transport_traits::{BoxFuture, ConnectMode, Connection, Transport};
use mcp_stream_wire::Message;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

use crate::config::StreamableHttpClientConfig;
use crate::headers;

/// Connects to a Streamable-HTTP server, handing back a fresh
/// [`StreamableHttpConnection`] per call.
pub struct StreamableHttpTransport {
    config: StreamableHttpClientConfig,
    client: reqwest::Client,
}

impl StreamableHttpTransport {
    /// Builds a transport from `config`.
    ///
    /// # Errors
    /// [`McpError::Transport`] if the underlying `reqwest::Client` could
    /// not be constructed (e.g. the platform's TLS backend failed to
    /// initialize).
    pub fn new(config: StreamableHttpClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(McpError::transport)?;
        Ok(Self { config, client })
    }
}

impl Transport for StreamableHttpTransport {
    fn connect(&self, mode: ConnectMode) -> BoxFuture<'_, Result<Box<dyn Connection>>> {
        let client = self.client.clone();
        let config = self.config.clone();
        Box::pin(async move {
            let initial_session_id = match mode {
                ConnectMode::Resume => config.resume_session_id.clone(),
                ConnectMode::New => None,
            };
            let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
            let connection = StreamableHttpConnection {
                client,
                base_url: config.base_url.clone(),
                config,
                session_id_shared: Arc::new(SyncMutex::new(initial_session_id.clone())),
                last_event_id_shared: Arc::new(SyncMutex::new(None)),
                cached_session_id: initial_session_id,
                incoming_tx,
                incoming_rx,
                sse_task: SyncMutex::new(None),
                closed_shared: Arc::new(AtomicBool::new(false)),
                closed: false,
            };
            Ok(Box::new(connection) as Box<dyn Connection>)
        })
    }

    fn transport_type(&self) -> &'static str {
        "streamable-http"
    }
}

/// One client-side connection to a Streamable-HTTP server.
pub struct StreamableHttpConnection {
    client: reqwest::Client,
    base_url: Url,
    config: StreamableHttpClientConfig,
    session_id_shared: Arc<SyncMutex<Option<String>>>,
    last_event_id_shared: Arc<SyncMutex<Option<String>>>,
    cached_session_id: Option<String>,
    incoming_tx: mpsc::UnboundedSender<Message>,
    incoming_rx: mpsc::UnboundedReceiver<Message>,
    sse_task: SyncMutex<Option<JoinHandle<()>>>,
    closed_shared: Arc<AtomicBool>,
    closed: bool,
}

impl StreamableHttpConnection {
    async fn send_and_decode(&mut self, message: Message) -> Result<()> {
        let mut request = self
            .client
            .post(self.base_url.clone())
            .header(reqwest::header::ACCEPT, headers::ACCEPT_DUAL_MODE)
            .header(reqwest::header::CONTENT_TYPE, headers::CONTENT_TYPE_JSON)
            .header(headers::MCP_PROTOCOL_VERSION, self.config.protocol_version);
        if let Some(session_id) = self.session_id_shared.lock().clone() {
            request = request.header(headers::MCP_SESSION_ID, session_id);
        }
        for (name, value) in &self.config.extra_headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let body = mcp_stream_wire::encode(&message)?;
        let response = request.body(body).send().await.map_err(McpError::transport)?;

        if let Some(session_id) = response
            .headers()
            .get(headers::MCP_SESSION_ID)
            .and_then(|v| v.to_str().ok())
        {
            self.learn_session_id(session_id)?;
        }

        if !response.status().is_success() {
            let status = response.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                self.closed = true;
                return Err(McpError::Session(SessionError::SessionNotFound));
            }
            return Err(McpError::transport(format!("POST rejected with status {status}")));
        }
        if response.status() == reqwest::StatusCode::ACCEPTED {
            self.maybe_start_sse_reader();
            return Ok(());
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if content_type.contains(headers::CONTENT_TYPE_SSE) {
            self.drain_sse_body(response).await?;
        } else {
            let text = response.text().await.map_err(McpError::transport)?;
            match mcp_stream_wire::decode(&text) {
                Ok(decoded) => {
                    let _ = self.incoming_tx.send(decoded);
                }
                Err(error) => return Err(McpError::protocol(error.message)),
            }
        }

        self.maybe_start_sse_reader();
        Ok(())
    }

    fn learn_session_id(&mut self, new_id: &str) -> Result<()> {
        let mut guard = self.session_id_shared.lock();
        if let Some(existing) = guard.as_deref() {
            if existing != new_id {
                drop(guard);
                self.closed = true;
                return Err(McpError::Session(SessionError::SessionIdMismatch));
            }
            return Ok(());
        }
        *guard = Some(new_id.to_string());
        drop(guard);
        self.cached_session_id = Some(new_id.to_string());
        Ok(())
    }

    async fn drain_sse_body(&mut self, response: reqwest::Response) -> Result<()> {
        let mut decoder = SseDecoder::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(McpError::transport)?;
            for event in decoder.feed(&chunk) {
                self.handle_event(event);
            }
        }
        Ok(())
    }

    fn handle_event(&mut self, event: SseEvent) {
        if let Some(id) = &event.id {
            *self.last_event_id_shared.lock() = Some(id.clone());
        }
        if event.data.trim().is_empty() {
            return;
        }
        match mcp_stream_wire::decode(&event.data) {
            Ok(message) => {
                let _ = self.incoming_tx.send(message);
            }
            Err(error) => tracing::warn!(error = %error.message, "dropping malformed SSE event"),
        }
    }

    fn maybe_start_sse_reader(&mut self) {
        if self.sse_task.lock().is_some() {
            return;
        }
        let Some(_) = self.cached_session_id.clone() else {
            return;
        };
        let client = self.client.clone();
        let base_url = self.base_url.clone();
        let config = self.config.clone();
        let session_id_shared = self.session_id_shared.clone();
        let last_event_id_shared = self.last_event_id_shared.clone();
        let incoming_tx = self.incoming_tx.clone();
        let closed_shared = self.closed_shared.clone();
        let handle = tokio::spawn(run_standalone_sse(
            client,
            base_url,
            config,
            session_id_shared,
            last_event_id_shared,
            incoming_tx,
            closed_shared,
        ));
        *self.sse_task.lock() = Some(handle);
    }
}

/// The delay to sleep before the next standalone-SSE reconnect attempt.
///
/// A server-provided `retry:` value from the last event seen takes the
/// computed backoff's place for exactly this one reconnect; the attempt
/// ceiling still applies regardless of which delay wins, so a server that
/// keeps sending `retry:` cannot make reconnection run forever past
/// `max_attempts`.
fn next_reconnect_delay(
    reconnect: &crate::config::ReconnectConfig,
    attempt: u32,
    server_override: Option<Duration>,
) -> Option<Duration> {
    let computed = reconnect.delay_for(attempt)?;
    Some(server_override.unwrap_or(computed))
}

async fn run_standalone_sse(
    client: reqwest::Client,
    base_url: Url,
    config: StreamableHttpClientConfig,
    session_id_shared: Arc<SyncMutex<Option<String>>>,
    last_event_id_shared: Arc<SyncMutex<Option<String>>>,
    incoming_tx: mpsc::UnboundedSender<Message>,
    closed: Arc<AtomicBool>,
) {
    let mut attempt = 0u32;
    let mut next_delay_override: Option<Duration> = None;
    loop {
        if closed.load(Ordering::SeqCst) {
            return;
        }
        let Some(session_id) = session_id_shared.lock().clone() else {
            return;
        };

        let mut request = client
            .get(base_url.clone())
            .header(reqwest::header::ACCEPT, headers::CONTENT_TYPE_SSE)
            .header(headers::MCP_SESSION_ID, session_id)
            .header(headers::MCP_PROTOCOL_VERSION, config.protocol_version);
        if let Some(last_id) = last_event_id_shared.lock().clone() {
            request = request.header(headers::LAST_EVENT_ID, last_id);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!("standalone SSE stream established");
                attempt = 0;
                let mut decoder = SseDecoder::new();
                let mut stream = response.bytes_stream();
                loop {
                    if closed.load(Ordering::SeqCst) {
                        return;
                    }
                    match stream.next().await {
                        Some(Ok(chunk)) => {
                            for event in decoder.feed(&chunk) {
                                if let Some(id) = &event.id {
                                    *last_event_id_shared.lock() = Some(id.clone());
                                }
                                if let Some(retry_ms) = event.retry {
                                    next_delay_override = Some(Duration::from_millis(u64::from(retry_ms)));
                                }
                                if event.data.trim().is_empty() {
                                    continue;
                                }
                                match mcp_stream_wire::decode(&event.data) {
                                    Ok(message) => {
                                        if incoming_tx.send(message).is_err() {
                                            return;
                                        }
                                    }
                                    Err(error) => {
                                        tracing::warn!(error = %error.message, "dropping malformed SSE event");
                                    }
                                }
                            }
                        }
                        Some(Err(error)) => {
                            tracing::warn!(%error, "standalone SSE stream read failed");
                            break;
                        }
                        None => {
                            tracing::debug!("standalone SSE stream ended");
                            break;
                        }
                    }
                }
            }
            Ok(response) => {
                tracing::warn!(status = %response.status(), "standalone SSE connect rejected");
            }
            Err(error) => {
                tracing::warn!(%error, "standalone SSE connect failed");
            }
        }

        let Some(delay) = next_reconnect_delay(&config.reconnect, attempt, next_delay_override.take()) else {
            tracing::warn!("standalone SSE reconnect attempts exhausted, giving up");
            return;
        };
        attempt += 1;
        tokio::time::sleep(delay).await;
    }
}

impl Connection for StreamableHttpConnection {
    fn read(&mut self) -> BoxFuture<'_, Result<Option<Message>>> {
        Box::pin(async move {
            if self.closed {
                return Ok(None);
            }
            Ok(self.incoming_rx.recv().await)
        })
    }

    fn write(&mut self, message: &Message) -> BoxFuture<'_, Result<()>> {
        let message = message.clone();
        Box::pin(async move {
            if self.closed {
                return Err(McpError::Session(SessionError::ConnectionClosed));
            }
            self.send_and_decode(message).await
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.closed = true;
            self.closed_shared.store(true, Ordering::SeqCst);
            if let Some(handle) = self.sse_task.lock().take() {
                handle.abort();
            }
            if let Some(session_id) = self.session_id_shared.lock().clone() {
                let _ = self
                    .client
                    .delete(self.base_url.clone())
                    .header(headers::MCP_SESSION_ID, session_id)
                    .send()
                    .await;
            }
            Ok(())
        })
    }

    fn session_id(&self) -> Option<&str> {
        self.cached_session_id.as_deref()
    }
}
