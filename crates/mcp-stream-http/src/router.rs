//! The Streamable-HTTP server endpoint (spec §4.6): POST/GET/DELETE
//! dispatch on a single `/mcp` route, dual-mode (JSON vs SSE) responses,
//! origin enforcement, and an idle-session sweep.

use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use axum::routing::post;
use axum::Router;
use bytes::Bytes;
use dashmap::DashMap;
use mcp_stream_core::metrics::{AtomicMetrics, TransportMetrics};
use mcp_stream_core::{McpError, Result, SessionError};
use mcp_stream_streamable::{EventId, EventStore, StreamWriter, StreamWriterFactory};
use mcp_stream_wire::{decode, encode, Message, Response as RpcResponse, RpcError};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tower_http::limit::RequestBodyLimitLayer;

use crate::config::HttpServerConfig;
use crate::headers;
use crate::session::SessionRegistry;

/// Handles one decoded message for a session and returns the response to
/// send back (`None` for notifications, which are never answered).
///
/// Implemented by `mcp-stream-session`'s bidirectional engine; this crate
/// depends only on the trait so the HTTP transport carries no session-logic
/// coupling.
pub trait MessageHandler: Send + Sync {
    /// Dispatches `message`, which arrived on `session_id` (assigned by
    /// this server on the request that carried `initialize`).
    fn handle(
        &self,
        session_id: &str,
        message: Message,
    ) -> mcp_stream_streamable::BoxFuture<'_, Result<Option<Message>>>;
}

/// Shared state behind every route.
pub struct HttpServerState {
    config: HttpServerConfig,
    sessions: SessionRegistry,
    event_store: Arc<EventStore>,
    writer_factory: StreamWriterFactory,
    handler: Arc<dyn MessageHandler>,
    metrics: AtomicMetrics,
    /// `session_id -> ` whichever standalone GET stream is currently held
    /// open for that session, so a server-initiated request or
    /// notification (e.g. sampling, elicitation, a roots query) has
    /// somewhere to go. Absent unless a GET is open for that session.
    outbound: DashMap<String, OutboundStream>,
}

/// A registered GET stream: where to send a pushed message, and how to
/// tell its forwarding task to stop (used when the owning session is
/// destroyed or swept before the client disconnects on its own).
struct OutboundStream {
    sender: mpsc::UnboundedSender<Message>,
    cancel: CancellationToken,
}

impl HttpServerState {
    /// Builds server state dispatching decoded messages to `handler`.
    #[must_use]
    pub fn new(config: HttpServerConfig, handler: Arc<dyn MessageHandler>) -> Arc<Self> {
        let event_store = Arc::new(EventStore::new(&config.streamable));
        let writer_factory = StreamWriterFactory::new(event_store.clone(), config.streamable.clone());
        Arc::new(Self {
            config,
            sessions: SessionRegistry::new(),
            event_store,
            writer_factory,
            handler,
            metrics: AtomicMetrics::new(),
            outbound: DashMap::new(),
        })
    }

    /// A snapshot of this server's traffic counters and current session
    /// count (spec's supplemented `TransportMetrics`).
    #[must_use]
    pub fn metrics(&self) -> TransportMetrics {
        self.metrics.snapshot(self.sessions.len())
    }

    /// Delivers a server-initiated `message` to `session_id`'s open
    /// standalone GET stream.
    ///
    /// This is the delivery path for traffic this side originates rather
    /// than answers: a server-to-client sampling/elicitation/roots request,
    /// or any other notification not sent in direct reply to a POST.
    ///
    /// # Errors
    /// Returns [`SessionError::SessionNotFound`] if no GET stream is
    /// currently open for `session_id` — the client never opened one, or
    /// it has since disconnected.
    pub fn push(&self, session_id: &str, message: Message) -> Result<()> {
        match self.outbound.get(session_id) {
            Some(entry) => entry
                .sender
                .send(message)
                .map_err(|_| McpError::Session(SessionError::SessionNotFound)),
            None => Err(McpError::Session(SessionError::SessionNotFound)),
        }
    }

    /// Removes `session_id`'s registered GET stream, if any, cancelling its
    /// forwarding task so the held-open response actually closes instead of
    /// lingering until the client notices on its own.
    fn close_outbound(&self, session_id: &str) {
        if let Some((_, entry)) = self.outbound.remove(session_id) {
            entry.cancel.cancel();
        }
    }

    /// Removes every session idle past this server's configured timeout,
    /// closing their `EventStore` streams. Intended to be driven by a
    /// periodic `tokio::time::interval` task started alongside the server.
    pub fn sweep_idle_sessions(&self) {
        for session_id in self.sessions.sweep_idle(self.config.idle_session_timeout) {
            self.event_store.session_closed(&session_id);
            self.close_outbound(&session_id);
            tracing::info!(session_id, "idle session swept");
        }
    }
}

/// Wraps an SSE chunk stream so that, once axum drops it (the client
/// disconnected or the response future was cancelled), `cancel` is
/// signalled — stopping the forwarding task that keeps the stream's
/// writer alive and deregistering it from [`HttpServerState::outbound`].
struct GuardedSseStream<S> {
    inner: S,
    cancel: CancellationToken,
}

impl<S: Stream + Unpin> Stream for GuardedSseStream<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.inner).poll_next(cx)
    }
}

impl<S> Drop for GuardedSseStream<S> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Builds the Streamable-HTTP router, mounting `/mcp` for POST/GET/DELETE.
#[must_use]
pub fn build_router(state: Arc<HttpServerState>) -> Router {
    let max_body_bytes = state.config.max_body_bytes;
    Router::new()
        .route("/mcp", post(post_handler).get(get_handler).delete(delete_handler))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

/// Builds a response with `status`, `body`, and `header_pairs` layered on
/// top, used for every route so header handling (in particular the
/// always-present `MCP-Protocol-Version`) stays in one place.
fn respond(status: StatusCode, header_pairs: Vec<(&'static str, String)>, body: Body) -> Response {
    let mut response = Response::builder().status(status).body(body).unwrap_or_else(|_| {
        Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(Body::empty())
            .expect("empty body response is always constructible")
    });
    for (name, value) in header_pairs {
        if let Ok(value) = HeaderValue::from_str(&value) {
            response.headers_mut().insert(name, value);
        }
    }
    response
}

fn check_origin(state: &HttpServerState, headers: &HeaderMap, peer: Option<SocketAddr>) -> Result<()> {
    let origin = headers.get("origin").and_then(|v| v.to_str().ok());
    let peer_ip: Option<IpAddr> = peer.map(|a| a.ip());
    if state.config.origin_policy.check(origin, peer_ip) {
        Ok(())
    } else {
        Err(McpError::protocol("origin not allowed"))
    }
}

fn protocol_version(state: &HttpServerState, session_id: Option<&str>) -> String {
    session_id
        .and_then(|id| state.sessions.protocol_version(id))
        .unwrap_or_else(|| state.config.default_protocol_version.to_string())
}

fn error_response(state: &HttpServerState, status: StatusCode, error: RpcError) -> Response {
    let body = encode(&Message::Response(RpcResponse::error_without_id(error)))
        .unwrap_or_else(|_| "{}".to_string());
    respond(
        status,
        vec![
            (headers::MCP_PROTOCOL_VERSION, protocol_version(state, None)),
            (axum::http::header::CONTENT_TYPE.as_str(), headers::CONTENT_TYPE_JSON.to_string()),
        ],
        Body::from(body),
    )
}

async fn post_handler(
    State(state): State<Arc<HttpServerState>>,
    headers_in: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    body: Bytes,
) -> Response {
    if let Err(e) = check_origin(&state, &headers_in, connect_info.map(|c| c.0)) {
        return error_response(&state, StatusCode::FORBIDDEN, RpcError::invalid_request(e));
    }

    let content_type_ok = headers_in
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains(headers::CONTENT_TYPE_JSON));
    if !content_type_ok {
        return error_response(
            &state,
            StatusCode::BAD_REQUEST,
            RpcError::invalid_request("Content-Type must be application/json"),
        );
    }
    if headers_in.contains_key(headers::LAST_EVENT_ID) {
        return error_response(
            &state,
            StatusCode::BAD_REQUEST,
            RpcError::invalid_request("Last-Event-ID is forbidden on POST"),
        );
    }

    let text = match std::str::from_utf8(&body) {
        Ok(t) => t,
        Err(_) => {
            return error_response(&state, StatusCode::BAD_REQUEST, RpcError::parse_error("body is not UTF-8"))
        }
    };
    let message = match decode(text) {
        Ok(m) => m,
        Err(e) => return error_response(&state, StatusCode::BAD_REQUEST, e),
    };
    state.metrics.record_received(body.len());

    let existing_session = headers_in
        .get(headers::MCP_SESSION_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if message.method() == Some("initialize") && existing_session.is_some() {
        return error_response(
            &state,
            StatusCode::BAD_REQUEST,
            RpcError::invalid_request("initialize must not carry a session id"),
        );
    }
    let session_id = match resolve_session(&state, &message, existing_session) {
        Ok(id) => id,
        Err(e) => return error_response(&state, StatusCode::NOT_FOUND, RpcError::invalid_request(e)),
    };
    let _ = state.sessions.touch(&session_id);

    let response = match state.handler.handle(&session_id, message).await {
        Ok(response) => response,
        Err(e) => Some(Message::Response(RpcResponse::error_without_id(RpcError::internal_error(e)))),
    };

    build_response(&state, &session_id, response, &headers_in).await
}

fn resolve_session(state: &HttpServerState, message: &Message, existing: Option<String>) -> Result<String> {
    if message.method() == Some("initialize") {
        return Ok(state.sessions.create());
    }
    match existing {
        Some(id) if state.sessions.contains(&id) => Ok(id),
        _ => Err(McpError::Session(mcp_stream_core::SessionError::SessionNotFound)),
    }
}

async fn build_response(
    state: &HttpServerState,
    session_id: &str,
    response: Option<Message>,
    headers_in: &HeaderMap,
) -> Response {
    let pv = protocol_version(state, Some(session_id));

    let Some(message) = response else {
        // Notification: no body, 202 Accepted.
        return respond(
            StatusCode::ACCEPTED,
            vec![
                (headers::MCP_PROTOCOL_VERSION, pv),
                (headers::MCP_SESSION_ID, session_id.to_string()),
            ],
            Body::empty(),
        );
    };

    let wants_sse = headers_in
        .get(axum::http::header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains(headers::CONTENT_TYPE_SSE));

    if wants_sse {
        let sent_bytes = encode(&message).map(|b| b.len()).unwrap_or(0);
        let (tx, rx) = mpsc::unbounded_channel();
        let mut writer = state.writer_factory.simple(tx);
        if let Err(e) = writer.write(&message).await {
            return error_response(state, StatusCode::INTERNAL_SERVER_ERROR, RpcError::internal_error(e));
        }
        drop(writer);
        state.metrics.record_sent(sent_bytes);
        sse_response(rx, pv, session_id)
    } else {
        let body = match encode(&message) {
            Ok(b) => b,
            Err(e) => {
                return error_response(state, StatusCode::INTERNAL_SERVER_ERROR, RpcError::internal_error(e))
            }
        };
        state.metrics.record_sent(body.len());
        respond(
            StatusCode::OK,
            vec![
                (headers::MCP_PROTOCOL_VERSION, pv),
                (axum::http::header::CONTENT_TYPE.as_str(), headers::CONTENT_TYPE_JSON.to_string()),
                (headers::MCP_SESSION_ID, session_id.to_string()),
            ],
            Body::from(body),
        )
    }
}

fn sse_chunk_stream(rx: mpsc::UnboundedReceiver<String>) -> impl Stream<Item = Result<String, std::io::Error>> + Unpin {
    UnboundedReceiverStream::new(rx).map(|chunk| Ok::<_, std::io::Error>(chunk))
}

fn sse_response_with_body(body: Body, protocol_version: String, session_id: &str) -> Response {
    respond(
        StatusCode::OK,
        vec![
            (headers::MCP_PROTOCOL_VERSION, protocol_version),
            (axum::http::header::CONTENT_TYPE.as_str(), headers::CONTENT_TYPE_SSE.to_string()),
            (headers::MCP_SESSION_ID, session_id.to_string()),
        ],
        body,
    )
}

fn sse_response(rx: mpsc::UnboundedReceiver<String>, protocol_version: String, session_id: &str) -> Response {
    sse_response_with_body(Body::from_stream(sse_chunk_stream(rx)), protocol_version, session_id)
}

async fn get_handler(
    State(state): State<Arc<HttpServerState>>,
    headers_in: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> Response {
    if let Err(e) = check_origin(&state, &headers_in, connect_info.map(|c| c.0)) {
        return error_response(&state, StatusCode::FORBIDDEN, RpcError::invalid_request(e));
    }
    let accepts_sse = headers_in
        .get(axum::http::header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains(headers::CONTENT_TYPE_SSE));
    if !accepts_sse {
        return error_response(
            &state,
            StatusCode::METHOD_NOT_ALLOWED,
            RpcError::invalid_request("GET requires Accept: text/event-stream"),
        );
    }
    let Some(session_id) = headers_in
        .get(headers::MCP_SESSION_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
    else {
        return error_response(&state, StatusCode::BAD_REQUEST, RpcError::invalid_request("missing Mcp-Session-Id"));
    };
    if !state.sessions.contains(&session_id) {
        return error_response(&state, StatusCode::NOT_FOUND, RpcError::invalid_request("unknown session"));
    }
    let _ = state.sessions.touch(&session_id);

    let (tx, rx) = mpsc::unbounded_channel();
    let mut writer = state.writer_factory.resumable(session_id.clone(), "standalone", tx);
    if let Err(e) = writer.init().await {
        return error_response(&state, StatusCode::INTERNAL_SERVER_ERROR, RpcError::internal_error(e));
    }

    if let Some(last_event_id) = headers_in.get(headers::LAST_EVENT_ID).and_then(|v| v.to_str().ok()) {
        match EventId::parse(last_event_id) {
            Ok(event_id) => {
                if let Err(e) = writer.replay_from(event_id.index) {
                    return error_response(&state, StatusCode::GONE, RpcError::invalid_request(e));
                }
            }
            Err(e) => return error_response(&state, StatusCode::BAD_REQUEST, RpcError::invalid_request(e)),
        }
    }

    let pv = protocol_version(&state, Some(&session_id));

    // Replay is already queued on `rx` by this point; now register a push
    // channel for this session and hold `writer` open in a background task
    // that forwards whatever arrives on it, so the connection stays open
    // for server-initiated traffic (§4.6) instead of EOFing right after
    // replay. `cancel` is tripped by `GuardedSseStream::drop`, which fires
    // once the client disconnects or axum otherwise drops the response
    // body, and is what lets the forwarding task — and the writer it
    // holds — actually stop.
    let (push_tx, mut push_rx) = mpsc::unbounded_channel::<Message>();
    let cancel = CancellationToken::new();
    state.outbound.insert(
        session_id.clone(),
        OutboundStream {
            sender: push_tx.clone(),
            cancel: cancel.clone(),
        },
    );

    let forward_cancel = cancel.clone();
    let forward_state = state.clone();
    let forward_session_id = session_id.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = forward_cancel.cancelled() => break,
                received = push_rx.recv() => match received {
                    Some(message) => {
                        if writer.write(&message).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
        forward_state
            .outbound
            .remove_if(&forward_session_id, |_, current| current.sender.same_channel(&push_tx));
    });

    let guarded = GuardedSseStream {
        inner: sse_chunk_stream(rx),
        cancel,
    };
    sse_response_with_body(Body::from_stream(guarded), pv, &session_id)
}

async fn delete_handler(
    State(state): State<Arc<HttpServerState>>,
    headers_in: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> Response {
    if let Err(e) = check_origin(&state, &headers_in, connect_info.map(|c| c.0)) {
        return error_response(&state, StatusCode::FORBIDDEN, RpcError::invalid_request(e));
    }
    let Some(session_id) = headers_in
        .get(headers::MCP_SESSION_ID)
        .and_then(|v| v.to_str().ok())
    else {
        return error_response(&state, StatusCode::BAD_REQUEST, RpcError::invalid_request("missing Mcp-Session-Id"));
    };
    if !state.sessions.contains(session_id) {
        return error_response(&state, StatusCode::NOT_FOUND, RpcError::invalid_request("unknown session"));
    }
    state.sessions.destroy(session_id);
    state.event_store.session_closed(session_id);
    state.close_outbound(session_id);
    respond(StatusCode::OK, vec![], Body::empty())
}

/// Runs [`HttpServerState::sweep_idle_sessions`] on `state.config.idle_sweep_interval`
/// until the returned handle is dropped or aborted.
pub fn spawn_idle_sweeper(state: Arc<HttpServerState>) -> tokio::task::JoinHandle<()> {
    let interval = state.config.idle_sweep_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            state.sweep_idle_sessions();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::Request;
    use mcp_stream_streamable::BoxFuture;
    use mcp_stream_wire::Request as RpcRequest;
    use tower::ServiceExt;

    struct EchoHandler;
    impl MessageHandler for EchoHandler {
        fn handle(&self, _session_id: &str, message: Message) -> BoxFuture<'_, Result<Option<Message>>> {
            Box::pin(async move {
                match message {
                    Message::Request(r) => Ok(Some(Message::Response(RpcResponse::success(
                        serde_json::json!({"echo": r.method}),
                        r.id,
                    )))),
                    Message::Notification(_) | Message::Response(_) => Ok(None),
                }
            })
        }
    }

    fn test_state() -> Arc<HttpServerState> {
        let mut config = HttpServerConfig::default();
        config.origin_policy = crate::origin::OriginPolicy::allow_any();
        HttpServerState::new(config, Arc::new(EchoHandler))
    }

    #[tokio::test]
    async fn initialize_request_creates_a_session() {
        let app = build_router(test_state());
        let body = encode(&Message::Request(RpcRequest::new("initialize", 1i64))).unwrap();
        let request = Request::post("/mcp")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(headers::MCP_SESSION_ID).is_some());
        assert!(response.headers().get(headers::MCP_PROTOCOL_VERSION).is_some());
    }

    #[tokio::test]
    async fn request_without_known_session_is_rejected() {
        let app = build_router(test_state());
        let body = encode(&Message::Request(RpcRequest::new("tools/list", 1i64))).unwrap();
        let request = Request::post("/mcp")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn notification_gets_no_body_and_202() {
        let state = test_state();
        let session_id = state.sessions.create();
        let app = build_router(state);
        let body = encode(&Message::Notification(mcp_stream_wire::Notification::new(
            "notifications/cancelled",
        )))
        .unwrap();
        let request = Request::post("/mcp")
            .header("content-type", "application/json")
            .header(headers::MCP_SESSION_ID, session_id)
            .body(Body::from(body))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn metrics_track_requests_and_active_sessions() {
        let state = test_state();
        assert_eq!(state.metrics().active_sessions, 0);

        let body = encode(&Message::Request(RpcRequest::new("initialize", 1i64))).unwrap();
        let request = Request::post("/mcp")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        let app = build_router(state.clone());
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let snapshot = state.metrics();
        assert_eq!(snapshot.active_sessions, 1);
        assert_eq!(snapshot.messages_received, 1);
        assert_eq!(snapshot.messages_sent, 1);
        assert!(snapshot.bytes_sent > 0);
        assert!(snapshot.bytes_received > 0);
    }

    #[tokio::test]
    async fn delete_without_session_header_is_bad_request() {
        let app = build_router(test_state());
        let request = Request::delete("/mcp").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_stream_stays_open_and_forwards_pushed_messages() {
        let state = test_state();
        let session_id = state.sessions.create();
        let app = build_router(state.clone());

        let request = Request::get("/mcp")
            .header(axum::http::header::ACCEPT, headers::CONTENT_TYPE_SSE)
            .header(headers::MCP_SESSION_ID, session_id.clone())
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let mut stream = response.into_body().into_data_stream();
        let prime = tokio::time::timeout(std::time::Duration::from_secs(1), stream.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(std::str::from_utf8(&prime).unwrap().contains("event: prime"));

        state
            .push(
                &session_id,
                Message::Notification(mcp_stream_wire::Notification::new("notifications/progress")),
            )
            .unwrap();

        let pushed = tokio::time::timeout(std::time::Duration::from_secs(1), stream.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(std::str::from_utf8(&pushed).unwrap().contains("notifications/progress"));
    }

    #[tokio::test]
    async fn push_with_no_open_get_stream_errors() {
        let state = test_state();
        let session_id = state.sessions.create();
        let err = state
            .push(&session_id, Message::Notification(mcp_stream_wire::Notification::new("ping")))
            .unwrap_err();
        assert!(matches!(err, McpError::Session(SessionError::SessionNotFound)));
    }

    #[tokio::test]
    async fn delete_closes_a_held_open_get_stream() {
        let state = test_state();
        let session_id = state.sessions.create();
        let app = build_router(state.clone());

        let request = Request::get("/mcp")
            .header(axum::http::header::ACCEPT, headers::CONTENT_TYPE_SSE)
            .header(headers::MCP_SESSION_ID, session_id.clone())
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let mut stream = response.into_body().into_data_stream();
        tokio::time::timeout(std::time::Duration::from_secs(1), stream.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        let delete_request = Request::delete("/mcp")
            .header(headers::MCP_SESSION_ID, session_id.clone())
            .body(Body::empty())
            .unwrap();
        let delete_response = app.oneshot(delete_request).await.unwrap();
        assert_eq!(delete_response.status(), StatusCode::OK);

        let ended = tokio::time::timeout(std::time::Duration::from_secs(1), stream.next())
            .await
            .unwrap();
        assert!(ended.is_none());
    }
}
