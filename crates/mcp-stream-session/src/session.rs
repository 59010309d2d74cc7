//! The bidirectional session engine itself (spec §4.8, §4.9, §5).
//!
//! One [`Session`] wraps exactly one [`Connection`] and owns it exclusively
//! (spec §3 Ownership): a dedicated I/O task reads incoming messages and
//! drains an outgoing queue that every other method funnels into, so reads
//! and writes never race each other for the connection. `Session` itself is
//! a cheap `Arc` handle — cloning it gives another caller (e.g. a spawned
//! request handler, the keepalive task) a reference to the same tables and
//! outgoing queue, not a second connection.

use std::sync::Arc;
use std::time::Duration;

use mcp_stream_core::{is_supported_protocol_version, McpError, Result, SessionError};
use mcp_stream_transport_traits::Connection;
use mcp_stream_wire::{Message, Notification, Request, RequestId, Response};
use parking_lot::Mutex as SyncMutex;
use serde_json::Value;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::SessionConfig;
use crate::handler::RequestHandler;
use crate::handshake::{
    CancelledParams, ClientInfo, InitializeParams, InitializeResult, METHOD_CANCELLED,
    METHOD_INITIALIZE, METHOD_INITIALIZED, METHOD_PING,
};
use crate::ids::RequestIdAllocator;
use crate::incoming::IncomingTable;
use crate::notifications::{NotificationHandler, NotificationRouter};
use crate::pending::PendingTable;
use crate::state::{SessionState, StateCell};

struct Inner {
    pending: PendingTable,
    incoming: IncomingTable,
    notifications: NotificationRouter,
    state: StateCell,
    ids: RequestIdAllocator,
    lifetime: CancellationToken,
    protocol_version: SyncMutex<Option<String>>,
    session_id: Option<String>,
    config: SessionConfig,
    handler: Arc<dyn RequestHandler>,
    outgoing: mpsc::UnboundedSender<Message>,
    incoming_permits: Arc<Semaphore>,
    io_task: SyncMutex<Option<JoinHandle<()>>>,
    keepalive_task: SyncMutex<Option<JoinHandle<()>>>,
    on_close: SyncMutex<Option<Box<dyn FnOnce() + Send>>>,
}

/// A live, bidirectional JSON-RPC session over one [`Connection`] (spec
/// §3 Session, §4.8).
///
/// Cheap to clone; every clone refers to the same underlying engine state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// Takes ownership of `connection` and starts servicing it: spawns the
    /// I/O task (and, if `config` enables it, the keepalive task) and
    /// returns immediately in [`SessionState::New`]. Call
    /// [`Session::initialize_as_client`] to drive the handshake from this
    /// side, or simply wait: an inbound `initialize` request drives the
    /// same transition from the other side.
    #[must_use]
    pub fn spawn(
        connection: Box<dyn Connection>,
        handler: Arc<dyn RequestHandler>,
        config: SessionConfig,
    ) -> Self {
        let session_id = connection.session_id().map(str::to_string);
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();

        let inner = Arc::new(Inner {
            pending: PendingTable::new(),
            incoming: IncomingTable::new(),
            notifications: NotificationRouter::new(),
            state: StateCell::new(),
            ids: RequestIdAllocator::new(config.id_style),
            lifetime: CancellationToken::new(),
            protocol_version: SyncMutex::new(None),
            session_id,
            config: config.clone(),
            handler,
            outgoing: outgoing_tx,
            incoming_permits: Arc::new(Semaphore::new(config.incoming_queue_capacity)),
            io_task: SyncMutex::new(None),
            keepalive_task: SyncMutex::new(None),
            on_close: SyncMutex::new(None),
        });

        let io_inner = inner.clone();
        let io_handle = tokio::spawn(run_io_loop(connection, outgoing_rx, io_inner));
        *inner.io_task.lock() = Some(io_handle);

        let session = Self { inner };
        if let Some(interval) = config.keepalive_interval {
            let keepalive_session = session.clone();
            let handle = tokio::spawn(async move { keepalive_session.run_keepalive(interval).await });
            *session.inner.keepalive_task.lock() = Some(handle);
        }
        session
    }

    /// This session's transport-assigned id, if its transport has one.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.inner.session_id.as_deref()
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.state.get()
    }

    /// The negotiated protocol version, once the handshake has completed.
    #[must_use]
    pub fn protocol_version(&self) -> Option<String> {
        self.inner.protocol_version.lock().clone()
    }

    /// Registers `handler` for inbound notifications of `method` (spec
    /// §4.8: "route to the registered handler for that method").
    pub fn register_notification_handler(&self, method: impl Into<String>, handler: NotificationHandler) {
        self.inner.notifications.register(method, handler);
    }

    /// Registers a one-shot hook run after the session reaches
    /// [`SessionState::Closed`] (spec §4.8 Close: "invoke the one-shot
    /// on-close hook"). Replaces any previously registered hook.
    pub fn on_close(&self, hook: impl FnOnce() + Send + 'static) {
        *self.inner.on_close.lock() = Some(Box::new(hook));
    }

    /// Drives the client-side `initialize` handshake (spec §4.8): sends
    /// `initialize`, validates the server's protocol version against
    /// [`mcp_stream_core::SUPPORTED_PROTOCOL_VERSIONS`], and completes with
    /// `notifications/initialized`.
    ///
    /// # Errors
    /// - [`McpError::protocol`] if the handshake was already started.
    /// - [`McpError::Session`]`(`[`SessionError::UnsupportedProtocolVersion`]`)`
    ///   if the server named a version this build does not support; the
    ///   session is closed as a side effect.
    /// - Whatever [`Session::send_request`] itself can return.
    pub async fn initialize_as_client(
        &self,
        client_info: ClientInfo,
        capabilities: Value,
    ) -> Result<InitializeResult> {
        if !self
            .inner
            .state
            .advance_if(SessionState::New, SessionState::Initializing)
        {
            return Err(McpError::protocol("handshake already started"));
        }

        let params = InitializeParams {
            protocol_version: mcp_stream_core::PREFERRED_PROTOCOL_VERSION.to_string(),
            capabilities,
            client_info,
        };
        let params_value =
            serde_json::to_value(&params).map_err(|e| McpError::protocol(format!("{e}")))?;
        let result_value = self
            .send_request(METHOD_INITIALIZE, Some(params_value), None)
            .await?;
        let result: InitializeResult = serde_json::from_value(result_value)
            .map_err(|e| McpError::protocol(format!("malformed initialize result: {e}")))?;

        if !is_supported_protocol_version(&result.protocol_version) {
            self.trigger_close();
            return Err(McpError::Session(SessionError::UnsupportedProtocolVersion(
                result.protocol_version,
            )));
        }
        *self.inner.protocol_version.lock() = Some(result.protocol_version.clone());
        self.send_message(Message::Notification(Notification::new(METHOD_INITIALIZED)))?;
        self.inner
            .state
            .advance_if(SessionState::Initializing, SessionState::Ready);
        Ok(result)
    }

    /// Sends `method` as a request and awaits its response (spec §4.8 "Send
    /// request"). Exactly one of {response, cancellation error,
    /// connection-closed error, timeout} is ever returned (spec §8).
    ///
    /// `cancel`, if given, lets the caller cancel the wait: on
    /// cancellation, a `notifications/cancelled` is sent best-effort and
    /// [`McpError::Cancelled`] is returned immediately; a response that
    /// arrives afterward is discarded.
    ///
    /// # Errors
    /// See the error kinds above; a write failure surfaces as
    /// [`SessionError::ConnectionClosed`].
    pub async fn send_request(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
        cancel: Option<CancellationToken>,
    ) -> Result<Value> {
        if self.inner.state.is_closing_or_closed() {
            return Err(McpError::Session(SessionError::ConnectionClosed));
        }
        let method = method.into();
        let id = self.inner.ids.next();
        let rx = self.inner.pending.insert(id.clone(), method.clone());

        let request = match params {
            Some(p) => Request::with_params(method, p, id.clone()),
            None => Request::new(method, id.clone()),
        };
        if self.send_message(Message::Request(request)).is_err() {
            self.inner.pending.remove(&id);
            return Err(McpError::Session(SessionError::ConnectionClosed));
        }

        let outcome = await_reply(rx, cancel, self.inner.lifetime.clone(), self.inner.config.request_timeout).await;
        self.finish_request(id, outcome).await
    }

    async fn finish_request(&self, id: RequestId, outcome: ReplyOutcome) -> Result<Value> {
        match outcome {
            ReplyOutcome::Delivered(response) => match response.rpc_error() {
                Some(err) => Err(McpError::Application {
                    code: err.code,
                    message: err.message.clone(),
                    data: err.data.clone(),
                }),
                None => Ok(response.result().cloned().unwrap_or(Value::Null)),
            },
            ReplyOutcome::SenderDropped => Err(McpError::Session(SessionError::ConnectionClosed)),
            ReplyOutcome::Cancelled => {
                self.inner.pending.remove(&id);
                let notification = Notification::with_params(
                    METHOD_CANCELLED,
                    serde_json::json!(CancelledParams {
                        request_id: id.clone(),
                        reason: Some("caller cancelled".to_string()),
                    }),
                );
                let _ = self.send_message(Message::Notification(notification));
                Err(McpError::Cancelled(format!("request {id} cancelled by caller")))
            }
            ReplyOutcome::Closed => {
                self.inner.pending.remove(&id);
                Err(McpError::Session(SessionError::ConnectionClosed))
            }
            ReplyOutcome::TimedOut => {
                self.inner.pending.remove(&id);
                Err(McpError::Timeout(
                    self.inner
                        .config
                        .request_timeout
                        .unwrap_or(Duration::from_secs(30)),
                ))
            }
        }
    }

    /// Sends `method` as a notification; never answered (spec §3).
    ///
    /// # Errors
    /// [`SessionError::ConnectionClosed`] if the session's outgoing queue
    /// has already shut down.
    pub fn send_notification(&self, method: impl Into<String>, params: Option<Value>) -> Result<()> {
        let method = method.into();
        let notification = match params {
            Some(p) => Notification::with_params(method, p),
            None => Notification::new(method),
        };
        self.send_message(Message::Notification(notification))
    }

    fn send_message(&self, message: Message) -> Result<()> {
        self.inner
            .outgoing
            .send(message)
            .map_err(|_| McpError::Session(SessionError::ConnectionClosed))
    }

    /// Closes the session: cancels keepalive, fails every pending caller
    /// with `ConnectionClosed`, closes the transport, and does not return
    /// until teardown is complete (spec §4.8 Close, §8: "after Close
    /// returns, no pending caller remains blocked").
    ///
    /// # Errors
    /// Never fails; the `Result` is kept for forward compatibility with a
    /// transport whose `close` can itself report an error.
    pub async fn close(&self) -> Result<()> {
        self.trigger_close();
        let handle = self.inner.io_task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        if let Some(handle) = self.inner.keepalive_task.lock().take() {
            handle.abort();
        }
        Ok(())
    }

    fn trigger_close(&self) {
        if self.inner.state.get() != SessionState::Closed {
            self.inner.state.set(SessionState::Closing);
        }
        self.inner.lifetime.cancel();
    }

    async fn run_keepalive(&self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick is immediate; consume it before pinging
        loop {
            tokio::select! {
                () = self.inner.lifetime.cancelled() => return,
                _ = ticker.tick() => {}
            }
            if self.inner.state.is_closing_or_closed() {
                return;
            }
            let deadline = self.inner.config.keepalive_timeout.unwrap_or(interval);
            let ping = self.send_request(METHOD_PING, None, None);
            match tokio::time::timeout(deadline, ping).await {
                Ok(Ok(_)) => {}
                Ok(Err(error)) => {
                    tracing::warn!(%error, "keepalive ping failed, closing session");
                    self.trigger_close();
                    return;
                }
                Err(_elapsed) => {
                    tracing::warn!("keepalive ping timed out, closing session");
                    self.trigger_close();
                    return;
                }
            }
        }
    }
}

enum ReplyOutcome {
    Delivered(Response),
    SenderDropped,
    Cancelled,
    Closed,
    TimedOut,
}

async fn await_reply(
    mut rx: tokio::sync::oneshot::Receiver<Response>,
    cancel: Option<CancellationToken>,
    lifetime: CancellationToken,
    request_timeout: Option<Duration>,
) -> ReplyOutcome {
    let cancel = cancel.unwrap_or_default();
    let wait = async {
        tokio::select! {
            biased;
            () = cancel.cancelled() => ReplyOutcome::Cancelled,
            () = lifetime.cancelled() => ReplyOutcome::Closed,
            result = &mut rx => match result {
                Ok(response) => ReplyOutcome::Delivered(response),
                Err(_) => ReplyOutcome::SenderDropped,
            },
        }
    };
    match request_timeout {
        Some(duration) => tokio::time::timeout(duration, wait)
            .await
            .unwrap_or(ReplyOutcome::TimedOut),
        None => wait.await,
    }
}

async fn run_io_loop(
    mut connection: Box<dyn Connection>,
    mut outgoing_rx: mpsc::UnboundedReceiver<Message>,
    inner: Arc<Inner>,
) {
    let outgoing_tx = inner.outgoing.clone();
    loop {
        tokio::select! {
            biased;
            () = inner.lifetime.cancelled() => break,
            maybe_message = outgoing_rx.recv() => {
                match maybe_message {
                    Some(message) => {
                        if let Err(error) = connection.write(&message).await {
                            tracing::warn!(%error, "session write failed");
                            inner.state.set(SessionState::Closing);
                            inner.lifetime.cancel();
                        }
                    }
                    None => inner.lifetime.cancel(),
                }
            }
            read_result = connection.read() => {
                match read_result {
                    Ok(Some(message)) => dispatch_incoming(message, &inner, &outgoing_tx),
                    Ok(None) => {
                        tracing::info!("peer closed the connection");
                        inner.state.set(SessionState::Closing);
                        inner.lifetime.cancel();
                    }
                    Err(error) => {
                        tracing::warn!(%error, "session read failed");
                        inner.state.set(SessionState::Closing);
                        inner.lifetime.cancel();
                    }
                }
            }
        }
    }

    let _ = connection.close().await;
    inner.pending.fail_all_connection_closed();
    inner.state.set(SessionState::Closed);
    if let Some(hook) = inner.on_close.lock().take() {
        hook();
    }
}

fn dispatch_incoming(message: Message, inner: &Arc<Inner>, outgoing_tx: &mpsc::UnboundedSender<Message>) {
    match message {
        Message::Response(response) => inner.pending.deliver(response),
        Message::Notification(notification) => handle_notification(notification, inner),
        Message::Request(request) => handle_request(request, inner, outgoing_tx),
    }
}

fn handle_notification(notification: Notification, inner: &Arc<Inner>) {
    let params = notification.params.clone().unwrap_or(Value::Null);
    match notification.method.as_str() {
        METHOD_INITIALIZED => {
            if inner
                .state
                .advance_if(SessionState::Initializing, SessionState::Ready)
            {
                tracing::info!("session ready");
            }
        }
        METHOD_CANCELLED => {
            if let Ok(cancelled) = serde_json::from_value::<CancelledParams>(params.clone()) {
                if inner.incoming.cancel(&cancelled.request_id) {
                    tracing::debug!(id = %cancelled.request_id, "incoming request cancelled by peer");
                }
            }
        }
        _ => {}
    }
    inner.notifications.dispatch(&notification.method, params);
}

fn handle_request(request: Request, inner: &Arc<Inner>, outgoing_tx: &mpsc::UnboundedSender<Message>) {
    if request.method == METHOD_INITIALIZE {
        inner.state.advance_if(SessionState::New, SessionState::Initializing);
    }
    if request.method == METHOD_PING {
        let _ = outgoing_tx.send(Message::Response(Response::success(Value::Null, request.id)));
        return;
    }

    let token = inner.incoming.register(request.id.clone(), &inner.lifetime);
    let permits = inner.incoming_permits.clone();
    let inner = inner.clone();
    let outgoing_tx = outgoing_tx.clone();
    let id = request.id;
    let method = request.method;
    let params = request.params;
    tokio::spawn(async move {
        // Bounds the number of handlers running concurrently (spec §5
        // backpressure); queued tasks wait here rather than all racing the
        // handler at once.
        let permit = permits.acquire_owned().await;
        let result = inner.handler.handle(&method, params, token.clone()).await;
        drop(permit);
        inner.incoming.remove(&id);
        if token.is_cancelled() {
            tracing::debug!(id = %id, method, "suppressing response: request was cancelled");
            return;
        }
        let response = match result {
            Ok(value) => Response::success(value, id),
            Err(err) => Response::error(err, id),
        };
        let _ = outgoing_tx.send(Message::Response(response));
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{BoxFuture, NullHandler};
    use mcp_stream_transport_traits::inmemory;
    use mcp_stream_wire::RpcError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration as StdDuration;

    struct EchoHandler;
    impl RequestHandler for EchoHandler {
        fn handle(
            &self,
            method: &str,
            params: Option<Value>,
            _cancel: CancellationToken,
        ) -> BoxFuture<'_, std::result::Result<Value, RpcError>> {
            let method = method.to_string();
            Box::pin(async move { Ok(serde_json::json!({"echoed": method, "params": params})) })
        }
    }

    struct SlowHandler {
        started: Arc<tokio::sync::Notify>,
    }
    impl RequestHandler for SlowHandler {
        fn handle(
            &self,
            _method: &str,
            _params: Option<Value>,
            cancel: CancellationToken,
        ) -> BoxFuture<'_, std::result::Result<Value, RpcError>> {
            let started = self.started.clone();
            Box::pin(async move {
                started.notify_one();
                cancel.cancelled().await;
                Ok(Value::Null)
            })
        }
    }

    fn pair_of_sessions(
        handler_a: Arc<dyn RequestHandler>,
        handler_b: Arc<dyn RequestHandler>,
    ) -> (Session, Session) {
        let (conn_a, conn_b) = inmemory::pair(Some("test-session".into()));
        let a = Session::spawn(Box::new(conn_a), handler_a, SessionConfig::default());
        let b = Session::spawn(Box::new(conn_b), handler_b, SessionConfig::default());
        (a, b)
    }

    #[tokio::test]
    async fn request_roundtrip_between_two_sessions() {
        let (a, b) = pair_of_sessions(Arc::new(NullHandler), Arc::new(EchoHandler));
        let result = a
            .send_request("ping/custom", Some(serde_json::json!({"x": 1})), None)
            .await
            .unwrap();
        assert_eq!(result["echoed"], "ping/custom");
        let _ = b;
    }

    #[tokio::test]
    async fn unknown_method_surfaces_as_application_error() {
        let (a, _b) = pair_of_sessions(Arc::new(NullHandler), Arc::new(NullHandler));
        let err = a.send_request("bogus/method", None, None).await.unwrap_err();
        assert!(matches!(err, McpError::Application { code, .. } if code == mcp_stream_core::jsonrpc_error_codes::METHOD_NOT_FOUND));
    }

    #[tokio::test]
    async fn initialize_handshake_completes_and_reaches_ready() {
        let server_handler: Arc<dyn RequestHandler> = Arc::new(InitializeAnswering);
        let (client, _server) = pair_of_sessions(Arc::new(NullHandler), server_handler);
        let result = client
            .initialize_as_client(
                ClientInfo {
                    name: "test-client".into(),
                    version: "0.0.0".into(),
                },
                serde_json::json!({}),
            )
            .await
            .unwrap();
        assert!(is_supported_protocol_version(&result.protocol_version));
        assert_eq!(client.state(), SessionState::Ready);
        assert_eq!(client.protocol_version().as_deref(), Some(result.protocol_version.as_str()));
    }

    struct InitializeAnswering;
    impl RequestHandler for InitializeAnswering {
        fn handle(
            &self,
            method: &str,
            _params: Option<Value>,
            _cancel: CancellationToken,
        ) -> BoxFuture<'_, std::result::Result<Value, RpcError>> {
            assert_eq!(method, METHOD_INITIALIZE);
            Box::pin(async move {
                Ok(serde_json::json!({
                    "protocolVersion": mcp_stream_core::PREFERRED_PROTOCOL_VERSION,
                    "serverInfo": {"name": "test-server", "version": "0.0.0"},
                    "capabilities": {},
                }))
            })
        }
    }

    #[tokio::test]
    async fn double_initialize_is_rejected() {
        let (client, _server) = pair_of_sessions(Arc::new(NullHandler), Arc::new(InitializeAnswering));
        let info = || ClientInfo {
            name: "c".into(),
            version: "0".into(),
        };
        client.initialize_as_client(info(), serde_json::json!({})).await.unwrap();
        let err = client.initialize_as_client(info(), serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, McpError::Protocol(_)));
    }

    #[tokio::test]
    async fn caller_cancellation_sends_cancelled_notification() {
        let started = Arc::new(tokio::sync::Notify::new());
        let server_handler: Arc<dyn RequestHandler> = Arc::new(SlowHandler { started: started.clone() });
        let (client, _server) = pair_of_sessions(Arc::new(NullHandler), server_handler);

        let token = CancellationToken::new();
        let call_token = token.clone();
        let call = tokio::spawn(async move { client.send_request("slow/op", None, Some(call_token)).await });
        started.notified().await;
        token.cancel();

        let result = call.await.unwrap();
        assert!(matches!(result, Err(McpError::Cancelled(_))));
    }

    #[tokio::test]
    async fn close_fails_every_pending_caller() {
        let (a, _b) = pair_of_sessions(Arc::new(NullHandler), Arc::new(SlowHandler { started: Arc::new(tokio::sync::Notify::new()) }));
        let a2 = a.clone();
        let call = tokio::spawn(async move { a2.send_request("slow/op", None, None).await });
        tokio::time::sleep(StdDuration::from_millis(20)).await;
        a.close().await.unwrap();
        let result = call.await.unwrap();
        assert!(matches!(result, Err(McpError::Session(SessionError::ConnectionClosed))));
    }

    #[tokio::test]
    async fn notification_handler_is_invoked_on_receipt() {
        let (a, b) = pair_of_sessions(Arc::new(NullHandler), Arc::new(NullHandler));
        let seen = Arc::new(AtomicBool::new(false));
        let seen2 = seen.clone();
        b.register_notification_handler(
            "custom/event",
            Arc::new(move |_| seen2.store(true, Ordering::SeqCst)),
        );
        a.send_notification("custom/event", None).unwrap();
        tokio::time::sleep(StdDuration::from_millis(20)).await;
        assert!(seen.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn ping_is_answered_automatically() {
        let (a, _b) = pair_of_sessions(Arc::new(NullHandler), Arc::new(NullHandler));
        let result = a.send_request(METHOD_PING, None, None).await;
        assert!(result.is_ok());
    }
}
