//! Exercises the facade's re-exports end to end: two [`Session`]s wired
//! over an in-memory connection pair complete the `initialize` handshake.

use std::sync::Arc;

use mcp_stream::prelude::*;
use mcp_stream::{
    inmemory, is_supported_protocol_version, ClientInfo, NotificationHandler, RpcError,
    SessionState,
};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

struct Answering;

impl RequestHandler for Answering {
    fn handle(
        &self,
        method: &str,
        _params: Option<Value>,
        _cancel: CancellationToken,
    ) -> BoxFuture<'_, std::result::Result<Value, RpcError>> {
        let method = method.to_string();
        Box::pin(async move {
            match method.as_str() {
                "initialize" => Ok(serde_json::json!({
                    "protocolVersion": mcp_stream::PREFERRED_PROTOCOL_VERSION,
                    "serverInfo": {"name": "facade-smoke-server", "version": "0.0.0"},
                    "capabilities": {},
                })),
                other => Err(RpcError::method_not_found(other)),
            }
        })
    }
}

#[tokio::test]
async fn two_sessions_complete_the_initialize_handshake_over_in_memory_transport() {
    let (conn_a, conn_b) = inmemory::pair(None);

    let server = Session::spawn(
        Box::new(conn_b),
        Arc::new(Answering),
        SessionConfig::default(),
    );
    let client = Session::spawn(
        Box::new(conn_a),
        Arc::new(NullHandler),
        SessionConfig::default(),
    );

    let result = client
        .initialize_as_client(
            ClientInfo {
                name: "facade-smoke-client".into(),
                version: "0.0.0".into(),
            },
            serde_json::json!({}),
        )
        .await
        .unwrap();

    assert!(is_supported_protocol_version(&result.protocol_version));
    assert_eq!(client.state(), SessionState::Ready);

    client.close().await.unwrap();
    server.close().await.unwrap();
}

#[tokio::test]
async fn notification_handler_registered_through_the_facade_is_invoked() {
    let (conn_a, conn_b) = inmemory::pair(None);
    let client = Session::spawn(Box::new(conn_a), Arc::new(NullHandler), SessionConfig::default());
    let server = Session::spawn(Box::new(conn_b), Arc::new(NullHandler), SessionConfig::default());

    let counter = Arc::new(std::sync::atomic::AtomicU64::new(0));
    let counter_clone = counter.clone();
    server.register_notification_handler(
        "notifications/progress",
        Arc::new(move |_value: Value| {
            counter_clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }) as NotificationHandler,
    );

    client
        .send_notification("notifications/progress", Some(serde_json::json!({"pct": 50})))
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 1);

    client.close().await.unwrap();
    server.close().await.unwrap();
}
