//! End-to-end check against a real `mcp-stream-http` server bound to a
//! loopback port: a POST round trip that learns a session id, then a
//! `DELETE` on close.

use std::net::SocketAddr;
use std::sync::Arc;

use mcp_stream_core::Result;
use mcp_stream_http::{build_router, HttpServerConfig, HttpServerState, MessageHandler};
use mcp_stream_streamable::BoxFuture;
use mcp_stream_http_client::StreamableHttpClientConfig;
use mcp_stream_transport_traits::{ConnectMode, Connection, Transport};
use mcp_stream_wire::{Message, Request as RpcRequest, Response as RpcResponse};

struct EchoHandler;

impl MessageHandler for EchoHandler {
    fn handle(&self, _session_id: &str, message: Message) -> BoxFuture<'_, Result<Option<Message>>> {
        Box::pin(async move {
            match message {
                Message::Request(r) => Ok(Some(Message::Response(RpcResponse::success(
                    serde_json::json!({"echoed": r.method}),
                    r.id,
                )))),
                Message::Notification(_) | Message::Response(_) => Ok(None),
            }
        })
    }
}

async fn spawn_server() -> SocketAddr {
    let mut config = HttpServerConfig::default();
    config.origin_policy = mcp_stream_http::OriginPolicy::allow_any();
    let state = HttpServerState::new(config, Arc::new(EchoHandler));
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .unwrap();
    });
    addr
}

#[tokio::test]
async fn initialize_round_trip_learns_session_id_and_close_sends_delete() {
    let addr = spawn_server().await;
    let base_url = url::Url::parse(&format!("http://{addr}/mcp")).unwrap();
    let config = StreamableHttpClientConfig::new(base_url);
    let transport = mcp_stream_http_client::StreamableHttpTransport::new(config).unwrap();

    let mut connection = transport.connect(ConnectMode::New).await.unwrap();
    assert_eq!(connection.session_id(), None);

    let request = Message::Request(RpcRequest::new("initialize", 1i64));
    connection.write(&request).await.unwrap();

    let reply = connection.read().await.unwrap().expect("a reply arrives");
    match reply {
        Message::Response(response) => {
            assert!(response.is_success());
        }
        other => panic!("expected a response, got {other:?}"),
    }
    assert!(connection.session_id().is_some());

    connection.close().await.unwrap();
}
