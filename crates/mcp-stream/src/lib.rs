//! `mcp-stream`: a bidirectional Model Context Protocol session engine over
//! stdio and Streamable-HTTP transports.
//!
//! This crate is a thin facade: every type it re-exports is implemented in
//! one of its component crates (`mcp-stream-core`, `mcp-stream-wire`,
//! `mcp-stream-transport-traits`, `mcp-stream-streamable`,
//! `mcp-stream-stdio`, `mcp-stream-session`, and — behind feature flags —
//! `mcp-stream-http`/`mcp-stream-http-client`). Depend on this crate for a
//! single version to pin; depend on a component crate directly if you only
//! need its pieces.
//!
//! ```no_run
//! use mcp_stream::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn run() -> mcp_stream::Result<()> {
//! let config = StdioConfig::new("some-mcp-server");
//! let transport = StdioTransport::new(config);
//! let connection = transport.connect(ConnectMode::New).await?;
//!
//! struct Echo;
//! impl RequestHandler for Echo {
//!     fn handle(
//!         &self,
//!         _method: &str,
//!         params: Option<serde_json::Value>,
//!         _cancel: tokio_util::sync::CancellationToken,
//!     ) -> BoxFuture<'_, std::result::Result<serde_json::Value, mcp_stream::RpcError>> {
//!         Box::pin(async move { Ok(params.unwrap_or_default()) })
//!     }
//! }
//!
//! let session = Session::spawn(connection, Arc::new(Echo), SessionConfig::default());
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

pub use mcp_stream_core::{
    is_supported_protocol_version, McpError, ResourceError, Result, SessionError,
    PREFERRED_PROTOCOL_VERSION, SUPPORTED_PROTOCOL_VERSIONS,
};
pub use mcp_stream_session::{
    CancelledParams, ClientInfo, IdStyle, InitializeParams, InitializeResult, NotificationHandler,
    NotificationRouter, NullHandler, RequestHandler, ServerInfo, Session, SessionConfig,
    SessionState, METHOD_CANCELLED, METHOD_INITIALIZE, METHOD_INITIALIZED, METHOD_PING,
};
pub use mcp_stream_stdio::{StdioConfig, StdioConnection, StdioMetrics, StdioTransport};
pub use mcp_stream_streamable::{
    encode_sse, EventId, EventStore, ResumableStreamWriter, SimpleStreamWriter, SseDecoder,
    SseEvent, StreamWriter, StreamWriterFactory, StreamableConfig,
};
pub use mcp_stream_transport_traits::{inmemory, BoxFuture, ConnectMode, Connection, Transport};
pub use mcp_stream_wire::{
    decode, encode, Message, Notification, Request, RequestId, Response, RpcError,
};

#[cfg(feature = "http")]
pub use mcp_stream_http::{
    build_router, spawn_idle_sweeper, HttpServerConfig, HttpServerState, MessageHandler,
    OriginPolicy, TransportMetrics,
};

#[cfg(feature = "http-client")]
pub use mcp_stream_http_client::{ReconnectConfig, StreamableHttpClientConfig, StreamableHttpConnection, StreamableHttpTransport};

/// The common imports for building a session over any transport in this
/// crate.
pub mod prelude {
    pub use crate::{
        BoxFuture, ConnectMode, Connection, McpError, NullHandler, RequestHandler, Result,
        Session, SessionConfig, StdioConfig, StdioTransport, Transport,
    };

    #[cfg(feature = "http")]
    pub use crate::{build_router, HttpServerConfig, HttpServerState, MessageHandler};

    #[cfg(feature = "http-client")]
    pub use crate::{StreamableHttpClientConfig, StreamableHttpTransport};
}
