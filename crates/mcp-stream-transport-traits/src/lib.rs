//! The `Transport` / `Connection` abstraction (spec §4.5, §9).
//!
//! §9's Design Notes name two possible shapes for this seam: a legacy
//! `Transport { send, receive, close }` object, and a canonical
//! `Transport::connect() -> Connection { read, write, close, session_id }`
//! split where the transport is a connector/listener and the connection is
//! the live, message-oriented channel it hands back. This crate implements
//! only the canonical shape, per the spec's own resolution of that question
//! (see `DESIGN.md`).
//!
//! Both traits are made object-safe by returning `Pin<Box<dyn Future>>`
//! rather than using `async fn` in the trait, the same technique the wider
//! MCP SDK corpus uses so that `Box<dyn Transport>` and `Box<dyn Connection>`
//! are usable without a generic parameter threading through every layer
//! above them.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use mcp_stream_core::Result;
use mcp_stream_wire::Message;

/// A boxed future, the return type every trait method below uses to stay
/// object-safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// How a connection came to be: a freshly dialed/accepted connection
/// (assigns a new session id) or one resumed against an existing session
/// (e.g. a Streamable-HTTP GET carrying `Mcp-Session-Id` + `Last-Event-ID`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectMode {
    /// Establish a new logical session.
    New,
    /// Resume an existing logical session by id.
    Resume,
}

/// A connector or listener that produces live [`Connection`]s.
///
/// Implemented once per wire transport (stdio subprocess, Streamable-HTTP
/// server, Streamable-HTTP client); the session engine in
/// `mcp-stream-session` is written against this trait only and has no
/// transport-specific code.
pub trait Transport: Send + Sync {
    /// Establishes a new connection in `mode`.
    fn connect(&self, mode: ConnectMode) -> BoxFuture<'_, Result<Box<dyn Connection>>>;

    /// A short, human-readable name for diagnostics and log lines
    /// (e.g. `"stdio"`, `"streamable-http"`).
    fn transport_type(&self) -> &'static str;
}

/// A live, message-oriented channel to a single peer.
///
/// `read`/`write` operate on whole [`Message`] envelopes; the framing
/// underneath (NDJSON lines, SSE events, a single HTTP response body) is the
/// implementation's concern, not the session engine's.
pub trait Connection: Send {
    /// Reads the next message. Returns `Ok(None)` on a clean, expected end of
    /// stream (e.g. the peer closed its write half); an abrupt or malformed
    /// stream returns `Err(McpError::Transport)` instead.
    fn read(&mut self) -> BoxFuture<'_, Result<Option<Message>>>;

    /// Writes one message. Implementations that buffer internally (e.g. an
    /// SSE writer) must ensure the message is at least queued for delivery
    /// before returning `Ok(())`; they need not wait for peer acknowledgment.
    fn write(&mut self, message: &Message) -> BoxFuture<'_, Result<()>>;

    /// Closes the connection. Idempotent: closing an already-closed
    /// connection is not an error.
    fn close(&mut self) -> BoxFuture<'_, Result<()>>;

    /// The session id this connection belongs to, if the transport assigns
    /// one (stdio subprocess connections have none; Streamable-HTTP
    /// connections always do once `initialize` completes).
    fn session_id(&self) -> Option<&str>;
}

impl fmt::Debug for dyn Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("session_id", &self.session_id())
            .finish()
    }
}

/// An in-process reference [`Transport`]/[`Connection`] pair backed by
/// `tokio::sync::mpsc` channels, used by the session engine's own tests and
/// by downstream integration tests that want a transport with no I/O.
pub mod inmemory {
    use super::{BoxFuture, Connection, ConnectMode, Transport};
    use mcp_stream_core::{McpError, Result};
    use mcp_stream_wire::Message;
    use tokio::sync::mpsc;

    /// Builds a connected pair of in-memory connections: writes on one side
    /// arrive as reads on the other.
    #[must_use]
    pub fn pair(session_id: Option<String>) -> (InMemoryConnection, InMemoryConnection) {
        let (tx_a, rx_b) = mpsc::unbounded_channel();
        let (tx_b, rx_a) = mpsc::unbounded_channel();
        (
            InMemoryConnection {
                tx: tx_a,
                rx: rx_a,
                session_id: session_id.clone(),
                closed: false,
            },
            InMemoryConnection {
                tx: tx_b,
                rx: rx_b,
                session_id,
                closed: false,
            },
        )
    }

    /// One side of an in-memory connection pair.
    pub struct InMemoryConnection {
        tx: mpsc::UnboundedSender<Message>,
        rx: mpsc::UnboundedReceiver<Message>,
        session_id: Option<String>,
        closed: bool,
    }

    impl Connection for InMemoryConnection {
        fn read(&mut self) -> BoxFuture<'_, Result<Option<Message>>> {
            Box::pin(async move {
                if self.closed {
                    return Ok(None);
                }
                Ok(self.rx.recv().await)
            })
        }

        fn write(&mut self, message: &Message) -> BoxFuture<'_, Result<()>> {
            let message = message.clone();
            Box::pin(async move {
                if self.closed {
                    return Err(McpError::Session(
                        mcp_stream_core::SessionError::ConnectionClosed,
                    ));
                }
                self.tx
                    .send(message)
                    .map_err(|_| McpError::transport("peer dropped"))
            })
        }

        fn close(&mut self) -> BoxFuture<'_, Result<()>> {
            self.closed = true;
            Box::pin(async { Ok(()) })
        }

        fn session_id(&self) -> Option<&str> {
            self.session_id.as_deref()
        }
    }

    /// A [`Transport`] that always hands back one end of a fresh
    /// [`pair`], discarding the other. Useful for tests that only need a
    /// transport object, not both ends.
    pub struct InMemoryTransport;

    impl Transport for InMemoryTransport {
        fn connect(&self, _mode: ConnectMode) -> BoxFuture<'_, Result<Box<dyn Connection>>> {
            Box::pin(async {
                let (a, _b) = pair(None);
                Ok(Box::new(a) as Box<dyn Connection>)
            })
        }

        fn transport_type(&self) -> &'static str {
            "in-memory"
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use mcp_stream_wire::{Message, Notification};

        #[tokio::test]
        async fn write_on_one_side_arrives_as_read_on_the_other() {
            let (mut a, mut b) = pair(Some("sess-1".into()));
            let msg = Message::Notification(Notification::new("ping"));
            a.write(&msg).await.unwrap();
            let received = b.read().await.unwrap().unwrap();
            assert_eq!(received.method(), Some("ping"));
            assert_eq!(a.session_id(), Some("sess-1"));
        }

        #[tokio::test]
        async fn close_makes_subsequent_writes_fail() {
            let (mut a, _b) = pair(None);
            a.close().await.unwrap();
            let msg = Message::Notification(Notification::new("ping"));
            assert!(a.write(&msg).await.is_err());
        }

        #[tokio::test]
        async fn close_is_idempotent() {
            let (mut a, _b) = pair(None);
            a.close().await.unwrap();
            a.close().await.unwrap();
        }

        #[tokio::test]
        async fn factory_produces_a_usable_connection() {
            let transport = InMemoryTransport;
            let conn = transport.connect(ConnectMode::New).await.unwrap();
            assert_eq!(conn.session_id(), None);
        }
    }
}
