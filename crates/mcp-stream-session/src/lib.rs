//! The bidirectional session engine: one [`Session`] per connection,
//! independent of which wire transport carries it (spec §3, §4.8, §4.9).
//!
//! A session is symmetric — the same type serves a role that only sends
//! requests (a client with no inbound methods), a role that only answers
//! them (a server), or both at once (sampling/elicitation callbacks on a
//! client, bidirectional tool servers) — by keeping a single
//! [`RequestHandler`] seam for whatever this side chooses to answer and a
//! single [`NotificationRouter`] for whatever it chooses to observe.

mod config;
mod handler;
mod handshake;
mod ids;
mod incoming;
mod notifications;
mod pending;
mod session;
mod state;

pub use config::{IdStyle, SessionConfig};
pub use handler::{BoxFuture, NullHandler, RequestHandler};
pub use handshake::{
    CancelledParams, ClientInfo, InitializeParams, InitializeResult, ServerInfo,
    METHOD_CANCELLED, METHOD_INITIALIZE, METHOD_INITIALIZED, METHOD_PING,
};
pub use notifications::{NotificationHandler, NotificationRouter};
pub use session::Session;
pub use state::SessionState;
