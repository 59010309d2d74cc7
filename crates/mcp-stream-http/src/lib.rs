//! Streamable-HTTP server transport (spec §4.6).
//!
//! A single `/mcp` route handles `POST` (request/notification delivery),
//! `GET` (standalone resumable SSE), and `DELETE` (session termination),
//! backed by `mcp-stream-streamable`'s `EventStore`/`StreamWriter` and
//! guarded by an [`OriginPolicy`] allow-list.

mod config;
mod headers;
mod origin;
mod router;
mod session;

pub use config::HttpServerConfig;
pub use mcp_stream_core::metrics::TransportMetrics;
pub use origin::OriginPolicy;
pub use router::{build_router, spawn_idle_sweeper, HttpServerState, MessageHandler};
pub use session::SessionRegistry;
