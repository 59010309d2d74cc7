//! Client-side Streamable-HTTP transport (spec §4.7).
//!
//! Pairs with `mcp-stream-http`'s server router: a `Transport` that POSTs
//! one message per `write`, decodes whichever representation the server
//! answers with (a plain JSON body or a short SSE stream), and once a
//! session id has been learned keeps a standalone `GET` open in the
//! background for server-initiated traffic.

mod client;
mod config;
mod headers;

pub use client::{StreamableHttpConnection, StreamableHttpTransport};
pub use config::{ReconnectConfig, StreamableHttpClientConfig};
