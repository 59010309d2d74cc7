//! Header name/value constants used by the Streamable-HTTP client (spec
//! §6.2). Mirrors `mcp-stream-http`'s constants; kept local rather than
//! shared so this crate does not depend on the server crate for four
//! string literals.

/// Carries the session id learned from the server, echoed on every
/// subsequent request.
pub const MCP_SESSION_ID: &str = "Mcp-Session-Id";
/// Sent on a GET reconnect to resume replay after this event id.
pub const LAST_EVENT_ID: &str = "Last-Event-ID";
/// Sent on every request so the server can reject an unsupported version
/// early.
pub const MCP_PROTOCOL_VERSION: &str = "MCP-Protocol-Version";
/// `application/json`.
pub const CONTENT_TYPE_JSON: &str = "application/json";
/// `text/event-stream`.
pub const CONTENT_TYPE_SSE: &str = "text/event-stream";
/// The `Accept` value sent on every POST: either representation is
/// acceptable (spec §4.6/§4.7 dual-mode negotiation).
pub const ACCEPT_DUAL_MODE: &str = "application/json, text/event-stream";
