//! Header name constants used by the Streamable-HTTP transport (spec §6.2).

/// Carries the session id a client must echo on every subsequent request.
pub const MCP_SESSION_ID: &str = "Mcp-Session-Id";
/// Sent on a GET reconnect to resume replay after this event id.
pub const LAST_EVENT_ID: &str = "Last-Event-ID";
/// Sent on every response so clients can detect a version mismatch early.
pub const MCP_PROTOCOL_VERSION: &str = "MCP-Protocol-Version";
/// `application/json`.
pub const CONTENT_TYPE_JSON: &str = "application/json";
/// `text/event-stream`.
pub const CONTENT_TYPE_SSE: &str = "text/event-stream";
