//! Shared error taxonomy and protocol constants for the `mcp-stream` session
//! engine and its transports.
//!
//! This crate has no transport- or wire-format-specific knowledge; it exists
//! so that `mcp-stream-wire`, `mcp-stream-transport-traits`,
//! `mcp-stream-streamable`, `mcp-stream-stdio`, `mcp-stream-http{,-client}`
//! and `mcp-stream-session` can all report errors through one `McpError`
//! taxonomy instead of each crate inventing its own.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

pub mod metrics;

/// Protocol versions this implementation can negotiate, newest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] =
    &["2025-11-25", "2025-06-18", "2025-03-26", "2024-11-05"];

/// The protocol version this implementation prefers to offer.
pub const PREFERRED_PROTOCOL_VERSION: &str = SUPPORTED_PROTOCOL_VERSIONS[0];

/// Returns `true` if `version` is one this implementation can negotiate.
#[must_use]
pub fn is_supported_protocol_version(version: &str) -> bool {
    SUPPORTED_PROTOCOL_VERSIONS.contains(&version)
}

/// The error taxonomy of §7: every error surfaced by the session engine or
/// its transports belongs to exactly one of these kinds.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum McpError {
    /// Connection refused, broken pipe, EOF, transient HTTP status.
    #[error("transport error: {0}")]
    Transport(String),

    /// Parse error, malformed envelope, missing required field, unsupported
    /// version. Fatal to the session that encounters it.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The peer's handler returned an error, or a typed "tool result error".
    /// Carries a JSON-RPC error code/message pair so it can be packaged into
    /// a response without losing information.
    #[error("application error [{code}]: {message}")]
    Application {
        /// JSON-RPC error code.
        code: i32,
        /// Human-readable error message.
        message: String,
        /// Optional structured error payload.
        data: Option<serde_json::Value>,
    },

    /// The caller cancelled an in-flight request.
    #[error("request cancelled: {0}")]
    Cancelled(String),

    /// A request-level timeout fired; distinct from cancellation.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// EventStore / StreamWriter resource errors.
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Session-lifecycle errors.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// §4.3 / §4.4 resource-layer errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceError {
    /// The requested replay index is older than retained history.
    #[error("events purged: replay index is no longer retained")]
    EventsPurged,
    /// The response could not be put into streaming mode (e.g. flush failed).
    #[error("streaming unsupported by this response")]
    StreamingUnsupported,
    /// Resumption was requested but the writer is not resumable.
    #[error("replay unsupported by this stream writer")]
    ReplayUnsupported,
    /// `Last-Event-ID` did not parse as `<streamID>_<index>`.
    #[error("invalid Last-Event-ID")]
    InvalidEventId,
    /// An outgoing message's encoded `data:` payload exceeds the configured
    /// per-event cap.
    #[error("event payload exceeds the configured size limit")]
    EventTooLarge,
}

/// §4.8 / §6.2 session-layer errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// `Mcp-Session-Id` did not match any known session.
    #[error("session not found")]
    SessionNotFound,
    /// Server asserted a different session id than the one already latched.
    #[error("session id mismatch")]
    SessionIdMismatch,
    /// A keepalive ping was not answered before the next tick.
    #[error("keepalive timeout")]
    KeepaliveTimeout,
    /// The session (or its transport) has already been closed.
    #[error("connection closed")]
    ConnectionClosed,
    /// The peer's negotiated protocol version is not one we support.
    #[error("unsupported protocol version: {0}")]
    UnsupportedProtocolVersion(String),
}

impl McpError {
    /// Shorthand for [`McpError::Transport`].
    pub fn transport(msg: impl fmt::Display) -> Self {
        Self::Transport(msg.to_string())
    }

    /// Shorthand for [`McpError::Protocol`].
    pub fn protocol(msg: impl fmt::Display) -> Self {
        Self::Protocol(msg.to_string())
    }

    /// Shorthand for [`McpError::Application`] with no structured data.
    pub fn application(code: i32, message: impl Into<String>) -> Self {
        Self::Application {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// `true` if this error kind should terminate the owning session.
    #[must_use]
    pub fn is_fatal_to_session(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::Protocol(_)
                | Self::Session(SessionError::KeepaliveTimeout)
                | Self::Session(SessionError::UnsupportedProtocolVersion(_))
                | Self::Session(SessionError::ConnectionClosed)
        )
    }
}

/// Convenience alias used throughout the `mcp-stream` crates.
pub type Result<T> = std::result::Result<T, McpError>;

/// Standard JSON-RPC 2.0 error codes (§3).
pub mod jsonrpc_error_codes {
    /// Invalid JSON was received.
    pub const PARSE_ERROR: i32 = -32700;
    /// The JSON sent is not a valid request object.
    pub const INVALID_REQUEST: i32 = -32600;
    /// The method does not exist / is not available.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid method parameter(s).
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Start of the MCP-domain error code range (-32000..-32005).
    pub const DOMAIN_RANGE_START: i32 = -32005;
    /// End (inclusive) of the MCP-domain error code range.
    pub const DOMAIN_RANGE_END: i32 = -32000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_versions_contains_all_negotiable_versions() {
        for v in [
            "2025-11-25",
            "2025-06-18",
            "2025-03-26",
            "2024-11-05",
        ] {
            assert!(is_supported_protocol_version(v));
        }
        assert!(!is_supported_protocol_version("1999-01-01"));
    }

    #[test]
    fn preferred_is_newest() {
        assert_eq!(PREFERRED_PROTOCOL_VERSION, "2025-11-25");
    }

    #[test]
    fn transport_and_protocol_errors_are_fatal() {
        assert!(McpError::transport("boom").is_fatal_to_session());
        assert!(McpError::protocol("boom").is_fatal_to_session());
        assert!(!McpError::application(-32000, "tool failed").is_fatal_to_session());
        assert!(!McpError::Cancelled("timeout".into()).is_fatal_to_session());
    }

    #[test]
    fn keepalive_timeout_is_fatal() {
        let err: McpError = SessionError::KeepaliveTimeout.into();
        assert!(err.is_fatal_to_session());
    }
}
