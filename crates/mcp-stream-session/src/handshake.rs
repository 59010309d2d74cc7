//! `initialize` handshake types (spec §4.8, §6.4).
//!
//! The domain schema of capabilities is explicitly out of scope (spec §1);
//! these carry capabilities as opaque JSON so the engine can negotiate the
//! protocol version without depending on a capabilities type it does not
//! own.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifies the connecting client in an `initialize` request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Implementation name, e.g. `"my-mcp-client"`.
    pub name: String,
    /// Implementation version.
    pub version: String,
}

/// Identifies the serving implementation in an `initialize` result.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Implementation name.
    pub name: String,
    /// Implementation version.
    pub version: String,
}

/// The `params` of an `initialize` request (spec §4.8).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InitializeParams {
    /// The protocol version this side prefers to negotiate.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Declared capabilities, opaque to the session engine.
    pub capabilities: Value,
    #[serde(rename = "clientInfo")]
    /// The connecting client's identity.
    pub client_info: ClientInfo,
}

/// The `result` of an `initialize` response (spec §4.8, §6.4).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InitializeResult {
    /// The protocol version the server has settled on.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// The serving implementation's identity.
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
    /// Declared server capabilities, opaque to the session engine.
    pub capabilities: Value,
    /// Freeform usage guidance for the connecting client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// The well-known method name for the handshake request.
pub const METHOD_INITIALIZE: &str = "initialize";
/// The well-known method name for the handshake's completing notification.
pub const METHOD_INITIALIZED: &str = "notifications/initialized";
/// The well-known method name for a keepalive ping.
pub const METHOD_PING: &str = "ping";
/// The well-known method name for the cancellation notification.
pub const METHOD_CANCELLED: &str = "notifications/cancelled";

/// The `params` of a `notifications/cancelled` notification (spec §4.9,
/// enriched per SPEC_FULL.md with a `reason` field the distilled spec only
/// implies).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CancelledParams {
    /// The id of the request being cancelled.
    #[serde(rename = "requestId")]
    pub request_id: mcp_stream_wire::RequestId,
    /// A human-readable reason, best-effort and never required for
    /// correctness.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
