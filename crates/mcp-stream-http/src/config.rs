//! Configuration for the Streamable-HTTP server (spec §4.6).

use std::time::Duration;

use mcp_stream_streamable::StreamableConfig;

use crate::origin::OriginPolicy;

/// Server-level configuration: origin policy, session lifecycle, and the
/// SSE/EventStore settings it hands down to `mcp-stream-streamable`.
#[derive(Clone, Debug)]
pub struct HttpServerConfig {
    /// Accepted origins (spec supplement, §9).
    pub origin_policy: OriginPolicy,
    /// A session with no activity for this long is eligible for the idle
    /// sweep. Default: 30 minutes.
    pub idle_session_timeout: Duration,
    /// How often the idle sweep runs. Default: 1 minute.
    pub idle_sweep_interval: Duration,
    /// Maximum accepted request body size. Default: 1 MiB.
    pub max_body_bytes: usize,
    /// SSE/EventStore settings shared with the streamable layer.
    pub streamable: StreamableConfig,
    /// The protocol version advertised on `MCP-Protocol-Version` response
    /// headers before a session has negotiated one.
    pub default_protocol_version: &'static str,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            origin_policy: OriginPolicy::default(),
            idle_session_timeout: Duration::from_secs(30 * 60),
            idle_sweep_interval: Duration::from_secs(60),
            max_body_bytes: 1024 * 1024,
            streamable: StreamableConfig::default(),
            default_protocol_version: mcp_stream_core::PREFERRED_PROTOCOL_VERSION,
        }
    }
}
