//! Configuration for the Streamable-HTTP client (spec §4.7).

use std::time::Duration;

use url::Url;

/// Jittered exponential backoff for the standalone GET-SSE reconnect loop
/// (spec §4.7: "jittered exponential backoff bounded by a configured
/// attempt ceiling").
#[derive(Clone, Debug)]
pub struct ReconnectConfig {
    /// Delay before the first retry. Default: 1 s.
    pub initial_backoff: Duration,
    /// Growth factor applied per attempt. Default: 1.5.
    pub multiplier: f64,
    /// Ceiling the backoff never exceeds, jitter included. Default: 30 s.
    pub max_backoff: Duration,
    /// Stop reconnecting after this many attempts. Default: unlimited.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            multiplier: 1.5,
            max_backoff: Duration::from_secs(30),
            max_attempts: None,
        }
    }
}

impl ReconnectConfig {
    /// The delay to sleep before attempt number `attempt` (0-based), or
    /// `None` once `max_attempts` has been exhausted.
    ///
    /// Full-jitter backoff (spec §4.7: "jitter ∈ [0, backoff]"): the
    /// returned delay is drawn uniformly from `[0, capped_backoff]`, not
    /// added on top of it, so a reconnect can also fire immediately rather
    /// than always waiting out the full computed backoff.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if attempt >= max {
                return None;
            }
        }
        let uncapped = self.initial_backoff.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = uncapped.min(self.max_backoff.as_secs_f64());
        let jittered = capped * fastrand::f64();
        Some(Duration::from_secs_f64(jittered))
    }
}

/// Tunables for one [`crate::StreamableHttpTransport`].
#[derive(Clone, Debug)]
pub struct StreamableHttpClientConfig {
    /// The server's `/mcp` endpoint.
    pub base_url: Url,
    /// Per-request timeout applied to both POST and the standalone GET. Default: 30 s.
    pub request_timeout: Duration,
    /// Reconnect policy for the standalone GET-SSE stream.
    pub reconnect: ReconnectConfig,
    /// Advertised on every request's `MCP-Protocol-Version` header.
    pub protocol_version: &'static str,
    /// A session id to resume, used only when connecting with
    /// [`mcp_stream_transport_traits::ConnectMode::Resume`]. `Transport::connect`
    /// itself carries no session-id parameter, so this is how a caller
    /// threads one through.
    pub resume_session_id: Option<String>,
    /// Extra headers sent on every request (e.g. bearer auth), applied
    /// after the protocol headers so a caller cannot clobber them.
    pub extra_headers: Vec<(String, String)>,
}

impl StreamableHttpClientConfig {
    /// A config pointed at `base_url` with every other field defaulted.
    ///
    /// # Errors
    /// Returns [`url::ParseError`] wrapped by the caller if `base_url` does
    /// not parse; this constructor takes an already-parsed [`Url`].
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            request_timeout: Duration::from_secs(30),
            reconnect: ReconnectConfig::default(),
            protocol_version: mcp_stream_core::PREFERRED_PROTOCOL_VERSION,
            resume_session_id: None,
            extra_headers: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_is_capped() {
        let config = ReconnectConfig {
            multiplier: 2.0,
            max_backoff: Duration::from_secs(10),
            ..ReconnectConfig::default()
        };
        let d0 = config.delay_for(0).unwrap();
        let d3 = config.delay_for(3).unwrap();
        assert!(d0 <= Duration::from_secs(1));
        assert!(d3 <= Duration::from_secs(10));
    }

    #[test]
    fn max_attempts_eventually_stops() {
        let config = ReconnectConfig {
            max_attempts: Some(2),
            ..ReconnectConfig::default()
        };
        assert!(config.delay_for(0).is_some());
        assert!(config.delay_for(1).is_some());
        assert!(config.delay_for(2).is_none());
    }
}
