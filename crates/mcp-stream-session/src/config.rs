//! Configuration for the session engine (spec §4.8, §4.9).

use std::time::Duration;

/// How locally-originated request ids are generated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IdStyle {
    /// A monotonic integer counter, stringified as a JSON number. The
    /// cheaper choice, and reads naturally in captured traffic.
    #[default]
    Monotonic,
    /// A random UUID v4 string. Useful when multiple independent senders
    /// share one session and a centralized counter would be a contention
    /// point.
    Uuid,
}

/// Tunables for one [`crate::Session`].
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// How locally-generated request ids are produced.
    pub id_style: IdStyle,
    /// Interval between keepalive pings. `None` disables keepalive
    /// entirely. Default: disabled (transports that want it, e.g. a
    /// long-lived stdio session, opt in explicitly).
    pub keepalive_interval: Option<Duration>,
    /// How long a keepalive ping may go unanswered before the session is
    /// closed with [`mcp_stream_core::SessionError::KeepaliveTimeout`].
    /// Default: the keepalive interval itself.
    pub keepalive_timeout: Option<Duration>,
    /// Default per-request timeout applied by [`crate::Session::send_request`]
    /// when the caller does not override it. `None` means no timeout.
    /// Default: 30 s, per spec §4.9.
    pub request_timeout: Option<Duration>,
    /// Bound on the incoming-message dispatch queue (spec §5 backpressure).
    /// Default: 64.
    pub incoming_queue_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            id_style: IdStyle::default(),
            keepalive_interval: None,
            keepalive_timeout: None,
            request_timeout: Some(Duration::from_secs(30)),
            incoming_queue_capacity: 64,
        }
    }
}

impl SessionConfig {
    /// A config with keepalive enabled at `interval`, timing out after the
    /// same interval if unanswered.
    #[must_use]
    pub fn with_keepalive(mut self, interval: Duration) -> Self {
        self.keepalive_interval = Some(interval);
        self.keepalive_timeout = Some(interval);
        self
    }

    /// Generates locally-originated request ids via UUID v4 instead of a
    /// monotonic counter.
    #[must_use]
    pub fn with_uuid_ids(mut self) -> Self {
        self.id_style = IdStyle::Uuid;
        self
    }
}
