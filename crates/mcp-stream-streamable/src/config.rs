//! Configuration for the SSE/EventStore layer (spec §4.2–§4.4).

use std::time::Duration;

/// Configuration shared by the `EventStore` and the stream writers built on
/// top of it.
#[derive(Clone, Debug)]
pub struct StreamableConfig {
    /// Global byte cap across every stream's retained events. Oldest events
    /// (across all sessions) are evicted first once this is exceeded.
    /// Default: 10 MiB.
    pub max_total_event_bytes: usize,

    /// Maximum size of a single SSE `data:` payload before it is rejected
    /// rather than buffered. Default: 1 MiB.
    pub max_event_bytes: usize,

    /// Interval at which a resumable stream writer sends a comment line to
    /// keep intermediaries from timing out an idle connection.
    /// Default: 15 s.
    pub keepalive_interval: Duration,

    /// `retry:` value suggested to clients on the prime event.
    /// Default: 3000 ms.
    pub retry_interval_ms: u32,
}

impl Default for StreamableConfig {
    fn default() -> Self {
        Self {
            max_total_event_bytes: 10 * 1024 * 1024,
            max_event_bytes: 1024 * 1024,
            keepalive_interval: Duration::from_secs(15),
            retry_interval_ms: 3_000,
        }
    }
}

impl StreamableConfig {
    /// A configuration with small limits, for fast unit tests that exercise
    /// eviction without allocating megabytes of fixture data.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            max_total_event_bytes: 4096,
            max_event_bytes: 1024,
            keepalive_interval: Duration::from_millis(50),
            retry_interval_ms: 100,
        }
    }
}
