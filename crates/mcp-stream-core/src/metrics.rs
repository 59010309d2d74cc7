//! Transport-agnostic observability counters: a structured
//! [`TransportMetrics`] snapshot shared by the HTTP server and the stdio
//! transport.
//!
//! A lock-free [`AtomicMetrics`] that every request/message path updates
//! with `Ordering::Relaxed` counters, and a serializable
//! [`TransportMetrics`] snapshot taken from it on demand.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// A serializable snapshot of a transport's traffic counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransportMetrics {
    /// Total bytes sent.
    pub bytes_sent: u64,
    /// Total bytes received.
    pub bytes_received: u64,
    /// Total messages sent.
    pub messages_sent: u64,
    /// Total messages received.
    pub messages_received: u64,
    /// Sessions currently open.
    pub active_sessions: u64,
}

/// Atomic counters backing a [`TransportMetrics`] snapshot. Every field is
/// updated with `Ordering::Relaxed`; these are traffic counters for
/// observability, not a synchronization primitive.
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
}

impl AtomicMetrics {
    /// All counters start at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one outgoing message of `bytes` length.
    pub fn record_sent(&self, bytes: usize) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Records one incoming message of `bytes` length.
    pub fn record_received(&self, bytes: usize) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Takes a snapshot, filling `active_sessions` from the caller (the
    /// session count lives in whichever session table this transport owns,
    /// not in this counter set).
    #[must_use]
    pub fn snapshot(&self, active_sessions: u64) -> TransportMetrics {
        TransportMetrics {
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            active_sessions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_starts_at_zero() {
        let metrics = AtomicMetrics::new();
        assert_eq!(metrics.snapshot(0), TransportMetrics::default());
    }

    #[test]
    fn record_sent_and_received_accumulate() {
        let metrics = AtomicMetrics::new();
        metrics.record_sent(10);
        metrics.record_sent(5);
        metrics.record_received(20);

        let snapshot = metrics.snapshot(3);
        assert_eq!(snapshot.messages_sent, 2);
        assert_eq!(snapshot.bytes_sent, 15);
        assert_eq!(snapshot.messages_received, 1);
        assert_eq!(snapshot.bytes_received, 20);
        assert_eq!(snapshot.active_sessions, 3);
    }
}
