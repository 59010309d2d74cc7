//! Per-session bookkeeping for the Streamable-HTTP server (spec §4.6).
//!
//! The session map itself is a `DashMap` (per §5's "HTTP session map by a
//! concurrent map"); each entry's `last_activity` uses a plain `Mutex`
//! since updates are rare, quick, and never held across an `.await`.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use mcp_stream_core::{McpError, Result, SessionError};

/// Metadata tracked for one Streamable-HTTP session.
pub struct SessionEntry {
    created_at: Instant,
    last_activity: Mutex<Instant>,
    protocol_version: Mutex<Option<String>>,
}

impl SessionEntry {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            created_at: now,
            last_activity: Mutex::new(now),
            protocol_version: Mutex::new(None),
        }
    }

    fn touch(&self) {
        *self.last_activity.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_activity
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .elapsed()
    }
}

/// The server's concurrent session table.
pub struct SessionRegistry {
    sessions: DashMap<String, SessionEntry>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Creates a new session with a fresh id and returns it.
    #[must_use]
    pub fn create(&self) -> String {
        let id = format!("mcp-{}", uuid::Uuid::new_v4().simple());
        self.sessions.insert(id.clone(), SessionEntry::new());
        id
    }

    /// Updates `session_id`'s `last_activity` timestamp.
    ///
    /// # Errors
    /// Returns [`SessionError::SessionNotFound`] if no such session exists.
    pub fn touch(&self, session_id: &str) -> Result<()> {
        match self.sessions.get(session_id) {
            Some(entry) => {
                entry.touch();
                Ok(())
            }
            None => Err(McpError::Session(SessionError::SessionNotFound)),
        }
    }

    /// `true` if `session_id` is known and not yet destroyed.
    #[must_use]
    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Records the negotiated protocol version for `session_id`.
    pub fn set_protocol_version(&self, session_id: &str, version: impl Into<String>) {
        if let Some(entry) = self.sessions.get(session_id) {
            *entry
                .protocol_version
                .lock()
                .unwrap_or_else(|e| e.into_inner()) = Some(version.into());
        }
    }

    /// The negotiated protocol version for `session_id`, if any.
    #[must_use]
    pub fn protocol_version(&self, session_id: &str) -> Option<String> {
        self.sessions
            .get(session_id)
            .and_then(|entry| entry.protocol_version.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    /// Removes `session_id` from the table. Idempotent.
    pub fn destroy(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    /// Removes every session idle for longer than `idle_timeout`, returning
    /// their ids so callers can release any associated resources (e.g. the
    /// backing `EventStore`'s streams).
    pub fn sweep_idle(&self, idle_timeout: Duration) -> Vec<String> {
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.idle_for() > idle_timeout)
            .map(|entry| entry.key().clone())
            .collect();
        for id in &expired {
            self.sessions.remove(id);
        }
        expired
    }

    /// How old `session_id` is, if it exists.
    #[must_use]
    pub fn age(&self, session_id: &str) -> Option<Duration> {
        self.sessions.get(session_id).map(|e| e.created_at.elapsed())
    }

    /// Number of sessions currently tracked.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.sessions.len() as u64
    }

    /// `true` if no sessions are currently tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_returns_a_prefixed_id() {
        let registry = SessionRegistry::new();
        let id = registry.create();
        assert!(id.starts_with("mcp-"));
        assert!(registry.contains(&id));
    }

    #[test]
    fn touch_unknown_session_errors() {
        let registry = SessionRegistry::new();
        assert!(registry.touch("nope").is_err());
    }

    #[test]
    fn destroy_removes_the_session() {
        let registry = SessionRegistry::new();
        let id = registry.create();
        registry.destroy(&id);
        assert!(!registry.contains(&id));
    }

    #[test]
    fn sweep_idle_removes_only_stale_sessions() {
        let registry = SessionRegistry::new();
        let stale = registry.create();
        std::thread::sleep(Duration::from_millis(20));
        let fresh = registry.create();

        let removed = registry.sweep_idle(Duration::from_millis(10));
        assert_eq!(removed, vec![stale.clone()]);
        assert!(!registry.contains(&stale));
        assert!(registry.contains(&fresh));
    }

    #[test]
    fn protocol_version_round_trips() {
        let registry = SessionRegistry::new();
        let id = registry.create();
        assert_eq!(registry.protocol_version(&id), None);
        registry.set_protocol_version(&id, "2025-11-25");
        assert_eq!(registry.protocol_version(&id).as_deref(), Some("2025-11-25"));
    }
}
