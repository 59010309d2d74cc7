//! Per-(session, stream) resumable event buffer (spec §4.3).
//!
//! Every appended event gets a dense, monotonically increasing index within
//! its stream, starting at 1. A single global byte cap governs retention
//! across every stream in the store; once exceeded, the oldest events
//! anywhere (not just in the stream that just grew) are evicted first, so
//! one chatty stream can starve another's replay window — callers that need
//! isolation should run one store per session instead of sharing.

use std::collections::{BTreeMap, HashMap, VecDeque};

use mcp_stream_core::{McpError, ResourceError, Result, SessionError};
use parking_lot::Mutex;

use crate::config::StreamableConfig;

/// One retained event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEvent {
    /// Dense, 1-based index within its stream.
    pub index: u64,
    /// The encoded message payload (already serialized; the store does not
    /// interpret it).
    pub data: String,
}

/// An event id as it appears in `id:` / `Last-Event-ID`: `{stream_id}_{index}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventId {
    /// The stream the event belongs to.
    pub stream_id: String,
    /// The event's dense index within that stream.
    pub index: u64,
}

impl EventId {
    /// Formats as `{stream_id}_{index}`.
    #[must_use]
    pub fn to_wire_id(&self) -> String {
        format!("{}_{}", self.stream_id, self.index)
    }

    /// Parses a `Last-Event-ID` value. The stream id is everything before
    /// the final `_`, so stream ids containing `_` are still unambiguous.
    ///
    /// # Errors
    /// Returns [`ResourceError::InvalidEventId`] if there is no `_` or the
    /// suffix after it is not a valid `u64`.
    pub fn parse(raw: &str) -> std::result::Result<Self, ResourceError> {
        let (stream_id, index) = raw
            .rsplit_once('_')
            .ok_or(ResourceError::InvalidEventId)?;
        let index: u64 = index.parse().map_err(|_| ResourceError::InvalidEventId)?;
        if stream_id.is_empty() {
            return Err(ResourceError::InvalidEventId);
        }
        Ok(Self {
            stream_id: stream_id.to_string(),
            index,
        })
    }
}

#[derive(Debug)]
struct StreamState {
    next_index: u64,
    floor: u64,
    events: BTreeMap<u64, StoredEvent>,
}

impl StreamState {
    fn new() -> Self {
        Self {
            next_index: 1,
            floor: 0,
            events: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
struct StreamKey {
    session_id: String,
    stream_id: String,
}

#[derive(Debug)]
struct Inner {
    streams: HashMap<StreamKey, StreamState>,
    total_bytes: usize,
    eviction_order: VecDeque<(StreamKey, u64, usize)>,
}

/// An in-memory, per-(session, stream) event buffer with global byte-cap
/// FIFO eviction.
pub struct EventStore {
    inner: Mutex<Inner>,
    max_total_bytes: usize,
}

impl EventStore {
    /// Builds an empty store honoring `config.max_total_event_bytes`.
    #[must_use]
    pub fn new(config: &StreamableConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                streams: HashMap::new(),
                total_bytes: 0,
                eviction_order: VecDeque::new(),
            }),
            max_total_bytes: config.max_total_event_bytes,
        }
    }

    /// Registers `stream_id` under `session_id` if it does not already
    /// exist, and returns the index of the last retained event (0 if the
    /// stream is new or fully evicted), for a resumable writer's "prime"
    /// event.
    pub fn open(&self, session_id: &str, stream_id: &str) -> u64 {
        let mut inner = self.inner.lock();
        let key = StreamKey {
            session_id: session_id.to_string(),
            stream_id: stream_id.to_string(),
        };
        let state = inner.streams.entry(key).or_insert_with(StreamState::new);
        state.events.keys().next_back().copied().unwrap_or(state.floor)
    }

    /// Appends `data` to `stream_id` under `session_id`, assigning it the
    /// next dense index, and evicts the globally oldest retained events
    /// until the store is back under its byte cap.
    pub fn append(&self, session_id: &str, stream_id: &str, data: String) -> StoredEvent {
        let mut inner = self.inner.lock();
        let key = StreamKey {
            session_id: session_id.to_string(),
            stream_id: stream_id.to_string(),
        };
        let byte_len = data.len();
        let index = {
            let state = inner.streams.entry(key.clone()).or_insert_with(StreamState::new);
            let index = state.next_index;
            state.next_index += 1;
            state.events.insert(index, StoredEvent { index, data: data.clone() });
            index
        };
        inner.total_bytes += byte_len;
        inner.eviction_order.push_back((key, index, byte_len));
        self.evict_until_under_cap(&mut inner);
        StoredEvent { index, data }
    }

    fn evict_until_under_cap(&self, inner: &mut Inner) {
        while inner.total_bytes > self.max_total_bytes {
            let Some((key, index, byte_len)) = inner.eviction_order.pop_front() else {
                break;
            };
            if let Some(state) = inner.streams.get_mut(&key) {
                if state.events.remove(&index).is_some() {
                    inner.total_bytes = inner.total_bytes.saturating_sub(byte_len);
                    if index > state.floor {
                        state.floor = index;
                    }
                }
                // else: already evicted by a SessionClosed purge; the byte
                // count for it was already subtracted there, so skip.
            }
        }
    }

    /// Returns every retained event in `stream_id` with index strictly
    /// greater than `after_index`.
    ///
    /// # Errors
    /// - [`McpError::Session`]`(`[`SessionError::SessionNotFound`]`)` if no
    ///   such stream has ever been opened.
    /// - [`McpError::Resource`]`(`[`ResourceError::EventsPurged`]`)` if
    ///   `after_index` refers to an event no longer retained.
    pub fn after(&self, session_id: &str, stream_id: &str, after_index: u64) -> Result<Vec<StoredEvent>> {
        let inner = self.inner.lock();
        let key = StreamKey {
            session_id: session_id.to_string(),
            stream_id: stream_id.to_string(),
        };
        let Some(state) = inner.streams.get(&key) else {
            return Err(McpError::Session(SessionError::SessionNotFound));
        };
        if after_index < state.floor {
            return Err(McpError::Resource(ResourceError::EventsPurged));
        }
        Ok(state
            .events
            .range((after_index + 1)..)
            .map(|(_, event)| event.clone())
            .collect())
    }

    /// Drops every stream belonging to `session_id`, freeing their bytes
    /// immediately. Subsequent [`EventStore::after`] calls for those streams
    /// return `SessionNotFound`.
    pub fn session_closed(&self, session_id: &str) {
        let mut inner = self.inner.lock();
        let keys: Vec<StreamKey> = inner
            .streams
            .keys()
            .filter(|k| k.session_id == session_id)
            .cloned()
            .collect();
        for key in keys {
            if let Some(state) = inner.streams.remove(&key) {
                let freed: usize = state.events.values().map(|e| e.data.len()).sum();
                inner.total_bytes = inner.total_bytes.saturating_sub(freed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_assigns_dense_monotonic_indices() {
        let store = EventStore::new(&StreamableConfig::default());
        let a = store.append("s1", "stream-a", "one".into());
        let b = store.append("s1", "stream-a", "two".into());
        assert_eq!(a.index, 1);
        assert_eq!(b.index, 2);
    }

    #[test]
    fn streams_have_independent_indices() {
        let store = EventStore::new(&StreamableConfig::default());
        let a = store.append("s1", "stream-a", "x".into());
        let b = store.append("s1", "stream-b", "y".into());
        assert_eq!(a.index, 1);
        assert_eq!(b.index, 1);
    }

    #[test]
    fn after_returns_events_strictly_newer() {
        let store = EventStore::new(&StreamableConfig::default());
        store.append("s1", "a", "1".into());
        store.append("s1", "a", "2".into());
        store.append("s1", "a", "3".into());
        let events = store.after("s1", "a", 1).unwrap();
        assert_eq!(events.iter().map(|e| e.index).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn after_unknown_stream_is_session_not_found() {
        let store = EventStore::new(&StreamableConfig::default());
        let err = store.after("s1", "nope", 0).unwrap_err();
        assert!(matches!(err, McpError::Session(SessionError::SessionNotFound)));
    }

    #[test]
    fn eviction_frees_bytes_under_global_cap() {
        let config = StreamableConfig::minimal(); // 4096 byte cap
        let store = EventStore::new(&config);
        for _ in 0..200 {
            store.append("s1", "a", "x".repeat(64));
        }
        let inner = store.inner.lock();
        assert!(inner.total_bytes <= config.max_total_event_bytes);
    }

    #[test]
    fn after_index_older_than_floor_is_events_purged() {
        let config = StreamableConfig::minimal();
        let store = EventStore::new(&config);
        for _ in 0..200 {
            store.append("s1", "a", "x".repeat(64));
        }
        let err = store.after("s1", "a", 0).unwrap_err();
        assert!(matches!(err, McpError::Resource(ResourceError::EventsPurged)));
    }

    #[test]
    fn session_closed_frees_its_streams() {
        let store = EventStore::new(&StreamableConfig::default());
        store.append("s1", "a", "1".into());
        store.session_closed("s1");
        let err = store.after("s1", "a", 0).unwrap_err();
        assert!(matches!(err, McpError::Session(SessionError::SessionNotFound)));
    }

    #[test]
    fn open_reports_last_retained_index() {
        let store = EventStore::new(&StreamableConfig::default());
        assert_eq!(store.open("s1", "a"), 0);
        store.append("s1", "a", "1".into());
        store.append("s1", "a", "2".into());
        assert_eq!(store.open("s1", "a"), 2);
    }

    #[test]
    fn event_id_round_trips_through_wire_format() {
        let id = EventId {
            stream_id: "primary_stream".into(),
            index: 42,
        };
        let wire = id.to_wire_id();
        let parsed = EventId::parse(&wire).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn event_id_parse_rejects_garbage() {
        assert!(EventId::parse("no-underscore").is_err());
        assert!(EventId::parse("stream_notanumber").is_err());
    }
}
