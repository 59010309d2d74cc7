//! `StreamWriter`: the write side of an SSE stream (spec §4.4).
//!
//! Two implementations share one trait: [`SimpleStreamWriter`] writes
//! straight to its sink with no replay support, and
//! [`ResumableStreamWriter`] appends every message to an [`EventStore`]
//! first so a reconnecting client can replay from its `Last-Event-ID`. Both
//! are built through [`StreamWriterFactory`] so callers never match on which
//! variant they got.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use mcp_stream_core::{McpError, ResourceError, Result};
use mcp_stream_wire::{encode as encode_message, Message};
use tokio::sync::mpsc;

use crate::config::StreamableConfig;
use crate::event_store::EventStore;
use crate::sse::{self, SseEvent};

/// A boxed future, kept local so this crate does not need to depend on
/// `mcp-stream-transport-traits` just for this alias.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The write side of one SSE stream.
pub trait StreamWriter: Send {
    /// Called once before the first [`StreamWriter::write`]. A resumable
    /// writer uses this to emit a "prime" event carrying the last retained
    /// event id, so a client that immediately disconnects still has a
    /// `Last-Event-ID` to reconnect with.
    fn init(&mut self) -> BoxFuture<'_, Result<()>>;

    /// Encodes `message` as one SSE event and delivers it to the sink.
    fn write(&mut self, message: &Message) -> BoxFuture<'_, Result<()>>;

    /// Flushes and closes the underlying sink. Idempotent.
    fn close(&mut self) -> BoxFuture<'_, Result<()>>;

    /// `true` if this writer can serve [`EventStore::after`]-based replay.
    fn is_resumable(&self) -> bool;
}

fn send_chunk(sink: &mpsc::UnboundedSender<String>, chunk: String) -> Result<()> {
    sink.send(chunk)
        .map_err(|_| McpError::transport("SSE sink receiver dropped"))
}

fn check_event_size(data: &str, max_event_bytes: usize) -> Result<()> {
    if data.len() > max_event_bytes {
        return Err(McpError::Resource(ResourceError::EventTooLarge));
    }
    Ok(())
}

/// A non-resumable stream writer: every message is encoded and pushed to
/// the sink directly, with no id and no backing store.
pub struct SimpleStreamWriter {
    sink: mpsc::UnboundedSender<String>,
    max_event_bytes: usize,
}

impl SimpleStreamWriter {
    /// Wraps `sink`, the channel an HTTP response body reads SSE chunks
    /// from.
    #[must_use]
    pub fn new(sink: mpsc::UnboundedSender<String>) -> Self {
        Self::with_config(sink, &StreamableConfig::default())
    }

    /// Wraps `sink`, enforcing `config.max_event_bytes` on every write.
    #[must_use]
    pub fn with_config(sink: mpsc::UnboundedSender<String>, config: &StreamableConfig) -> Self {
        Self {
            sink,
            max_event_bytes: config.max_event_bytes,
        }
    }
}

impl StreamWriter for SimpleStreamWriter {
    fn init(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn write(&mut self, message: &Message) -> BoxFuture<'_, Result<()>> {
        let encoded = encode_message(message);
        let max_event_bytes = self.max_event_bytes;
        Box::pin(async move {
            let data = encoded?;
            check_event_size(&data, max_event_bytes)?;
            send_chunk(&self.sink, sse::encode(&SseEvent::message(data)))
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn is_resumable(&self) -> bool {
        false
    }
}

/// A resumable stream writer: every message is appended to the shared
/// [`EventStore`] before being encoded, so its SSE `id:` field is a durable
/// replay cursor.
pub struct ResumableStreamWriter {
    store: Arc<EventStore>,
    session_id: String,
    stream_id: String,
    sink: mpsc::UnboundedSender<String>,
    retry_ms: u32,
    max_event_bytes: usize,
}

impl ResumableStreamWriter {
    /// Builds a writer for `stream_id` under `session_id`, backed by
    /// `store` and delivering encoded chunks to `sink`.
    #[must_use]
    pub fn new(
        store: Arc<EventStore>,
        session_id: impl Into<String>,
        stream_id: impl Into<String>,
        sink: mpsc::UnboundedSender<String>,
        config: &StreamableConfig,
    ) -> Self {
        Self {
            store,
            session_id: session_id.into(),
            stream_id: stream_id.into(),
            sink,
            retry_ms: config.retry_interval_ms,
            max_event_bytes: config.max_event_bytes,
        }
    }

    /// Replays every event after `after_index` to `sink`, for resuming a
    /// GET reconnect at the point the client's `Last-Event-ID` named.
    ///
    /// # Errors
    /// Propagates [`ResourceError::EventsPurged`] from the backing store if
    /// `after_index` is older than the retained window.
    pub fn replay_from(&self, after_index: u64) -> Result<()> {
        let events = self.store.after(&self.session_id, &self.stream_id, after_index)?;
        for event in events {
            let wire_id = format!("{}_{}", self.stream_id, event.index);
            send_chunk(&self.sink, sse::encode(&SseEvent::with_id(wire_id, event.data)))?;
        }
        Ok(())
    }
}

impl StreamWriter for ResumableStreamWriter {
    fn init(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let last_index = self.store.open(&self.session_id, &self.stream_id);
            let prime_id = format!("{}_{}", self.stream_id, last_index);
            let prime = SseEvent {
                id: Some(prime_id),
                event: Some("prime".to_string()),
                data: String::new(),
                retry: Some(self.retry_ms),
            };
            send_chunk(&self.sink, sse::encode(&prime))
        })
    }

    fn write(&mut self, message: &Message) -> BoxFuture<'_, Result<()>> {
        let encoded = encode_message(message);
        let max_event_bytes = self.max_event_bytes;
        Box::pin(async move {
            let data = encoded?;
            check_event_size(&data, max_event_bytes)?;
            let stored = self.store.append(&self.session_id, &self.stream_id, data);
            let wire_id = format!("{}_{}", self.stream_id, stored.index);
            send_chunk(&self.sink, sse::encode(&SseEvent::with_id(wire_id, stored.data)))
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn is_resumable(&self) -> bool {
        true
    }
}

/// Builds the right [`StreamWriter`] variant for a stream, so callers never
/// need to know which one they hold.
pub struct StreamWriterFactory {
    store: Arc<EventStore>,
    config: StreamableConfig,
}

impl StreamWriterFactory {
    /// Builds a factory sharing `store` across every resumable writer it
    /// produces.
    #[must_use]
    pub fn new(store: Arc<EventStore>, config: StreamableConfig) -> Self {
        Self { store, config }
    }

    /// Builds a non-resumable writer over `sink`.
    #[must_use]
    pub fn simple(&self, sink: mpsc::UnboundedSender<String>) -> SimpleStreamWriter {
        SimpleStreamWriter::with_config(sink, &self.config)
    }

    /// Builds a resumable writer for `stream_id` under `session_id`, backed
    /// by this factory's shared [`EventStore`].
    #[must_use]
    pub fn resumable(
        &self,
        session_id: impl Into<String>,
        stream_id: impl Into<String>,
        sink: mpsc::UnboundedSender<String>,
    ) -> ResumableStreamWriter {
        ResumableStreamWriter::new(self.store.clone(), session_id, stream_id, sink, &self.config)
    }
}
