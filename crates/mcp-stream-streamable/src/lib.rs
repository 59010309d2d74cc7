//! SSE event codec, resumable [`EventStore`] and [`StreamWriter`] for the
//! Streamable-HTTP transport (spec §4.2–§4.4).

mod config;
mod event_store;
mod sse;
mod writer;

pub use config::StreamableConfig;
pub use event_store::{EventId, EventStore, StoredEvent};
pub use sse::{encode as encode_sse, encode_comment, encode_keepalive, SseDecoder, SseEvent};
pub use writer::{
    BoxFuture, ResumableStreamWriter, SimpleStreamWriter, StreamWriter, StreamWriterFactory,
};
