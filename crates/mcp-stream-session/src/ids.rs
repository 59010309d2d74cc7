//! Local request id allocation (spec §4.8: "allocate a fresh id").

use std::sync::atomic::{AtomicI64, Ordering};

use mcp_stream_wire::RequestId;

use crate::config::IdStyle;

/// Generates ids for requests this side originates, in the style the
/// session was configured with.
#[derive(Debug)]
pub struct RequestIdAllocator {
    style: IdStyle,
    counter: AtomicI64,
}

impl RequestIdAllocator {
    /// Builds an allocator in `style`, counting from 1 if monotonic.
    #[must_use]
    pub fn new(style: IdStyle) -> Self {
        Self {
            style,
            counter: AtomicI64::new(1),
        }
    }

    /// Produces the next id. Monotonic ids are unique for the lifetime of
    /// this allocator; UUID ids are unique with overwhelming probability.
    #[must_use]
    pub fn next(&self) -> RequestId {
        match self.style {
            IdStyle::Monotonic => RequestId::Number(self.counter.fetch_add(1, Ordering::Relaxed)),
            IdStyle::Uuid => RequestId::String(uuid::Uuid::new_v4().to_string()),
        }
    }
}
