//! The incoming-request cancel table: `id -> cancel handle` (spec §3
//! Session, §4.9).
//!
//! Receipt of `notifications/cancelled` for an id cancels the
//! [`tokio_util::sync::CancellationToken`] handed to that request's domain
//! handler; the handler is expected to observe it and return promptly
//! (spec §4.9). Handlers that ignore cancellation still run to completion —
//! this table only signals, it never forcibly aborts a handler task.

use dashmap::DashMap;
use mcp_stream_wire::RequestId;
use tokio_util::sync::CancellationToken;

/// `id -> cancel handle` for requests this session is currently servicing.
#[derive(Default)]
pub struct IncomingTable {
    handles: DashMap<RequestId, CancellationToken>,
}

impl IncomingTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `id` as in-flight, deriving its cancellation token as a
    /// child of `parent` (the session's own lifetime token), so closing the
    /// session cancels every handler still running without the incoming
    /// table having to enumerate them separately.
    #[must_use]
    pub fn register(&self, id: RequestId, parent: &CancellationToken) -> CancellationToken {
        let token = parent.child_token();
        self.handles.insert(id, token.clone());
        token
    }

    /// Cancels the handle for `id`, if it is still in-flight. Returns
    /// `true` if a handler was actually signalled.
    pub fn cancel(&self, id: &RequestId) -> bool {
        match self.handles.get(id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Removes `id`'s entry once its handler has produced a response (or
    /// been cancelled and returned without one). Idempotent.
    pub fn remove(&self, id: &RequestId) {
        self.handles.remove(id);
    }

    /// Number of requests currently being handled.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// `true` if no requests are currently being handled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_signals_the_registered_token() {
        let table = IncomingTable::new();
        let parent = CancellationToken::new();
        let token = table.register(RequestId::Number(1), &parent);
        assert!(table.cancel(&RequestId::Number(1)));
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_of_unknown_id_returns_false() {
        let table = IncomingTable::new();
        assert!(!table.cancel(&RequestId::Number(404)));
    }

    #[test]
    fn parent_cancellation_propagates_to_children() {
        let table = IncomingTable::new();
        let parent = CancellationToken::new();
        let token = table.register(RequestId::Number(1), &parent);
        parent.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn remove_is_idempotent() {
        let table = IncomingTable::new();
        let parent = CancellationToken::new();
        table.register(RequestId::Number(1), &parent);
        table.remove(&RequestId::Number(1));
        table.remove(&RequestId::Number(1));
        assert!(table.is_empty());
    }
}
