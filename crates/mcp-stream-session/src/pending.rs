//! The outgoing-request table: `id -> pending slot` (spec §3 Session,
//! §4.8 "store a pending slot").
//!
//! A concurrent map keyed by request id, each entry holding a single-use
//! response channel. This table is the session's exclusive property (spec
//! §3 Ownership): only the owning session inserts into or drains it.

use dashmap::DashMap;
use mcp_stream_wire::{RequestId, Response};
use tokio::sync::oneshot;

struct Slot {
    method: String,
    reply: oneshot::Sender<Response>,
}

/// `id -> pending slot` for requests this session originated and is
/// awaiting a reply to.
#[derive(Default)]
pub struct PendingTable {
    slots: DashMap<RequestId, Slot>,
}

impl PendingTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `id` as awaiting a response to `method`, returning the
    /// receiving half of its single-use mailbox.
    pub fn insert(&self, id: RequestId, method: impl Into<String>) -> oneshot::Receiver<Response> {
        let (tx, rx) = oneshot::channel();
        self.slots.insert(
            id,
            Slot {
                method: method.into(),
                reply: tx,
            },
        );
        rx
    }

    /// Delivers `response` to the caller waiting on its id. Per §4.8's
    /// receive-loop rule, a response whose id has no match (already
    /// cancelled, already delivered, or never sent) is silently dropped.
    pub fn deliver(&self, response: Response) {
        let Some(id) = response.id.clone() else {
            tracing::debug!("dropping response with no id");
            return;
        };
        if let Some((_, slot)) = self.slots.remove(&id) {
            let _ = slot.reply.send(response);
        } else {
            tracing::debug!(id = %id, "dropping response with no matching pending request");
        }
    }

    /// Removes `id`'s slot without delivering anything, for the caller's own
    /// cancellation path — the late response (if any still arrives) will
    /// then fall through [`PendingTable::deliver`]'s no-match branch and be
    /// dropped, per §4.8's "a late response is discarded".
    pub fn remove(&self, id: &RequestId) {
        self.slots.remove(id);
    }

    /// The method name a pending id was sent for, if still outstanding.
    /// Used for diagnostics when draining on close.
    #[must_use]
    pub fn method_of(&self, id: &RequestId) -> Option<String> {
        self.slots.get(id).map(|slot| slot.method.clone())
    }

    /// Fails every outstanding slot with `ConnectionClosed` and empties the
    /// table, per §4.8 Close: "move the pending ... tables aside and fail
    /// all of them with connection closed".
    pub fn fail_all_connection_closed(&self) {
        let ids: Vec<RequestId> = self.slots.iter().map(|entry| entry.key().clone()).collect();
        for id in ids {
            if let Some((_, slot)) = self.slots.remove(&id) {
                tracing::debug!(id = %id, method = %slot.method, "failing pending request: connection closed");
                // The sender is simply dropped; `recv()` on the other end
                // observes a closed channel and the caller maps that to
                // `ConnectionClosed` itself (see `Session::send_request`).
                drop(slot.reply);
            }
        }
    }

    /// Number of outstanding requests. Exposed for tests and diagnostics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// `true` if no requests are outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_stream_wire::RpcError;

    #[tokio::test]
    async fn deliver_routes_to_the_matching_receiver() {
        let table = PendingTable::new();
        let mut rx = table.insert(RequestId::Number(1), "ping");
        table.deliver(Response::success(serde_json::json!(true), RequestId::Number(1)));
        let response = rx.try_recv().unwrap();
        assert!(response.is_success());
    }

    #[test]
    fn deliver_with_no_match_is_dropped_silently() {
        let table = PendingTable::new();
        table.deliver(Response::error(RpcError::internal_error("x"), RequestId::Number(99)));
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn fail_all_drops_every_receiver() {
        let table = PendingTable::new();
        let rx1 = table.insert(RequestId::Number(1), "a");
        let rx2 = table.insert(RequestId::Number(2), "b");
        table.fail_all_connection_closed();
        assert!(table.is_empty());
        assert!(rx1.await.is_err());
        assert!(rx2.await.is_err());
    }

    #[test]
    fn remove_discards_the_slot_without_delivering() {
        let table = PendingTable::new();
        let _rx = table.insert(RequestId::Number(1), "ping");
        table.remove(&RequestId::Number(1));
        assert!(table.is_empty());
    }
}
