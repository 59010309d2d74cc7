//! Notification routing (spec §4.8: "route to the registered handler for
//! that method").
//!
//! One table serves both roles a session can play — spec §9 insists on "a
//! single session type with role-labeled handler tables rather than two
//! parallel stacks", and a notification (`list-changed`, `resource-updated`,
//! `progress`, `cancelled`, …) is just a method name either role may
//! receive, so there is nothing role-specific to split here.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

/// A callback invoked with a notification's `params` (or `Value::Null` if
/// it carried none). Handlers are plain synchronous callbacks: spec §4.8
/// describes notification routing as dispatch, not request/response, so
/// there is no reply to await. A handler that needs to do async work should
/// spawn its own task.
pub type NotificationHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// `method -> handler` for inbound notifications.
#[derive(Default)]
pub struct NotificationRouter {
    handlers: DashMap<String, NotificationHandler>,
}

impl NotificationRouter {
    /// An empty router; unregistered methods are dispatched to nothing and
    /// simply logged at debug level.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the handler for `method`.
    pub fn register(&self, method: impl Into<String>, handler: NotificationHandler) {
        self.handlers.insert(method.into(), handler);
    }

    /// Removes the handler for `method`, if any.
    pub fn unregister(&self, method: &str) {
        self.handlers.remove(method);
    }

    /// Dispatches `params` to `method`'s handler, if registered.
    pub fn dispatch(&self, method: &str, params: Value) {
        match self.handlers.get(method) {
            Some(handler) => handler(params),
            None => tracing::debug!(method, "no handler registered for notification"),
        }
    }
}
