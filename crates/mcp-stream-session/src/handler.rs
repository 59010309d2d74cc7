//! The domain-handler seam (spec §1: "domain handlers ... are consumers of
//! the session engine", out of scope themselves).
//!
//! The session engine calls exactly this trait for every incoming request;
//! it has no knowledge of tools, resources, prompts, sampling, elicitation,
//! completion, logging, roots, or tasks. A server wires its tool/resource
//! dispatch behind this trait; a client wires sampling/elicitation/roots
//! behind the same trait on its own session — the symmetry spec §9 asks
//! for.

use std::future::Future;
use std::pin::Pin;

use mcp_stream_wire::RpcError;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// A boxed future, matching the object-safety technique used by
/// `mcp-stream-transport-traits`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Services incoming requests for a [`crate::Session`].
pub trait RequestHandler: Send + Sync {
    /// Handles `method` with `params`, observing `cancel` for early return.
    ///
    /// Returning `Err` packages an [`RpcError`] into the JSON-RPC error
    /// response (spec §7: "handler errors ... do not terminate the
    /// session"). This is the *only* sanctioned way for a handler to signal
    /// failure; panicking or hanging indefinitely are bugs in the handler,
    /// not in the engine.
    fn handle(
        &self,
        method: &str,
        params: Option<Value>,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<Value, RpcError>>;
}

/// A [`RequestHandler`] that answers every request with `-32601 Method not
/// found`. Useful as a placeholder for a role that only originates
/// requests and never services them (e.g. a client with no
/// sampling/elicitation handlers registered).
pub struct NullHandler;

impl RequestHandler for NullHandler {
    fn handle(
        &self,
        method: &str,
        _params: Option<Value>,
        _cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<Value, RpcError>> {
        let method = method.to_string();
        Box::pin(async move { Err(RpcError::method_not_found(&method)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_handler_rejects_every_method() {
        let handler = NullHandler;
        let err = handler
            .handle("tools/call", None, CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, mcp_stream_core::jsonrpc_error_codes::METHOD_NOT_FOUND);
    }
}
