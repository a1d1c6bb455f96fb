//! Handler for rare server-initiated requests.

use crate::message::RpcErrorObject;
use async_trait::async_trait;
use serde_json::Value;

/// Handles a request the peer initiated on us.
///
/// Sessions reject peer-initiated requests with a `ProtocolViolation`-style
/// JSON-RPC error unless a handler is registered via
/// [`crate::RpcSessionBuilder::with_handler`].
#[async_trait]
pub trait ServerRequestHandler: Send + Sync {
    /// Handle one server-initiated request, returning the result or an
    /// error object to send back.
    async fn handle(&self, method: &str, params: Option<Value>) -> Result<Value, RpcErrorObject>;
}

/// The JSON-RPC error code used for "method not found", returned when no
/// handler is registered for a peer-initiated request.
pub const METHOD_NOT_FOUND: i64 = -32601;
