//! JSON-RPC 2.0 wire types.
//!
//! Requests carry `jsonrpc`, `id`, `method`, `params`; responses carry
//! `id` and either `result` or `error`; notifications omit `id`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

const JSONRPC_VERSION: &str = "2.0";

/// A request id, monotonic within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An outbound JSON-RPC request.
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest {
    jsonrpc: &'static str,
    id: RequestId,
    method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

impl RpcRequest {
    /// Build a request with the given id, method, and params.
    #[must_use]
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method: method.into(),
            params,
        }
    }
}

/// An outbound fire-and-forget notification (no `id`).
#[derive(Debug, Clone, Serialize)]
pub struct RpcNotification {
    jsonrpc: &'static str,
    method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

impl RpcNotification {
    /// Build a notification.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method: method.into(),
            params,
        }
    }
}

/// A structured JSON-RPC error object, as carried in `error` on a
/// response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcErrorObject {
    /// The JSON-RPC error code.
    pub code: i64,
    /// A short human-readable description.
    pub message: String,
    /// Optional structured error detail.
    #[serde(default)]
    pub data: Option<Value>,
}

impl fmt::Display for RpcErrorObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rpc error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for RpcErrorObject {}

/// An inbound message, after classification by id/method/result presence.
///
/// This is the tagged variant the RPC Session dispatches on, replacing
/// the "dynamic dispatch on string type tags" pattern the design notes
/// flag for re-architecture: everything that doesn't fit one of these
/// shapes fails with `ProtocolViolation` instead of being forwarded.
#[derive(Debug, Clone)]
pub enum InboundMessage {
    /// A response to one of our outbound requests.
    Response {
        /// The id it responds to.
        id: RequestId,
        /// The outcome: a result value or a structured error.
        outcome: Result<Value, RpcErrorObject>,
    },
    /// A notification from the peer (no response expected).
    Notification {
        /// The notification method.
        method: String,
        /// The notification parameters.
        params: Option<Value>,
    },
    /// A request from the peer expecting a response (rare in this
    /// protocol; rejected unless a handler is registered).
    PeerRequest {
        /// The id the peer expects a response under.
        id: RequestId,
        /// The requested method.
        method: String,
        /// The request parameters.
        params: Option<Value>,
    },
}

/// Raw wire shape used only to classify an inbound frame; not exposed
/// outside this module.
#[derive(Debug, Deserialize)]
struct RawInbound {
    #[serde(default)]
    id: Option<RequestId>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

/// Parse and classify one inbound JSON-RPC frame.
///
/// # Errors
///
/// Returns `Err` with a description if the bytes are not valid JSON, or
/// don't match one of the three JSON-RPC 2.0 shapes (response, peer
/// request, notification).
pub fn classify(bytes: &[u8]) -> Result<InboundMessage, String> {
    let raw: RawInbound =
        serde_json::from_slice(bytes).map_err(|e| format!("malformed JSON-RPC frame: {e}"))?;

    match (raw.id, raw.method, raw.result, raw.error) {
        (Some(id), None, result, error) => {
            let outcome = match (result, error) {
                (Some(result), None) => Ok(result),
                (None, Some(error)) => Err(error),
                (Some(_), Some(_)) => {
                    return Err("response carries both result and error".into());
                },
                (None, None) => Ok(Value::Null),
            };
            Ok(InboundMessage::Response { id, outcome })
        },
        (Some(id), Some(method), _, _) => Ok(InboundMessage::PeerRequest { id, method, params: raw.params }),
        (None, Some(method), _, _) => Ok(InboundMessage::Notification { method, params: raw.params }),
        (None, None, _, _) => Err("frame has neither id nor method".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_response() {
        let bytes = br#"{"jsonrpc":"2.0","id":3,"result":{"pong":true}}"#;
        match classify(bytes).unwrap() {
            InboundMessage::Response { id, outcome } => {
                assert_eq!(id, RequestId(3));
                assert!(outcome.is_ok());
            },
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn classifies_error_response() {
        let bytes = br#"{"jsonrpc":"2.0","id":3,"error":{"code":-32000,"message":"boom"}}"#;
        match classify(bytes).unwrap() {
            InboundMessage::Response { outcome, .. } => {
                assert_eq!(outcome.unwrap_err().code, -32000);
            },
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn classifies_notification() {
        let bytes = br#"{"jsonrpc":"2.0","method":"tools/list_changed"}"#;
        match classify(bytes).unwrap() {
            InboundMessage::Notification { method, .. } => assert_eq!(method, "tools/list_changed"),
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_frame() {
        assert!(classify(b"not json").is_err());
        assert!(classify(b"{}").is_err());
    }
}
