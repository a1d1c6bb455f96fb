//! RPC session errors, mapped onto the shared [`muxcore_core::ErrorKind`]
//! taxonomy at the session boundary.

use crate::message::RpcErrorObject;
use muxcore_core::{CoreError, ErrorKind};
use thiserror::Error;

/// Errors a [`crate::RpcSession`] call can fail with.
#[derive(Debug, Error)]
pub enum RpcError {
    /// No response arrived before the call's deadline.
    #[error("deadline exceeded waiting for a response")]
    DeadlineExceeded,

    /// The underlying transport closed while the call was pending.
    #[error("transport broken while call was pending: {0}")]
    TransportBroken(String),

    /// The session was closed (locally or by the peer) with calls
    /// in flight.
    #[error("session closed: {0}")]
    SessionClosed(String),

    /// The peer sent a frame that did not parse as JSON-RPC.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The tool server returned a JSON-RPC `error` object.
    #[error(transparent)]
    RemoteError(#[from] RpcErrorObject),
}

impl From<&RpcError> for ErrorKind {
    fn from(err: &RpcError) -> Self {
        match err {
            RpcError::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            RpcError::TransportBroken(_) => ErrorKind::TransportBroken,
            RpcError::SessionClosed(_) => ErrorKind::SessionClosed,
            RpcError::ProtocolViolation(_) => ErrorKind::ProtocolViolation,
            RpcError::RemoteError(_) => ErrorKind::ToolError,
        }
    }
}

impl From<RpcError> for CoreError {
    fn from(err: RpcError) -> Self {
        let kind = ErrorKind::from(&err);
        CoreError::new(kind, err.to_string())
    }
}

/// Result type for RPC session operations.
pub type RpcResult<T> = Result<T, RpcError>;
