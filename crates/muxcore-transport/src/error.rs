//! Transport-level errors.

use thiserror::Error;

/// Errors a [`crate::Transport`] can return.
///
/// Per the transport contract: `open` fails with [`TransportError::Unavailable`]
/// when the remote cannot be reached within the configured connect deadline,
/// and with [`TransportError::Broken`] once a connection was established and
/// then lost.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The remote could not be reached before the connect deadline elapsed.
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    /// An established transport was severed (process exited, socket reset).
    #[error("transport broken: {0}")]
    Broken(String),

    /// The local side was asked to operate on an already-closed transport.
    #[error("transport already closed")]
    AlreadyClosed,
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
