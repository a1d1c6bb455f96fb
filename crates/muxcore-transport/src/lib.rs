//! Muxcore Transport - framed duplex connections to tool servers.
//!
//! A `Transport` delivers ordered, framed byte messages over one
//! bidirectional channel and knows nothing of JSON-RPC semantics; that
//! lives one layer up in `muxcore-rpc`. Two concrete forms are provided: a
//! child process with stdin/stdout pipes, and a long-lived bidirectional
//! socket.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod framing;
mod handle;
pub mod socket;
pub mod spec;
pub mod stdio;

pub use error::{TransportError, TransportResult};
pub use handle::{Frame, TransportHandle};
pub use spec::{TransportLimits, TransportSpec};

use async_trait::async_trait;
use muxcore_core::Deadline;

/// Opens framed duplex connections for one server configuration.
///
/// Implementations must fail `open` with [`TransportError::Unavailable`]
/// if the remote cannot be reached before `deadline`, and treat any later
/// loss of the connection as [`TransportError::Broken`] surfaced through
/// the returned [`TransportHandle`] (its reader simply stops producing
/// frames; callers detect this via `recv` returning `None` or
/// `is_reader_alive`).
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Establish the connection and return a framed duplex handle.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Unavailable`] if the deadline elapses
    /// before the remote accepts the connection.
    async fn open(&self, deadline: Deadline) -> TransportResult<TransportHandle>;
}

/// Build the concrete [`Transport`] for a [`TransportSpec`].
#[must_use]
pub fn for_spec(spec: TransportSpec, limits: TransportLimits) -> Box<dyn Transport> {
    match spec {
        TransportSpec::Stdio { command, args, env } => {
            Box::new(stdio::StdioTransport::new(command, args, env, limits))
        },
        TransportSpec::Socket { endpoint, tls } => {
            Box::new(socket::SocketTransport::new(endpoint, tls, limits))
        },
    }
}
