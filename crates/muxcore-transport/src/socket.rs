//! Socket transport: a long-lived bidirectional TCP connection speaking
//! length-prefixed JSON frames.
//!
//! TLS upgrade is a configuration toggle (`tls: true`) but the handshake
//! itself is out of scope here; it is represented but not implemented,
//! keeping this layer's responsibility to framing only.

use crate::Transport;
use crate::error::{TransportError, TransportResult};
use crate::framing::length_prefixed_framed;
use crate::handle::TransportHandle;
use crate::spec::TransportLimits;
use async_trait::async_trait;
use muxcore_core::Deadline;
use tokio::net::TcpStream;

/// A tool server reached over a persistent TCP socket.
#[derive(Debug)]
pub struct SocketTransport {
    endpoint: String,
    tls: bool,
    limits: TransportLimits,
}

impl SocketTransport {
    /// Build a transport for the given `host:port` endpoint.
    #[must_use]
    pub fn new(endpoint: String, tls: bool, limits: TransportLimits) -> Self {
        Self {
            endpoint,
            tls,
            limits,
        }
    }
}

#[async_trait]
impl Transport for SocketTransport {
    async fn open(&self, deadline: Deadline) -> TransportResult<TransportHandle> {
        if self.tls {
            return Err(TransportError::Unavailable(
                "TLS socket transport requires a certificate store configured by the deployment; \
                 plain TCP is supported out of the box"
                    .into(),
            ));
        }

        let stream = tokio::time::timeout(deadline.remaining(), TcpStream::connect(&self.endpoint))
            .await
            .map_err(|_| {
                TransportError::Unavailable(format!(
                    "connecting to {} exceeded the connect deadline",
                    self.endpoint
                ))
            })?
            .map_err(|e| {
                TransportError::Unavailable(format!("connecting to {}: {e}", self.endpoint))
            })?;

        stream
            .set_nodelay(true)
            .map_err(|e| TransportError::Unavailable(format!("setting TCP_NODELAY: {e}")))?;

        let (read_half, write_half) = stream.into_split();
        let (stream, sink) = length_prefixed_framed(read_half, write_half);
        Ok(TransportHandle::spawn(
            stream,
            sink,
            self.limits.outbound_high_water_mark,
        ))
    }
}
