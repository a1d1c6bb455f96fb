//! The open transport handle: a framed duplex channel plus graceful close.

use crate::error::{TransportError, TransportResult};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// One whole, framed message, exactly as handed up from the wire.
///
/// The transport does not interpret these bytes; the RPC Session above it
/// is responsible for parsing JSON-RPC out of them.
pub type Frame = Vec<u8>;

/// An open transport: an inbound stream of frames and an outbound sink,
/// backed by a reader task and a writer task that own the underlying I/O.
///
/// `TransportHandle` is the concrete return of [`crate::Transport::open`].
/// The outbound channel's bounded capacity *is* the high-water mark: once
/// that many frames are queued awaiting the write half, `send` suspends.
pub struct TransportHandle {
    inbound_rx: mpsc::Receiver<Frame>,
    outbound_tx: mpsc::Sender<Frame>,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
}

impl TransportHandle {
    /// Wire up a handle around already-spawned reader/writer tasks.
    ///
    /// Concrete transports (`stdio`, `socket`) construct the sink/stream
    /// halves from their own I/O primitives and hand them here, which
    /// spawns the pump tasks and returns the resulting handle. Exposed so
    /// test doubles (e.g. an in-memory duplex transport) can build a
    /// handle without depending on a real process or socket.
    pub fn spawn<S, W>(
        mut inbound_stream: S,
        mut outbound_sink: W,
        high_water_mark: usize,
    ) -> Self
    where
        S: futures::Stream<Item = std::io::Result<Frame>> + Unpin + Send + 'static,
        W: futures::Sink<Frame, Error = std::io::Error> + Unpin + Send + 'static,
    {
        let (inbound_tx, inbound_rx) = mpsc::channel(high_water_mark.max(1));
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Frame>(high_water_mark.max(1));

        let reader_task = tokio::spawn(async move {
            while let Some(item) = inbound_stream.next().await {
                match item {
                    Ok(frame) => {
                        if inbound_tx.send(frame).await.is_err() {
                            break;
                        }
                    },
                    Err(e) => {
                        warn!(error = %e, "transport read failed, stopping reader");
                        break;
                    },
                }
            }
            debug!("transport reader task exiting");
        });

        let writer_task = tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                if let Err(e) = outbound_sink.send(frame).await {
                    warn!(error = %e, "transport write failed, stopping writer");
                    break;
                }
            }
            let _ = outbound_sink.close().await;
            debug!("transport writer task exiting");
        });

        Self {
            inbound_rx,
            outbound_tx,
            reader_task,
            writer_task,
        }
    }

    /// Receive the next inbound frame, or `None` once the transport has
    /// closed and no more frames will arrive.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.inbound_rx.recv().await
    }

    /// Queue a frame for writing. Suspends once the outbound high-water
    /// mark is reached (backpressure), and fails with
    /// [`TransportError::Broken`] if the writer task has already exited.
    pub async fn send(&self, frame: Frame) -> TransportResult<()> {
        self.outbound_tx
            .send(frame)
            .await
            .map_err(|_| TransportError::Broken("writer task closed".into()))
    }

    /// Drain the writer before severing the reader, per the transport
    /// contract: outstanding queued writes are flushed, then both pump
    /// tasks are stopped.
    pub async fn close(mut self) {
        drop(self.outbound_tx);
        let _ = self.writer_task.await;
        self.reader_task.abort();
        self.inbound_rx.close();
    }

    /// Whether the transport is known to be broken (reader task finished
    /// without being asked to).
    #[must_use]
    pub fn is_reader_alive(&self) -> bool {
        !self.reader_task.is_finished()
    }
}
