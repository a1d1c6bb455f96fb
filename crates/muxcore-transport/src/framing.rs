//! Concrete framings: newline-delimited JSON for pipes, length-prefixed
//! JSON for sockets. Both deliver whole messages to the upper layer.

use crate::handle::Frame;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec, LinesCodec};

/// Wrap a reader/writer pair as newline-delimited JSON frames (one JSON
/// value per line), used for stdio transports.
pub fn ndjson_framed<R, W>(
    reader: R,
    writer: W,
) -> (
    impl Stream<Item = std::io::Result<Frame>>,
    impl Sink<Frame, Error = std::io::Error>,
)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let read_half = FramedRead::new(reader, LinesCodec::new_with_max_length(64 * 1024 * 1024))
        .map(|item| item.map(|line| line.into_bytes()).map_err(Into::into));

    let write_half = FramedWrite::new(writer, LinesCodec::new()).with(|frame: Frame| async move {
        String::from_utf8(frame)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    });

    (read_half, write_half)
}

/// Wrap a reader/writer pair as 4-byte-length-prefixed JSON frames, used
/// for socket transports.
pub fn length_prefixed_framed<R, W>(
    reader: R,
    writer: W,
) -> (
    impl Stream<Item = std::io::Result<Frame>>,
    impl Sink<Frame, Error = std::io::Error>,
)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let read_half = FramedRead::new(reader, LengthDelimitedCodec::new())
        .map(|item| item.map(|bytes| bytes.to_vec()));

    let write_half =
        FramedWrite::new(writer, LengthDelimitedCodec::new()).with(|frame: Frame| async move {
            Ok::<_, std::io::Error>(bytes::Bytes::from(frame))
        });

    (read_half, write_half)
}
