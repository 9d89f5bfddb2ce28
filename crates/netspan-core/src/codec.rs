//! Frame I/O over async byte streams.
//!
//! Both of the protocol's read disciplines sit on top of the same
//! [`FrameDecoder`] rules:
//!
//! - the hub's pull path ([`FrameReader`]) blocks the worker on the
//!   transport, looping short reads until a full frame is buffered;
//! - the viewer's push path feeds the decoder straight from its event
//!   loop (see `netspan-viewer`).
//!
//! Short reads and partial frames are never fatal; framing violations
//! always are.

use netspan_proto::{Frame, FrameDecoder, Payload};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::WireError;

/// Read size for the pull path. Frames top out at 1029 bytes on the
/// wire, so one read usually carries several frames.
const READ_CHUNK: usize = 4096;

/// Pull-mode frame source for one connection.
///
/// Wraps the owned read half of a transport and yields complete frames,
/// buffering across short reads.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    decoder: FrameDecoder,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Wrap the read half of a transport.
    pub fn new(inner: R) -> Self {
        Self { inner, decoder: FrameDecoder::new() }
    }

    /// Produce the next frame.
    ///
    /// Returns `Ok(None)` on a clean close: the peer shut down on a
    /// frame boundary with nothing buffered.
    ///
    /// # Errors
    ///
    /// - [`WireError::Protocol`] on a framing violation (fatal; close
    ///   the connection)
    /// - [`WireError::Io`] on transport failure, including a connection
    ///   that closed mid-frame
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, WireError> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(frame) = self.decoder.next_frame()? {
                return Ok(Some(frame));
            }

            let n = self.inner.read(&mut chunk).await?;
            if n == 0 {
                if self.decoder.is_empty() {
                    return Ok(None);
                }
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed mid-frame",
                )
                .into());
            }
            self.decoder.push(&chunk[..n]);
        }
    }
}

/// Write one frame to a transport.
///
/// The frame is serialized to a single buffer and written with one
/// `write_all` followed by a flush, so from the caller's viewpoint the
/// whole frame reaches the transport or the operation reports failure.
///
/// # Errors
///
/// - [`WireError::Protocol`] if the payload exceeds the frame cap
/// - [`WireError::Io`] on transport failure
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    frame: &Frame,
) -> Result<(), WireError> {
    let bytes = frame.to_bytes()?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Serialize a payload and write it as one frame.
///
/// # Errors
///
/// Same conditions as [`write_frame`], plus JSON serialization failure.
pub async fn write_payload<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: Payload,
) -> Result<(), WireError> {
    let frame = payload.into_frame()?;
    write_frame(writer, &frame).await
}

#[cfg(test)]
mod tests {
    use netspan_proto::{ClientHello, MsgType, ProtocolError};

    use super::*;

    #[tokio::test]
    async fn round_trip_over_duplex() {
        let (client, server) = tokio::io::duplex(64);
        let (_, mut client_tx) = tokio::io::split(client);
        let (server_rx, _) = tokio::io::split(server);

        let payload = Payload::ClientHello(ClientHello::sniffer("host", "en0"));
        let sent = payload.clone().into_frame().unwrap();
        write_frame(&mut client_tx, &sent).await.unwrap();
        drop(client_tx);

        let mut reader = FrameReader::new(server_rx);
        let received = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(received, sent);
        assert_eq!(Payload::from_frame(&received).unwrap(), payload);

        // Clean EOF after the frame boundary.
        assert!(reader.read_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn short_reads_are_looped() {
        // A 1-byte duplex pipe forces every read to be short.
        let (client, server) = tokio::io::duplex(1);
        let (_, mut client_tx) = tokio::io::split(client);
        let (server_rx, _) = tokio::io::split(server);

        let frame = Frame::new(MsgType::TrafficLog, &b"{\"a\":1}"[..]);
        let sent = frame.clone();
        let writer = tokio::spawn(async move {
            write_frame(&mut client_tx, &sent).await.unwrap();
        });

        let mut reader = FrameReader::new(server_rx);
        let received = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(received, frame);
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn eof_mid_frame_is_an_error() {
        let (client, server) = tokio::io::duplex(64);
        let (_, mut client_tx) = tokio::io::split(client);
        let (server_rx, _) = tokio::io::split(server);

        let wire = Frame::new(MsgType::TrafficLog, &b"{}"[..]).to_bytes().unwrap();
        client_tx.write_all(&wire[..3]).await.unwrap();
        drop(client_tx);

        let mut reader = FrameReader::new(server_rx);
        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(err, WireError::Io(_)));
    }

    #[tokio::test]
    async fn framing_violation_is_fatal() {
        let (client, server) = tokio::io::duplex(64);
        let (_, mut client_tx) = tokio::io::split(client);
        let (server_rx, _) = tokio::io::split(server);

        client_tx.write_all(&[0x07, 0x01, 0x00, 0x00, 0x0A]).await.unwrap();

        let mut reader = FrameReader::new(server_rx);
        let err = reader.read_frame().await.unwrap_err();
        assert!(
            matches!(err, WireError::Protocol(ProtocolError::UnsupportedVersion(0x07))),
            "{err:?}"
        );
    }
}
