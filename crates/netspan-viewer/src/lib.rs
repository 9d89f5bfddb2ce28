//! Viewer engine.
//!
//! The operator UI shell (tabs, tables, filters) lives elsewhere; this
//! crate is the piece of a viewer that speaks the protocol. It connects,
//! identifies itself as a GUI client, and converts the hub's byte stream
//! into typed [`ViewerEvent`]s, grouped by the originating sniffer's
//! session id.
//!
//! The read side uses the protocol's push discipline: raw chunks from
//! the transport event loop go into a [`FrameDecoder`], which yields
//! zero or more frames per chunk. After the hello a viewer never sends
//! anything; the hub drives all traffic.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use netspan_core::codec::write_payload;
use netspan_proto::{ClientHello, FrameDecoder, Frame, PacketRecord, Payload};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite},
    sync::mpsc,
};
use tracing::debug;

/// Events surfaced to the UI host.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    /// Hub accepted the hello and assigned this viewer a session id.
    Registered {
        /// Session id the hub assigned to this viewer connection
        ssid: u32,
        /// This client's address as the hub observed it
        ip: String,
    },
    /// One record fanned out from a sniffer.
    Log {
        /// Originating sniffer session id (authoritative)
        ssid: u32,
        /// The decoded packet record
        record: PacketRecord,
    },
    /// The hub sent an error notification, or a payload failed to parse.
    ProtocolError {
        /// Human-readable description for the UI
        message: String,
    },
    /// The connection is gone; no further events will arrive.
    Disconnected,
}

/// Capacity of the event channel toward the UI host.
const EVENT_QUEUE: usize = 1024;

/// A running viewer connection.
///
/// Dropping the client (or its event receiver) tears the read task down.
#[derive(Debug)]
pub struct ViewerClient {
    events: mpsc::Receiver<ViewerEvent>,
}

impl ViewerClient {
    /// Connect to a hub over TCP and register as a viewer.
    ///
    /// # Errors
    ///
    /// Fails only on the initial TCP connect; everything after that is
    /// reported through the event stream.
    pub async fn connect(host: &str, port: u16, hostname: &str) -> std::io::Result<Self> {
        let stream = tokio::net::TcpStream::connect((host, port)).await?;
        Ok(Self::from_stream(stream, hostname))
    }

    /// Run the viewer protocol over an already-established stream.
    ///
    /// Useful for transports other than plain TCP (and for simulation).
    pub fn from_stream<S>(stream: S, hostname: &str) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (tx, events) = mpsc::channel(EVENT_QUEUE);
        let hostname = hostname.to_string();
        tokio::spawn(async move {
            run_connection(stream, hostname, tx).await;
        });
        Self { events }
    }

    /// Next event, or `None` once [`ViewerEvent::Disconnected`] has been
    /// consumed and the task is gone.
    pub async fn next_event(&mut self) -> Option<ViewerEvent> {
        self.events.recv().await
    }
}

/// Hello, then pump bytes through the decoder until the connection ends.
async fn run_connection<S>(stream: S, hostname: String, events: mpsc::Sender<ViewerEvent>)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut read_half, mut write_half) = tokio::io::split(stream);

    let hello = Payload::ClientHello(ClientHello::viewer(hostname));
    if let Err(e) = write_payload(&mut write_half, hello).await {
        debug!(error = %e, "hello failed");
        let _ = events.send(ViewerEvent::Disconnected).await;
        return;
    }

    let mut decoder = FrameDecoder::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = match read_half.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!(error = %e, "read failed");
                break;
            },
        };

        decoder.push(&chunk[..n]);
        loop {
            match decoder.next_frame() {
                Ok(Some(frame)) => {
                    if !dispatch_frame(&frame, &events).await {
                        return; // UI host went away
                    }
                },
                Ok(None) => break,
                Err(e) => {
                    // Fatal framing error: surface it and drop the
                    // connection.
                    let _ = events
                        .send(ViewerEvent::ProtocolError { message: e.to_string() })
                        .await;
                    let _ = events.send(ViewerEvent::Disconnected).await;
                    return;
                },
            }
        }
    }

    let _ = events.send(ViewerEvent::Disconnected).await;
}

/// Translate one frame into an event. Returns `false` if the event
/// channel is closed.
async fn dispatch_frame(frame: &Frame, events: &mpsc::Sender<ViewerEvent>) -> bool {
    let event = match Payload::from_frame(frame) {
        Ok(Payload::ServerHello(reply)) => {
            ViewerEvent::Registered { ssid: reply.ssid, ip: reply.ip }
        },
        Ok(Payload::ForwardLog(forward)) => {
            ViewerEvent::Log { ssid: forward.ssid, record: forward.log }
        },
        Ok(Payload::Error(error)) => ViewerEvent::ProtocolError { message: error.error },
        Ok(other) => {
            debug!(?other, "ignoring frame type not meant for viewers");
            return true;
        },
        Err(e) => ViewerEvent::ProtocolError { message: e.to_string() },
    };

    events.send(event).await.is_ok()
}
