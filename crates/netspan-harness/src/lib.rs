//! Simulation harness for deterministic end-to-end testing.
//!
//! [Turmoil](https://docs.rs/turmoil) gives every test a virtual network
//! with controlled scheduling, so hub/sniffer/viewer interactions
//! reproduce exactly. The hub binds through [`SimListener`], which
//! implements the same [`Accept`] abstraction production uses for
//! `tokio::net::TcpListener` — no hub code changes between simulation
//! and the real network.
//!
//! The helpers here are wire-level clients: they speak raw frames so
//! tests can also misbehave (wrong first frame, garbage bytes) in ways
//! the real agent and viewer crates never would.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::{io, net::SocketAddr};

use async_trait::async_trait;
use netspan_core::{Accept, FrameReader, WireError, write_payload};
use netspan_proto::{
    ClientHello, ForwardLog, MsgType, PacketRecord, Payload, ServerHello,
};
use tokio::io::{ReadHalf, WriteHalf};
use turmoil::net::{TcpListener, TcpStream};

/// Boxed error for simulation closures.
pub type BoxError = Box<dyn std::error::Error>;

/// Turmoil-backed listener for the hub.
pub struct SimListener(TcpListener);

impl SimListener {
    /// Bind on all interfaces of the current simulated host.
    ///
    /// # Errors
    ///
    /// Propagates simulated bind failures.
    pub async fn bind(port: u16) -> io::Result<Self> {
        Ok(Self(TcpListener::bind(format!("0.0.0.0:{port}")).await?))
    }
}

#[async_trait]
impl Accept for SimListener {
    type Stream = TcpStream;

    async fn accept(&self) -> io::Result<(Self::Stream, SocketAddr)> {
        self.0.accept().await
    }
}

/// A client that completed the hello exchange with the hub.
pub struct RegisteredClient {
    /// Pull-mode frame source for this connection
    pub reader: FrameReader<ReadHalf<TcpStream>>,
    /// Write half of the connection
    pub writer: WriteHalf<TcpStream>,
    /// The hub's hello reply
    pub welcome: ServerHello,
}

impl RegisteredClient {
    /// Connect to `addr` and register with the given hello.
    ///
    /// # Errors
    ///
    /// Fails on connect errors, a dropped connection, or a reply that is
    /// not the hub's hello.
    pub async fn connect(addr: &str, hello: ClientHello) -> Result<Self, BoxError> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, mut writer) = tokio::io::split(stream);
        let mut reader = FrameReader::new(read_half);

        write_payload(&mut writer, Payload::ClientHello(hello)).await?;

        let frame = reader
            .read_frame()
            .await?
            .ok_or("hub closed the connection during the hello exchange")?;
        if frame.msg_type() != Some(MsgType::ServerHello) {
            return Err(format!("unexpected hello reply type {:#04x}", frame.kind()).into());
        }
        let welcome = match Payload::from_frame(&frame).map_err(WireError::from)? {
            Payload::ServerHello(welcome) => welcome,
            other => return Err(format!("unexpected hello reply payload {other:?}").into()),
        };

        Ok(Self { reader, writer, welcome })
    }

    /// SSID the hub assigned to this connection.
    #[must_use]
    pub fn ssid(&self) -> u32 {
        self.welcome.ssid
    }

    /// Send one record as a `TrafficLog` frame (sniffer side).
    ///
    /// # Errors
    ///
    /// Propagates encode and transport failures.
    pub async fn send_record(&mut self, record: PacketRecord) -> Result<(), WireError> {
        write_payload(&mut self.writer, Payload::TrafficLog(record)).await
    }

    /// Wait for the next `ForwardLog` frame (viewer side).
    ///
    /// # Errors
    ///
    /// Fails on closed connections, framing errors, or a frame that is
    /// not a forward.
    pub async fn next_forward(&mut self) -> Result<ForwardLog, BoxError> {
        let frame = self.reader.read_frame().await?.ok_or("connection closed")?;
        match Payload::from_frame(&frame).map_err(WireError::from)? {
            Payload::ForwardLog(forward) => Ok(forward),
            other => Err(format!("expected forward log, got {other:?}").into()),
        }
    }
}

/// A minimal traffic record, tagged through `icmp_seq` so tests can
/// assert ordering and identity.
#[must_use]
pub fn sample_record(seq: u16) -> PacketRecord {
    PacketRecord {
        timestamp: "2026-01-15 10:30:00.000123".to_string(),
        protocol: "ICMP".to_string(),
        src: "10.0.0.1".to_string(),
        dst: "10.0.0.2".to_string(),
        length: 8,
        src_port: None,
        dst_port: None,
        icmp_type: Some(8),
        icmp_code: Some(0),
        icmp_id: Some(7),
        icmp_seq: Some(seq),
        ssid: None,
    }
}
