//! Hub uplink: hello exchange and traffic-log shipping.

use netspan_core::{FrameReader, WireError, codec::write_payload};
use netspan_proto::{ClientHello, MsgType, PacketRecord, Payload};
use tokio::{
    io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf},
    sync::mpsc,
};
use tracing::info;

/// Errors terminating the uplink.
#[derive(Debug, thiserror::Error)]
pub enum UplinkError {
    /// Frame-level or transport failure
    #[error(transparent)]
    Wire(#[from] WireError),

    /// Hub closed the connection before completing the hello exchange
    #[error("hub closed the connection during the hello exchange")]
    ClosedDuringHello,

    /// Hub answered the hello with something other than its hello
    #[error("unexpected reply to hello: type {0:#04x}")]
    UnexpectedReply(u8),
}

/// A registered connection to the hub.
#[derive(Debug)]
pub struct Uplink<S> {
    reader: FrameReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
    ssid: u32,
}

impl<S: AsyncRead + AsyncWrite + Send + 'static> Uplink<S> {
    /// Introduce this sniffer to the hub and wait for registration.
    ///
    /// # Errors
    ///
    /// Fails on transport errors, a closed connection, or a reply that
    /// is not the hub's hello.
    pub async fn handshake(
        stream: S,
        hostname: &str,
        interface: &str,
    ) -> Result<Self, UplinkError> {
        let (read_half, mut writer) = tokio::io::split(stream);
        let mut reader = FrameReader::new(read_half);

        let hello = Payload::ClientHello(ClientHello::sniffer(hostname, interface));
        write_payload(&mut writer, hello).await?;

        let frame = reader.read_frame().await?.ok_or(UplinkError::ClosedDuringHello)?;
        if frame.msg_type() != Some(MsgType::ServerHello) {
            return Err(UplinkError::UnexpectedReply(frame.kind()));
        }
        let ssid = match Payload::from_frame(&frame).map_err(WireError::from)? {
            Payload::ServerHello(reply) => reply.ssid,
            _ => return Err(UplinkError::UnexpectedReply(frame.kind())),
        };

        info!(ssid, "registered with hub");
        Ok(Self { reader, writer, ssid })
    }

    /// Session id the hub assigned.
    #[must_use]
    pub fn ssid(&self) -> u32 {
        self.ssid
    }

    /// Ship one record as a `TrafficLog` frame.
    ///
    /// The record gets the session id stamped into it before upload.
    /// The hub's outer fan-out envelope stays authoritative; the embedded
    /// copy exists for wire compatibility.
    ///
    /// # Errors
    ///
    /// Propagates frame encoding and transport failures.
    pub async fn send_record(&mut self, mut record: PacketRecord) -> Result<(), UplinkError> {
        record.ssid = Some(self.ssid);
        write_payload(&mut self.writer, Payload::TrafficLog(record)).await?;
        Ok(())
    }
}

/// Run the uplink side of a connected agent: handshake, then ship every
/// record the capture thread produces until the channel or the
/// connection closes.
///
/// # Errors
///
/// Returns the first handshake or send failure; the caller reports it
/// and exits.
pub async fn run<S: AsyncRead + AsyncWrite + Send + 'static>(
    stream: S,
    hostname: &str,
    interface: &str,
    mut records: mpsc::Receiver<PacketRecord>,
) -> Result<(), UplinkError> {
    let mut uplink = Uplink::handshake(stream, hostname, interface).await?;

    while let Some(record) = records.recv().await {
        uplink.send_record(record).await?;
    }

    info!("capture side closed, uplink done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use netspan_core::write_payload;
    use netspan_proto::{Role, ServerHello};

    use super::*;

    /// Hub stub on the far end of a duplex pipe.
    async fn fake_hub<S: AsyncRead + AsyncWrite + Send + 'static>(
        stream: S,
        ssid: u32,
    ) -> (ClientHello, Option<PacketRecord>) {
        let (read_half, mut writer) = tokio::io::split(stream);
        let mut reader = FrameReader::new(read_half);

        let frame = reader.read_frame().await.unwrap().unwrap();
        let hello = match Payload::from_frame(&frame).unwrap() {
            Payload::ClientHello(hello) => hello,
            other => panic!("expected hello, got {other:?}"),
        };

        let reply = Payload::ServerHello(ServerHello {
            ssid,
            ip: "127.0.0.1".to_string(),
            registered: true,
        });
        write_payload(&mut writer, reply).await.unwrap();

        let record = match reader.read_frame().await.unwrap() {
            Some(frame) => match Payload::from_frame(&frame).unwrap() {
                Payload::TrafficLog(record) => Some(record),
                other => panic!("expected traffic log, got {other:?}"),
            },
            None => None,
        };
        (hello, record)
    }

    fn sample_record() -> PacketRecord {
        PacketRecord {
            timestamp: "2026-01-15 10:30:00.000123".to_string(),
            protocol: "UDP".to_string(),
            src: "10.0.0.1".to_string(),
            dst: "10.0.0.9".to_string(),
            length: 64,
            src_port: Some(5353),
            dst_port: Some(53),
            icmp_type: None,
            icmp_code: None,
            icmp_id: None,
            icmp_seq: None,
            ssid: None,
        }
    }

    #[tokio::test]
    async fn handshake_then_record_with_embedded_ssid() {
        let (agent_side, hub_side) = tokio::io::duplex(4096);
        let hub = tokio::spawn(fake_hub(hub_side, 42));

        let mut uplink = Uplink::handshake(agent_side, "darkstar", "en0").await.unwrap();
        assert_eq!(uplink.ssid(), 42);
        uplink.send_record(sample_record()).await.unwrap();
        drop(uplink);

        let (hello, record) = hub.await.unwrap();
        assert_eq!(hello.hostname, "darkstar");
        assert_eq!(hello.role(), Role::Sniffer);

        let record = record.unwrap();
        assert_eq!(record.ssid, Some(42));
        assert_eq!(record.protocol, "UDP");
    }

    #[tokio::test]
    async fn non_hello_reply_is_rejected() {
        let (agent_side, hub_side) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            let (read_half, mut writer) = tokio::io::split(hub_side);
            let mut reader = FrameReader::new(read_half);
            let _ = reader.read_frame().await;
            let nack = Payload::Error(netspan_proto::ErrorPayload {
                error: "full".to_string(),
            });
            write_payload(&mut writer, nack).await.unwrap();
            // Hold the connection open until the client gives up.
            let _ = reader.read_frame().await;
        });

        let err = Uplink::handshake(agent_side, "h", "en0").await.unwrap_err();
        assert!(matches!(err, UplinkError::UnexpectedReply(0x05)));
    }
}
