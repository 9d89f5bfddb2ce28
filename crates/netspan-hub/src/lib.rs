//! Aggregation hub: session registration and record fan-out.
//!
//! The hub is the sole endpoint sniffers and viewers connect to. Each
//! accepted connection gets its own worker task:
//!
//! ```text
//! accept loop
//!   ├─ worker (sniffer): read TrafficLog ──► fan out ForwardLog to viewers
//!   └─ worker (viewer):  liveness sentinel, receives fan-out only
//! ```
//!
//! # Registration sequence
//!
//! 1. Read exactly one frame; anything but `ClientHello` closes the
//!    connection.
//! 2. Derive the role from the hello payload.
//! 3. Under the registry lock: allocate the next SSID, insert the
//!    session, send `ServerHello`. A failed send removes the session
//!    again; the SSID stays consumed. Because the hello goes out under
//!    the same lock fan-out snapshots are taken under, it precedes every
//!    forwarded record on the viewer's channel.
//! 4. Enter the role loop.
//!
//! # Fan-out discipline
//!
//! Viewer write handles are snapshotted under the registry lock and the
//! writes happen after it is released, so a slow viewer can never stall
//! registrations or another sniffer. A handle in the snapshot may belong
//! to a session already torn down; any write error means "this viewer is
//! gone" and removes exactly that session. Per-handle mutexes serialize
//! concurrent sniffer workers writing to the same viewer.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::{net::SocketAddr, sync::Arc};

use netspan_core::{
    Accept, FrameReader, SessionRegistry,
    codec::write_payload,
    registry::SharedWriter,
};
use netspan_proto::{ClientHello, ForwardLog, MsgType, PacketRecord, Payload, Role, ServerHello};
use tokio::{
    io::{AsyncWriteExt, ReadHalf, WriteHalf},
    sync::Mutex,
};
use tracing::{debug, info, warn};

/// Registry shared by every worker of one hub process, behind the single
/// registry lock.
type Registry<S> = Arc<Mutex<SessionRegistry<WriteHalf<S>>>>;

/// Run the hub on an already-bound listener. Never returns under normal
/// operation.
///
/// # Errors
///
/// Currently unreachable: accept failures are logged and retried. The
/// signature leaves room for listeners whose failures are terminal.
pub async fn serve<L: Accept>(listener: L) -> std::io::Result<()> {
    let registry: Registry<L::Stream> = Arc::new(Mutex::new(SessionRegistry::new()));

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            },
        };

        debug!(%peer, "new connection");
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            handle_client(registry, stream, peer).await;
        });
    }
}

/// Per-connection worker: handshake, registration, role loop, teardown.
async fn handle_client<S>(registry: Registry<S>, stream: S, peer: SocketAddr)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let mut reader = FrameReader::new(read_half);

    // First frame must be the hello; anything else closes the connection.
    let hello = match read_hello(&mut reader).await {
        Some(hello) => hello,
        None => {
            debug!(%peer, "connection closed before a valid hello");
            return;
        },
    };
    let role = hello.role();

    let writer: SharedWriter<WriteHalf<S>> = Arc::new(Mutex::new(write_half));
    let ssid = {
        let mut reg = registry.lock().await;

        if role == Role::Sniffer {
            let source = reg.sniffer_source_index(peer.ip());
            info!(%peer, source, hostname = %hello.hostname, "sniffer source seen");
        }

        let ssid = reg.register(peer.ip(), role, Arc::clone(&writer));
        let reply = Payload::ServerHello(ServerHello {
            ssid,
            ip: peer.ip().to_string(),
            registered: true,
        });

        let mut w = writer.lock().await;
        if let Err(e) = write_payload(&mut *w, reply).await {
            warn!(%peer, ssid, error = %e, "hello reply failed, releasing session");
            reg.remove(ssid);
            return;
        }
        ssid
    };

    info!(%peer, ssid, %role, "registered");

    match role {
        Role::Sniffer => sniffer_loop(&registry, &mut reader, ssid).await,
        Role::Viewer => viewer_loop(&mut reader, ssid).await,
    }

    registry.lock().await.remove(ssid);
    info!(ssid, %role, "session closed");
}

/// Read the opening frame and parse it as a `ClientHello`.
async fn read_hello<R>(reader: &mut FrameReader<R>) -> Option<ClientHello>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let frame = match reader.read_frame().await {
        Ok(Some(frame)) => frame,
        Ok(None) => return None,
        Err(e) => {
            debug!(error = %e, "handshake read failed");
            return None;
        },
    };

    if frame.msg_type() != Some(MsgType::ClientHello) {
        debug!(kind = frame.kind(), "first frame was not a hello");
        return None;
    }

    match Payload::from_frame(&frame) {
        Ok(Payload::ClientHello(hello)) => Some(hello),
        Ok(_) | Err(_) => None,
    }
}

/// Sniffer worker: forward every traffic record to all current viewers.
async fn sniffer_loop<S>(
    registry: &Registry<S>,
    reader: &mut FrameReader<ReadHalf<S>>,
    ssid: u32,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + 'static,
{
    loop {
        let frame = match reader.read_frame().await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                warn!(ssid, error = %e, "sniffer connection failed");
                break;
            },
        };

        if frame.msg_type() != Some(MsgType::TrafficLog) {
            continue;
        }

        let record: PacketRecord = match serde_json::from_slice(&frame.payload) {
            Ok(record) => record,
            Err(e) => {
                warn!(ssid, error = %e, "unparseable traffic record, dropping sniffer");
                break;
            },
        };

        fan_out(registry, ssid, record).await;
    }
}

/// Deliver one record to every currently registered viewer.
async fn fan_out<S>(registry: &Registry<S>, ssid: u32, record: PacketRecord)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + 'static,
{
    let frame = match Payload::ForwardLog(ForwardLog { ssid, log: record }).into_frame() {
        Ok(frame) => frame,
        Err(e) => {
            // A record that no longer fits once wrapped is dropped, not
            // fatal: the next record is independent.
            debug!(ssid, error = %e, "record too large to forward");
            return;
        },
    };

    // Snapshot under the lock, write outside it.
    let targets = registry.lock().await.viewers();

    let mut dead = Vec::new();
    for (viewer_ssid, writer) in targets {
        let mut w = writer.lock().await;
        if let Err(e) = netspan_core::write_frame(&mut *w, &frame).await {
            debug!(viewer_ssid, error = %e, "viewer write failed");
            let _ = w.shutdown().await;
            dead.push(viewer_ssid);
        }
    }

    if !dead.is_empty() {
        let mut reg = registry.lock().await;
        for viewer_ssid in dead {
            if reg.remove(viewer_ssid).is_some() {
                info!(viewer_ssid, "viewer removed after send failure");
            }
        }
    }
}

/// Viewer worker: a liveness sentinel.
///
/// Viewers send nothing after the hello, so this blocks on the transport
/// waiting for closure. Frames that do arrive are discarded; all
/// outbound traffic on the connection comes from sniffer workers.
async fn viewer_loop<R>(reader: &mut FrameReader<R>, ssid: u32)
where
    R: tokio::io::AsyncRead + Unpin,
{
    loop {
        match reader.read_frame().await {
            Ok(Some(frame)) => {
                debug!(ssid, kind = frame.kind(), "ignoring frame from viewer");
            },
            Ok(None) => break,
            Err(e) => {
                debug!(ssid, error = %e, "viewer connection failed");
                break;
            },
        }
    }
}
