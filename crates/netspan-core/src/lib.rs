//! Netspan core logic.
//!
//! This crate holds the pieces shared by the sniffer agent, the
//! aggregation hub, and the viewer engine, kept free of any concrete
//! network endpoint so the same code runs under production tokio and
//! under deterministic simulation:
//!
//! - [`capture`]: walking a kernel capture-tap batch buffer with strict
//!   bounds checking
//! - [`decode`]: pure protocol decoders (Ethernet/IPv4/TCP/UDP/ICMP)
//!   emitting structured records
//! - [`registry`]: the hub's session registry (SSID allocation, role
//!   tracking, viewer snapshots for fan-out)
//! - [`codec`]: frame I/O over `AsyncRead`/`AsyncWrite`
//! - [`transport`]: the listener abstraction that lets the hub accept
//!   from real TCP or a simulated network
//!
//! The decoders in [`capture`] and [`decode`] are purely synchronous over
//! an already-delivered batch; they have no suspension points and never
//! allocate per-byte. Everything network-facing goes through [`codec`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod capture;
pub mod codec;
pub mod decode;
pub mod error;
pub mod registry;
pub mod transport;

pub use capture::{BatchWalker, CaptureTimestamp, CapturedPacket};
pub use codec::{FrameReader, write_frame, write_payload};
pub use decode::{RecordSink, decode_packet, process_batch};
pub use error::WireError;
pub use registry::{Session, SessionRegistry};
pub use transport::Accept;
