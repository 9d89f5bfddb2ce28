//! # Netspan Protocol: Wire Format
//!
//! This crate implements the binary framing layer shared by every role in
//! the netspan pipeline: sniffer agents, the aggregation hub, and viewer
//! clients.
//!
//! ## Protocol Design
//!
//! Every message travels in the same five-region envelope:
//!
//! ```text
//! [Version:1][Type:1][Length:2 BE][Payload:N][Terminator:1]
//! ```
//!
//! - **Version** is fixed at `0x01`; any other value is a fatal framing
//!   error and the connection carrying it must be closed.
//! - **Type** selects the payload schema (see [`MsgType`]).
//! - **Length** is big-endian and bounded by [`MAX_PAYLOAD_SIZE`] (1024
//!   bytes). Frames are never fragmented; an oversized payload is a
//!   protocol error, not a segmentation problem.
//! - **Payload** is a UTF-8 JSON document. The v0x01 contract is JSON;
//!   swapping in a binary payload encoding requires a version bump.
//! - **Terminator** is a single `0x0A` byte validating the frame boundary.
//!
//! ## Stream Reassembly
//!
//! TCP delivers bytes, not frames. [`FrameDecoder`] accumulates arbitrary
//! chunks and yields complete frames, never consuming a partial frame and
//! discarding everything on a fatal violation. Both the hub's blocking
//! read path and the viewer's push-driven path parse with the exact same
//! rules.
//!
//! ## Security Properties
//!
//! - **Size Limits**: the 1024-byte payload cap is enforced before any
//!   payload allocation on both encode and decode.
//! - **Explicit Validation**: all parsing returns `Result`; there is no
//!   unchecked fast path.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
pub mod frame;
pub mod message;
pub mod payloads;
pub mod record;

pub use errors::{ProtocolError, Result};
pub use frame::{Frame, FrameDecoder, HEADER_SIZE, MAX_PAYLOAD_SIZE, PROTOCOL_VERSION, TERMINATOR};
pub use message::MsgType;
pub use payloads::{ClientHello, ErrorPayload, ForwardLog, Payload, Role, ServerHello};
pub use record::PacketRecord;
