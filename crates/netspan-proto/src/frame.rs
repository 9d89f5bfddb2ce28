//! Frame envelope encoding and stream reassembly.
//!
//! A [`Frame`] is the transport unit shared by all three roles:
//!
//! ```text
//! [Version:1][Type:1][Length:2 BE][Payload:N][Terminator:1]
//! ```
//!
//! The frame holds the raw type byte and raw payload bytes, NOT a parsed
//! payload. This lets the hub forward traffic records without committing
//! to a schema, and lets handlers ignore frames whose type they do not
//! recognize. For high-level payloads see [`crate::payloads::Payload`].

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    MsgType,
    errors::{ProtocolError, Result},
};

/// Current protocol version; any other version byte is fatal
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Frame end marker (ASCII line feed)
pub const TERMINATOR: u8 = 0x0A;

/// Maximum payload size in bytes; frames are never fragmented
pub const MAX_PAYLOAD_SIZE: usize = 1024;

/// Fixed prefix: version + type + big-endian length
pub const HEADER_SIZE: usize = 4;

/// A complete protocol frame
///
/// # Invariants
///
/// - **Size Limit**: `payload.len()` MUST NOT exceed [`MAX_PAYLOAD_SIZE`].
///   Violations are rejected during encoding; decoded frames always
///   satisfy the limit.
/// - **Raw Type**: the type byte is stored unvalidated. Reassembly only
///   needs the length field; whether an unknown type is ignorable is the
///   receiving role's decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw message type byte
    kind: u8,
    /// Raw payload bytes (JSON, not yet parsed)
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame for a known message type.
    #[must_use]
    pub fn new(msg_type: MsgType, payload: impl Into<Bytes>) -> Self {
        Self { kind: msg_type.to_u8(), payload: payload.into() }
    }

    /// Raw type byte as it appeared on the wire.
    #[must_use]
    pub fn kind(&self) -> u8 {
        self.kind
    }

    /// Message type, if this protocol version defines the code.
    #[must_use]
    pub fn msg_type(&self) -> Option<MsgType> {
        MsgType::from_u8(self.kind)
    }

    /// Encode the frame into a buffer.
    ///
    /// Writes the five wire regions in order. Nothing is written if the
    /// payload exceeds [`MAX_PAYLOAD_SIZE`], so a failed encode never
    /// leaves a half-frame in `dst`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::PayloadTooLarge`] if the payload exceeds
    /// the 1024-byte cap.
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        if self.payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: self.payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        #[allow(clippy::cast_possible_truncation)] // bounded by MAX_PAYLOAD_SIZE above
        let len = self.payload.len() as u16;

        dst.put_u8(PROTOCOL_VERSION);
        dst.put_u8(self.kind);
        dst.put_u16(len);
        dst.put_slice(&self.payload);
        dst.put_u8(TERMINATOR);

        Ok(())
    }

    /// Encode into a fresh `Vec<u8>`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Frame::encode`].
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.payload.len() + 1);
        self.encode(&mut buf)?;
        Ok(buf)
    }
}

/// Incremental frame reassembler for a byte stream.
///
/// TCP (and any stream transport) delivers arbitrary chunks. The decoder
/// accumulates pushed bytes and yields complete frames:
///
/// ```
/// use netspan_proto::{Frame, FrameDecoder, MsgType};
///
/// let frame = Frame::new(MsgType::TrafficLog, &b"{\"a\":1}"[..]);
/// let wire = frame.to_bytes().unwrap();
///
/// let mut decoder = FrameDecoder::new();
/// decoder.push(&wire[..5]);
/// assert!(decoder.next_frame().unwrap().is_none()); // partial
/// decoder.push(&wire[5..]);
/// assert_eq!(decoder.next_frame().unwrap(), Some(frame));
/// assert!(decoder.is_empty());
/// ```
///
/// # Failure semantics
///
/// A fatal violation (bad version, oversized length, bad terminator)
/// discards the entire buffer and returns the error; the caller must
/// close the connection. Partial frames are never consumed, so feeding a
/// valid frame byte-by-byte yields exactly that frame.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    /// Create an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self { buf: BytesMut::new() }
    }

    /// Append raw bytes received from the transport.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of buffered bytes not yet consumed by a frame.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// True if no bytes are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Produce the next complete frame, or `None` if more bytes are
    /// needed.
    ///
    /// Call in a loop after every [`push`](Self::push): a single chunk may
    /// complete zero, one, or several frames.
    ///
    /// # Errors
    ///
    /// Returns a fatal [`ProtocolError`] on a version, length, or
    /// terminator violation. The internal buffer is discarded; the
    /// connection that produced the bytes must be closed.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.buf.len() < HEADER_SIZE {
            return Ok(None);
        }

        let version = self.buf[0];
        if version != PROTOCOL_VERSION {
            self.buf.clear();
            return Err(ProtocolError::UnsupportedVersion(version));
        }

        let kind = self.buf[1];
        let len = usize::from(u16::from_be_bytes([self.buf[2], self.buf[3]]));
        if len > MAX_PAYLOAD_SIZE {
            self.buf.clear();
            return Err(ProtocolError::PayloadTooLarge { size: len, max: MAX_PAYLOAD_SIZE });
        }

        let total = HEADER_SIZE + len + 1;
        if self.buf.len() < total {
            return Ok(None);
        }

        let term = self.buf[HEADER_SIZE + len];
        if term != TERMINATOR {
            self.buf.clear();
            return Err(ProtocolError::InvalidTerminator(term));
        }

        let frame_bytes = self.buf.split_to(total).freeze();
        let payload = frame_bytes.slice(HEADER_SIZE..HEADER_SIZE + len);

        Ok(Some(Frame { kind, payload }))
    }
}
