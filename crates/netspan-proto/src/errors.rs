//! Error types for the netspan wire protocol.
//!
//! All errors are structured, testable, and carry enough context to log a
//! useful line before the offending connection is closed.

use thiserror::Error;

/// Protocol-level errors raised during frame encoding, decoding, and
/// payload (de)serialization.
///
/// Every variant except the JSON pair is a *fatal framing error*: the
/// decoder discards its buffer and the caller must close the connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame carried a version byte other than `0x01`
    #[error("unsupported protocol version: {0:#04x}")]
    UnsupportedVersion(u8),

    /// Payload exceeds the 1024-byte cap
    #[error("payload too large: {size} bytes exceeds maximum {max}")]
    PayloadTooLarge {
        /// Actual payload size
        size: usize,
        /// Maximum allowed size
        max: usize,
    },

    /// Frame did not end with the `0x0A` terminator
    #[error("invalid frame terminator: {0:#04x}")]
    InvalidTerminator(u8),

    /// Received a frame whose type does not match what the exchange requires
    #[error("unexpected message type: {actual:#04x}, expected {expected:#04x}")]
    UnexpectedType {
        /// Type code required at this point of the exchange
        expected: u8,
        /// Type code actually received
        actual: u8,
    },

    /// Frame type byte is not defined by this protocol version
    #[error("unknown message type: {0:#04x}")]
    UnknownType(u8),

    /// Failed to serialize a payload as JSON
    #[error("failed to encode JSON payload: {0}")]
    JsonEncode(String),

    /// Failed to parse a payload as JSON
    #[error("failed to decode JSON payload: {0}")]
    JsonDecode(String),
}

/// Convenient Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;
