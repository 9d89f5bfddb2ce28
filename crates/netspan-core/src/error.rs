//! Error types for frame I/O.
//!
//! Protocol violations and transport failures call for different
//! dispositions at every call site (close-and-log versus
//! retry-or-propagate), so they stay distinct variants instead of being
//! flattened into `io::Error`.

use netspan_proto::ProtocolError;
use thiserror::Error;

/// Errors surfaced while reading or writing frames on a transport.
#[derive(Error, Debug)]
pub enum WireError {
    /// The peer violated the framing contract; the connection must be
    /// closed and any buffered bytes discarded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The underlying transport failed (including a connection that
    /// closed mid-frame).
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

impl WireError {
    /// True if this error is a framing violation rather than a transport
    /// failure.
    #[must_use]
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let protocol: WireError = ProtocolError::UnsupportedVersion(9).into();
        assert!(protocol.is_protocol());

        let io: WireError = std::io::Error::from(std::io::ErrorKind::BrokenPipe).into();
        assert!(!io.is_protocol());
    }
}
