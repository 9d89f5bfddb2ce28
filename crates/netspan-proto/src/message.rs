//! Message type codes for netspan protocol frames.
//!
//! The type byte is the second byte of every frame and selects the JSON
//! payload schema. Unknown codes are not a framing error: reassembly
//! succeeds and the *handler* decides whether to ignore the frame (the
//! hub ignores unknown types from sniffers) or drop the connection.

/// Frame message types
///
/// Each type corresponds to one payload schema in [`crate::payloads`].
///
/// # Representation
///
/// Types are serialized as a single byte on the wire. The `#[repr(u8)]`
/// ensures stable numeric values for wire compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MsgType {
    /// Client introduces itself immediately after connecting
    ClientHello = 0x01,
    /// Hub acknowledges a client and assigns its SSID
    ServerHello = 0x02,
    /// Sniffer ships one decoded packet record
    TrafficLog = 0x03,
    /// Hub fans a sniffer record out to a viewer
    ForwardLog = 0x04,
    /// Error notification
    Error = 0x05,
}

impl MsgType {
    /// Convert to the raw wire byte
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Convert from a raw wire byte
    ///
    /// Returns `None` for codes this protocol version does not define.
    /// Callers decide whether an unknown code is ignorable or fatal; the
    /// framing layer itself only needs the length field to reassemble.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::ClientHello),
            0x02 => Some(Self::ServerHello),
            0x03 => Some(Self::TrafficLog),
            0x04 => Some(Self::ForwardLog),
            0x05 => Some(Self::Error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msg_type_round_trip() {
        let types = [
            MsgType::ClientHello,
            MsgType::ServerHello,
            MsgType::TrafficLog,
            MsgType::ForwardLog,
            MsgType::Error,
        ];

        for t in types {
            assert_eq!(MsgType::from_u8(t.to_u8()), Some(t));
        }
    }

    #[test]
    fn unknown_codes() {
        assert_eq!(MsgType::from_u8(0x00), None);
        assert_eq!(MsgType::from_u8(0x06), None);
        assert_eq!(MsgType::from_u8(0xFF), None);
    }
}
