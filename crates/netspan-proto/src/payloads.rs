//! JSON frame payloads.
//!
//! Each message type has a corresponding payload schema. The [`Payload`]
//! enum provides type-safe payload handling with serde_json
//! (de)serialization; the frame header's type byte identifies the schema,
//! so no variant tag travels on the wire.
//!
//! JSON is the v0x01 contract: it keeps every payload printable during
//! debugging, at the cost of a few bytes per frame. A binary payload
//! encoding would require a protocol version bump.

use serde::{Deserialize, Serialize};

use crate::{
    Frame, MsgType, PacketRecord,
    errors::{ProtocolError, Result},
};

/// Client role, derived from the `ClientHello` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Produces `TrafficLog` frames from a capture tap
    Sniffer,
    /// Consumes `ForwardLog` frames for an operator UI
    Viewer,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sniffer => write!(f, "sniffer"),
            Self::Viewer => write!(f, "viewer"),
        }
    }
}

/// First frame a client sends after connecting.
///
/// Sniffers announce the interface they capture on; viewers announce
/// themselves as `"type": "gui"`. Role discrimination at the hub is the
/// presence of the `interface` key and nothing else; a payload carrying
/// both keys counts as a sniffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientHello {
    /// Client machine hostname, for operator display
    pub hostname: String,
    /// Capture interface name; present if and only if the client sniffs
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub interface: Option<String>,
    /// Client kind tag; viewers send `"gui"`
    #[serde(rename = "type", skip_serializing_if = "Option::is_none", default)]
    pub client_type: Option<String>,
}

impl ClientHello {
    /// Hello for a sniffer capturing on `interface`.
    #[must_use]
    pub fn sniffer(hostname: impl Into<String>, interface: impl Into<String>) -> Self {
        Self { hostname: hostname.into(), interface: Some(interface.into()), client_type: None }
    }

    /// Hello for a viewer client.
    #[must_use]
    pub fn viewer(hostname: impl Into<String>) -> Self {
        Self { hostname: hostname.into(), interface: None, client_type: Some("gui".to_string()) }
    }

    /// Determine the client role.
    ///
    /// The `interface` key is the only test; an ambiguous payload that
    /// also carries `"type": "gui"` is still a sniffer.
    #[must_use]
    pub fn role(&self) -> Role {
        if self.interface.is_some() { Role::Sniffer } else { Role::Viewer }
    }
}

/// Hub response to [`ClientHello`], carrying the assigned session id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerHello {
    /// Assigned session id, unique and increasing per hub process
    pub ssid: u32,
    /// Peer address as the hub observed it
    pub ip: String,
    /// Always `true`; reserved for future rejection responses
    pub registered: bool,
}

/// Fan-out envelope the hub sends to viewers.
///
/// The outer `ssid` identifies the originating sniffer session and is
/// authoritative over any `ssid` the agent embedded in the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardLog {
    /// Originating sniffer session id
    pub ssid: u32,
    /// The forwarded packet record
    pub log: PacketRecord,
}

/// Error notification, sendable by any role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Human-readable error message
    pub error: String,
}

/// All payload schemas, keyed by [`MsgType`].
///
/// # Invariants
///
/// - **Type Uniqueness**: each variant maps to exactly one `MsgType`.
/// - **Round Trip**: `Payload::from_frame(payload.into_frame()?)` is
///   identity for every variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Client introduction
    ClientHello(ClientHello),
    /// Hub acknowledgment with SSID
    ServerHello(ServerHello),
    /// One packet record from a sniffer
    TrafficLog(PacketRecord),
    /// One record fanned out to a viewer
    ForwardLog(ForwardLog),
    /// Error notification
    Error(ErrorPayload),
}

impl Payload {
    /// The message type for this payload variant.
    #[must_use]
    pub const fn msg_type(&self) -> MsgType {
        match self {
            Self::ClientHello(_) => MsgType::ClientHello,
            Self::ServerHello(_) => MsgType::ServerHello,
            Self::TrafficLog(_) => MsgType::TrafficLog,
            Self::ForwardLog(_) => MsgType::ForwardLog,
            Self::Error(_) => MsgType::Error,
        }
    }

    /// Serialize into a complete frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::JsonEncode`] if serialization fails and
    /// [`ProtocolError::PayloadTooLarge`] if the JSON document exceeds
    /// the frame payload cap.
    pub fn into_frame(self) -> Result<Frame> {
        let bytes = match &self {
            Self::ClientHello(inner) => serde_json::to_vec(inner),
            Self::ServerHello(inner) => serde_json::to_vec(inner),
            Self::TrafficLog(inner) => serde_json::to_vec(inner),
            Self::ForwardLog(inner) => serde_json::to_vec(inner),
            Self::Error(inner) => serde_json::to_vec(inner),
        }
        .map_err(|e| ProtocolError::JsonEncode(e.to_string()))?;

        if bytes.len() > crate::MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: bytes.len(),
                max: crate::MAX_PAYLOAD_SIZE,
            });
        }

        Ok(Frame::new(self.msg_type(), bytes))
    }

    /// Parse the payload of a frame according to its type byte.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnknownType`] for type codes this version
    /// does not define and [`ProtocolError::JsonDecode`] when the payload
    /// is not valid JSON for the schema.
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let msg_type = frame.msg_type().ok_or(ProtocolError::UnknownType(frame.kind()))?;

        fn parse<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T> {
            serde_json::from_slice(bytes).map_err(|e| ProtocolError::JsonDecode(e.to_string()))
        }

        Ok(match msg_type {
            MsgType::ClientHello => Self::ClientHello(parse(&frame.payload)?),
            MsgType::ServerHello => Self::ServerHello(parse(&frame.payload)?),
            MsgType::TrafficLog => Self::TrafficLog(parse(&frame.payload)?),
            MsgType::ForwardLog => Self::ForwardLog(parse(&frame.payload)?),
            MsgType::Error => Self::Error(parse(&frame.payload)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffer_hello_wire_shape() {
        let hello = ClientHello::sniffer("darkstar.local", "en0");
        let json = serde_json::to_value(&hello).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"hostname": "darkstar.local", "interface": "en0"})
        );
        assert_eq!(hello.role(), Role::Sniffer);
    }

    #[test]
    fn viewer_hello_wire_shape() {
        let hello = ClientHello::viewer("ops-console");
        let json = serde_json::to_value(&hello).unwrap();
        assert_eq!(json, serde_json::json!({"hostname": "ops-console", "type": "gui"}));
        assert_eq!(hello.role(), Role::Viewer);
    }

    #[test]
    fn ambiguous_hello_is_sniffer() {
        let hello: ClientHello =
            serde_json::from_str(r#"{"hostname":"h","interface":"en0","type":"gui"}"#).unwrap();
        assert_eq!(hello.role(), Role::Sniffer);
    }

    #[test]
    fn hello_with_unknown_fields_still_parses() {
        let hello: ClientHello =
            serde_json::from_str(r#"{"hostname":"h","type":"gui","build":"v2"}"#).unwrap();
        assert_eq!(hello.role(), Role::Viewer);
    }

    #[test]
    fn payload_round_trip() {
        let payloads = [
            Payload::ClientHello(ClientHello::sniffer("host", "en0")),
            Payload::ServerHello(ServerHello {
                ssid: 3,
                ip: "192.168.1.50".to_string(),
                registered: true,
            }),
            Payload::Error(ErrorPayload { error: "nope".to_string() }),
        ];

        for payload in payloads {
            let frame = payload.clone().into_frame().unwrap();
            assert_eq!(frame.msg_type(), Some(payload.msg_type()));
            assert_eq!(Payload::from_frame(&frame).unwrap(), payload);
        }
    }

    #[test]
    fn from_frame_rejects_unknown_type() {
        let mut decoder = crate::FrameDecoder::new();
        decoder.push(&[0x01, 0x42, 0x00, 0x02, b'{', b'}', 0x0A]);
        let frame = decoder.next_frame().unwrap().unwrap();
        assert_eq!(Payload::from_frame(&frame), Err(ProtocolError::UnknownType(0x42)));
    }

    #[test]
    fn from_frame_rejects_bad_json() {
        let frame = Frame::new(MsgType::ServerHello, &b"not json"[..]);
        assert!(matches!(Payload::from_frame(&frame), Err(ProtocolError::JsonDecode(_))));
    }
}
