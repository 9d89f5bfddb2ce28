//! Structured per-packet records.
//!
//! A [`PacketRecord`] is the decoder's output for one captured packet and
//! the payload of `TrafficLog` frames. Records are immutable once
//! emitted; the hub forwards them verbatim inside `ForwardLog`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One decoded packet.
///
/// Field presence depends on the transport protocol: ports for TCP/UDP,
/// the `icmp_*` group for ICMP (id/seq only for echo request/reply).
/// `ssid` is embedded by the sniffer agent before upload; the hub's outer
/// `ForwardLog.ssid` is authoritative and viewers should prefer it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketRecord {
    /// Local capture time, `YYYY-MM-DD HH:MM:SS.uuuuuu`
    pub timestamp: String,
    /// `TCP`, `UDP`, `ICMP`, or the decimal IPv4 protocol number
    pub protocol: String,
    /// Source IPv4 address, dotted quad
    pub src: String,
    /// Destination IPv4 address, dotted quad
    pub dst: String,
    /// Captured transport payload length in bytes (protocol-specific, see
    /// the decoder)
    pub length: u32,

    /// Source port (TCP/UDP)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub src_port: Option<u16>,
    /// Destination port (TCP/UDP)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dst_port: Option<u16>,

    /// ICMP message type
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub icmp_type: Option<u8>,
    /// ICMP message code
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub icmp_code: Option<u8>,
    /// ICMP echo identifier (types 0 and 8 only)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub icmp_id: Option<u16>,
    /// ICMP echo sequence number (types 0 and 8 only)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub icmp_seq: Option<u16>,

    /// Redundant session id embedded by the agent before upload
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ssid: Option<u32>,
}

/// Human name for an ICMP message type.
///
/// The table is closed; anything outside it renders as `"Unknown ICMP"`.
#[must_use]
pub fn icmp_type_name(icmp_type: u8) -> &'static str {
    match icmp_type {
        0 => "Echo Reply",
        3 => "Destination Unreachable",
        4 => "Source Quench",
        5 => "Redirect",
        8 => "Echo Request",
        11 => "Time Exceeded",
        12 => "Parameter Problem",
        13 => "Timestamp Request",
        14 => "Timestamp Reply",
        _ => "Unknown ICMP",
    }
}

impl fmt::Display for PacketRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.timestamp, self.protocol)?;

        match (self.src_port, self.dst_port) {
            (Some(sp), Some(dp)) => {
                write!(f, " {}:{} -> {}:{}", self.src, sp, self.dst, dp)?;
            },
            _ => write!(f, " {} -> {}", self.src, self.dst)?,
        }

        if let (Some(t), Some(c)) = (self.icmp_type, self.icmp_code) {
            write!(f, " {} (type={}, code={})", icmp_type_name(t), t, c)?;
            if let (Some(id), Some(seq)) = (self.icmp_id, self.icmp_seq) {
                write!(f, " id={id} seq={seq}")?;
            }
        }

        write!(f, " len={}", self.length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tcp_record() -> PacketRecord {
        PacketRecord {
            timestamp: "2026-01-15 10:30:00.000123".to_string(),
            protocol: "TCP".to_string(),
            src: "10.0.0.1".to_string(),
            dst: "10.0.0.2".to_string(),
            length: 20,
            src_port: Some(80),
            dst_port: Some(45067),
            icmp_type: None,
            icmp_code: None,
            icmp_id: None,
            icmp_seq: None,
            ssid: None,
        }
    }

    #[test]
    fn json_omits_absent_fields() {
        let json = serde_json::to_value(tcp_record()).unwrap();
        let obj = json.as_object().unwrap();
        assert!(obj.contains_key("src_port"));
        assert!(!obj.contains_key("icmp_type"));
        assert!(!obj.contains_key("ssid"));
    }

    #[test]
    fn json_round_trip_preserves_embedded_ssid() {
        let mut record = tcp_record();
        record.ssid = Some(7);

        let json = serde_json::to_string(&record).unwrap();
        let parsed: PacketRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn display_tcp() {
        assert_eq!(
            tcp_record().to_string(),
            "2026-01-15 10:30:00.000123 TCP 10.0.0.1:80 -> 10.0.0.2:45067 len=20"
        );
    }

    #[test]
    fn display_icmp_echo() {
        let record = PacketRecord {
            timestamp: "2026-01-15 10:30:00.000123".to_string(),
            protocol: "ICMP".to_string(),
            src: "10.0.0.1".to_string(),
            dst: "10.0.0.2".to_string(),
            length: 8,
            src_port: None,
            dst_port: None,
            icmp_type: Some(8),
            icmp_code: Some(0),
            icmp_id: Some(4660),
            icmp_seq: Some(1),
            ssid: None,
        };
        assert_eq!(
            record.to_string(),
            "2026-01-15 10:30:00.000123 ICMP 10.0.0.1 -> 10.0.0.2 \
             Echo Request (type=8, code=0) id=4660 seq=1 len=8"
        );
    }

    #[test]
    fn icmp_names_closed_table() {
        assert_eq!(icmp_type_name(0), "Echo Reply");
        assert_eq!(icmp_type_name(8), "Echo Request");
        assert_eq!(icmp_type_name(14), "Timestamp Reply");
        assert_eq!(icmp_type_name(9), "Unknown ICMP");
        assert_eq!(icmp_type_name(255), "Unknown ICMP");
    }
}
