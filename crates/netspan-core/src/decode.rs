//! Protocol decoders: Ethernet → IPv4 → TCP/UDP/ICMP.
//!
//! Every decoder is a pure function over an immutable slice and a capture
//! timestamp, producing either a [`PacketRecord`] or a silent drop. Each
//! one validates its minimum header size before touching a field, and
//! every multi-byte field is read with an explicit network-to-host
//! conversion; no decoder can read past its slice or panic, whatever the
//! input.
//!
//! Only IPv4 over Ethernet is decoded. Other EtherTypes (ARP, IPv6, ...)
//! are dropped without a record; IPv4 protocols beyond TCP/UDP/ICMP
//! produce a record carrying the decimal protocol number so the operator
//! still sees the flow.

use netspan_proto::PacketRecord;

use crate::capture::{BatchWalker, CaptureTimestamp};

/// Minimum Ethernet header: two MACs plus the EtherType.
const ETHERNET_HEADER_LEN: usize = 14;
/// EtherType for IPv4.
const ETHERTYPE_IPV4: u16 = 0x0800;
/// IPv4 header without options.
const IPV4_MIN_HEADER_LEN: usize = 20;
/// TCP header without options.
const TCP_MIN_HEADER_LEN: usize = 20;
/// Fixed UDP header.
const UDP_HEADER_LEN: usize = 8;
/// Fixed ICMP header (type, code, checksum, rest-of-header).
const ICMP_HEADER_LEN: usize = 8;

const IPPROTO_ICMP: u8 = 1;
const IPPROTO_TCP: u8 = 6;
const IPPROTO_UDP: u8 = 17;

const ICMP_ECHO_REPLY: u8 = 0;
const ICMP_ECHO_REQUEST: u8 = 8;

/// The single capability the decode pipeline needs from its surroundings:
/// accept one record.
///
/// A connected sniffer submits records to the hub uplink; a standalone
/// sniffer renders them to stdout. The decoders neither know nor care.
pub trait RecordSink {
    /// Consume one decoded record.
    fn accept(&mut self, record: PacketRecord);
}

impl<F: FnMut(PacketRecord)> RecordSink for F {
    fn accept(&mut self, record: PacketRecord) {
        self(record);
    }
}

/// Walk a capture batch and feed every decodable packet to `sink`.
///
/// Packet decode failures are independent: a malformed packet is dropped
/// and the walk continues. Only structural truncation of the batch itself
/// ends the walk early (see [`BatchWalker`]).
pub fn process_batch(batch: &[u8], sink: &mut impl RecordSink) {
    for packet in BatchWalker::new(batch) {
        if let Some(record) = decode_packet(packet.bytes, packet.timestamp) {
            sink.accept(record);
        }
    }
}

/// Decode one link-layer frame into a record.
///
/// Entry point of the decode pipeline; returns `None` for anything that
/// is not IPv4 over Ethernet or that fails a bounds check further down.
#[must_use]
pub fn decode_packet(bytes: &[u8], timestamp: CaptureTimestamp) -> Option<PacketRecord> {
    if bytes.len() < ETHERNET_HEADER_LEN {
        return None;
    }

    let ethertype = u16::from_be_bytes([bytes[12], bytes[13]]);
    if ethertype != ETHERTYPE_IPV4 {
        return None;
    }

    decode_ipv4(&bytes[ETHERNET_HEADER_LEN..], timestamp)
}

/// Decode an IPv4 header and dispatch on its protocol field.
fn decode_ipv4(bytes: &[u8], timestamp: CaptureTimestamp) -> Option<PacketRecord> {
    if bytes.len() < IPV4_MIN_HEADER_LEN {
        return None;
    }

    // Low nibble of the first byte is the header length in 32-bit words.
    let ihl = usize::from(bytes[0] & 0x0F);
    let header_len = ihl * 4;
    if ihl < 5 || bytes.len() < header_len {
        return None;
    }

    let protocol = bytes[9];
    let total_len = u16::from_be_bytes([bytes[2], bytes[3]]);
    let src = dotted_quad([bytes[12], bytes[13], bytes[14], bytes[15]]);
    let dst = dotted_quad([bytes[16], bytes[17], bytes[18], bytes[19]]);

    let transport = &bytes[header_len..];
    let base = PacketRecord {
        timestamp: format_timestamp(timestamp),
        protocol: String::new(),
        src,
        dst,
        length: 0,
        src_port: None,
        dst_port: None,
        icmp_type: None,
        icmp_code: None,
        icmp_id: None,
        icmp_seq: None,
        ssid: None,
    };

    match protocol {
        IPPROTO_ICMP => decode_icmp(transport, base),
        IPPROTO_TCP => decode_tcp(transport, base),
        IPPROTO_UDP => decode_udp(transport, base),
        other => {
            // Unfamiliar transport: still worth a record, keyed by the
            // decimal protocol number and the IPv4 total length.
            let mut record = base;
            record.protocol = other.to_string();
            record.length = u32::from(total_len);
            Some(record)
        },
    }
}

/// TCP: ports plus the captured length of header-and-payload.
fn decode_tcp(bytes: &[u8], mut record: PacketRecord) -> Option<PacketRecord> {
    if bytes.len() < TCP_MIN_HEADER_LEN {
        return None;
    }

    record.protocol = "TCP".to_string();
    record.src_port = Some(u16::from_be_bytes([bytes[0], bytes[1]]));
    record.dst_port = Some(u16::from_be_bytes([bytes[2], bytes[3]]));
    record.length = bytes.len() as u32;
    Some(record)
}

/// UDP: ports plus the datagram length claimed by the UDP header.
fn decode_udp(bytes: &[u8], mut record: PacketRecord) -> Option<PacketRecord> {
    if bytes.len() < UDP_HEADER_LEN {
        return None;
    }

    record.protocol = "UDP".to_string();
    record.src_port = Some(u16::from_be_bytes([bytes[0], bytes[1]]));
    record.dst_port = Some(u16::from_be_bytes([bytes[2], bytes[3]]));
    record.length = u32::from(u16::from_be_bytes([bytes[4], bytes[5]]));
    Some(record)
}

/// ICMP: type and code always; echo id/seq for request/reply only.
fn decode_icmp(bytes: &[u8], mut record: PacketRecord) -> Option<PacketRecord> {
    if bytes.len() < ICMP_HEADER_LEN {
        return None;
    }

    let icmp_type = bytes[0];
    record.protocol = "ICMP".to_string();
    record.icmp_type = Some(icmp_type);
    record.icmp_code = Some(bytes[1]);
    record.length = bytes.len() as u32;

    if icmp_type == ICMP_ECHO_REQUEST || icmp_type == ICMP_ECHO_REPLY {
        record.icmp_id = Some(u16::from_be_bytes([bytes[4], bytes[5]]));
        record.icmp_seq = Some(u16::from_be_bytes([bytes[6], bytes[7]]));
    }

    Some(record)
}

fn dotted_quad(octets: [u8; 4]) -> String {
    std::net::Ipv4Addr::from(octets).to_string()
}

/// Format a capture timestamp as local time with microsecond precision:
/// `YYYY-MM-DD HH:MM:SS.uuuuuu`.
#[must_use]
pub fn format_timestamp(ts: CaptureTimestamp) -> String {
    let micros = ts.micros % 1_000_000;
    let datetime = chrono::DateTime::from_timestamp(i64::from(ts.secs), micros * 1_000)
        .unwrap_or_default()
        .with_timezone(&chrono::Local);
    format!("{}.{micros:06}", datetime.format("%Y-%m-%d %H:%M:%S"))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const TS: CaptureTimestamp = CaptureTimestamp { secs: 1_765_900_000, micros: 123 };

    /// Ethernet header with the given EtherType; MACs are irrelevant.
    fn ethernet(ethertype: u16) -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 0, 0, 0];
        bytes.extend_from_slice(&ethertype.to_be_bytes());
        bytes
    }

    /// Minimal IPv4 header (IHL=5) for the given protocol and addresses.
    fn ipv4(protocol: u8, src: [u8; 4], dst: [u8; 4], total_len: u16) -> Vec<u8> {
        let mut hdr = vec![0u8; 20];
        hdr[0] = 0x45; // version 4, IHL 5
        hdr[2..4].copy_from_slice(&total_len.to_be_bytes());
        hdr[8] = 64; // TTL
        hdr[9] = protocol;
        hdr[12..16].copy_from_slice(&src);
        hdr[16..20].copy_from_slice(&dst);
        hdr
    }

    #[test]
    fn arp_frame_emits_nothing() {
        // 14 bytes, EtherType 0x0806 (ARP).
        let frame = ethernet(0x0806);
        assert_eq!(frame.len(), 14);
        assert!(decode_packet(&frame, TS).is_none());
    }

    #[test]
    fn ipv4_tcp_scenario() {
        let mut frame = ethernet(0x0800);
        frame.extend_from_slice(&ipv4(6, [10, 0, 0, 1], [10, 0, 0, 2], 0x0028));
        let mut tcp = vec![0u8; 20];
        tcp[0..2].copy_from_slice(&0x0050u16.to_be_bytes()); // sport 80
        tcp[2..4].copy_from_slice(&0xB00Bu16.to_be_bytes()); // dport 45067
        frame.extend_from_slice(&tcp);
        assert_eq!(frame.len(), 54);

        let record = decode_packet(&frame, TS).unwrap();
        assert_eq!(record.protocol, "TCP");
        assert_eq!(record.src, "10.0.0.1");
        assert_eq!(record.dst, "10.0.0.2");
        assert_eq!(record.src_port, Some(80));
        assert_eq!(record.dst_port, Some(45067));
        assert_eq!(record.length, 20);
        assert!(record.timestamp.ends_with(".000123"));
    }

    #[test]
    fn ipv4_udp_uses_header_length_field() {
        let mut frame = ethernet(0x0800);
        frame.extend_from_slice(&ipv4(17, [192, 168, 0, 1], [192, 168, 0, 2], 0));
        let mut udp = vec![0u8; 12]; // header + 4 payload bytes
        udp[0..2].copy_from_slice(&5353u16.to_be_bytes());
        udp[2..4].copy_from_slice(&53u16.to_be_bytes());
        udp[4..6].copy_from_slice(&12u16.to_be_bytes()); // UDP length
        frame.extend_from_slice(&udp);

        let record = decode_packet(&frame, TS).unwrap();
        assert_eq!(record.protocol, "UDP");
        assert_eq!(record.src_port, Some(5353));
        assert_eq!(record.dst_port, Some(53));
        assert_eq!(record.length, 12);
    }

    #[test]
    fn icmp_echo_request_scenario() {
        let mut frame = ethernet(0x0800);
        frame.extend_from_slice(&ipv4(1, [10, 0, 0, 1], [10, 0, 0, 2], 0));
        let mut icmp = vec![0u8; 8];
        icmp[0] = 8; // echo request
        icmp[4..6].copy_from_slice(&0x1234u16.to_be_bytes());
        icmp[6..8].copy_from_slice(&0x0001u16.to_be_bytes());
        frame.extend_from_slice(&icmp);

        let record = decode_packet(&frame, TS).unwrap();
        assert_eq!(record.protocol, "ICMP");
        assert_eq!(record.icmp_type, Some(8));
        assert_eq!(record.icmp_code, Some(0));
        assert_eq!(record.icmp_id, Some(4660));
        assert_eq!(record.icmp_seq, Some(1));
    }

    #[test]
    fn icmp_non_echo_has_no_id_seq() {
        let mut frame = ethernet(0x0800);
        frame.extend_from_slice(&ipv4(1, [10, 0, 0, 1], [10, 0, 0, 2], 0));
        let mut icmp = vec![0u8; 8];
        icmp[0] = 11; // time exceeded
        icmp[1] = 1;
        frame.extend_from_slice(&icmp);

        let record = decode_packet(&frame, TS).unwrap();
        assert_eq!(record.icmp_type, Some(11));
        assert_eq!(record.icmp_code, Some(1));
        assert_eq!(record.icmp_id, None);
        assert_eq!(record.icmp_seq, None);
    }

    #[test]
    fn other_ipv4_protocol_keeps_decimal_number() {
        let mut frame = ethernet(0x0800);
        frame.extend_from_slice(&ipv4(47, [1, 2, 3, 4], [5, 6, 7, 8], 120)); // GRE

        let record = decode_packet(&frame, TS).unwrap();
        assert_eq!(record.protocol, "47");
        assert_eq!(record.length, 120);
        assert_eq!(record.src_port, None);
    }

    #[test]
    fn ihl_below_five_is_dropped() {
        let mut frame = ethernet(0x0800);
        let mut ip = ipv4(6, [1, 1, 1, 1], [2, 2, 2, 2], 40);
        ip[0] = 0x44; // IHL 4
        frame.extend_from_slice(&ip);
        frame.extend_from_slice(&[0u8; 20]);
        assert!(decode_packet(&frame, TS).is_none());
    }

    #[test]
    fn ihl_longer_than_capture_is_dropped() {
        let mut frame = ethernet(0x0800);
        let mut ip = ipv4(6, [1, 1, 1, 1], [2, 2, 2, 2], 40);
        ip[0] = 0x46; // IHL 6 => 24 bytes, but only 18 follow
        frame.extend_from_slice(&ip[..18]);
        assert!(decode_packet(&frame, TS).is_none());
    }

    #[test]
    fn truncated_transport_headers_are_dropped() {
        for (proto, len) in [(6u8, 19usize), (17, 7), (1, 7)] {
            let mut frame = ethernet(0x0800);
            frame.extend_from_slice(&ipv4(proto, [1, 1, 1, 1], [2, 2, 2, 2], 0));
            frame.extend_from_slice(&vec![0u8; len]);
            assert!(decode_packet(&frame, TS).is_none(), "proto {proto} len {len}");
        }
    }

    #[test]
    fn timestamp_microseconds_are_zero_padded() {
        let formatted = format_timestamp(CaptureTimestamp { secs: 1_700_000_000, micros: 7 });
        assert!(formatted.ends_with(".000007"), "{formatted}");
        assert_eq!(formatted.len(), "YYYY-MM-DD HH:MM:SS.uuuuuu".len());
    }

    #[test]
    fn out_of_range_microseconds_are_wrapped() {
        let formatted = format_timestamp(CaptureTimestamp { secs: 0, micros: 2_000_001 });
        assert!(formatted.ends_with(".000001"), "{formatted}");
    }

    proptest! {
        /// P4: no decoder reads past its slice or panics on any short input.
        #[test]
        fn decoder_total_on_arbitrary_input(bytes in prop::collection::vec(any::<u8>(), 0..=64)) {
            let _ = decode_packet(&bytes, TS);
        }

        /// Same, with the input forced down the IPv4 path.
        #[test]
        fn ipv4_path_total_on_arbitrary_tail(tail in prop::collection::vec(any::<u8>(), 0..=64)) {
            let mut frame = vec![0u8; 12];
            frame.extend_from_slice(&0x0800u16.to_be_bytes());
            frame.extend_from_slice(&tail);
            let _ = decode_packet(&frame, TS);
        }
    }
}
