//! Fuzz the packet decode pipeline: batches and single packets.
//!
//! The decoders must be total over arbitrary input: no panic, no
//! out-of-bounds read, for any byte sequence fed as a capture batch or
//! as a single link-layer frame.

#![no_main]

use libfuzzer_sys::fuzz_target;
use netspan_core::{capture::CaptureTimestamp, decode_packet, process_batch};
use netspan_proto::PacketRecord;

fuzz_target!(|data: &[u8]| {
    let ts = CaptureTimestamp { secs: 1_700_000_000, micros: 123_456 };

    // As a raw link-layer frame.
    if let Some(record) = decode_packet(data, ts) {
        // Whatever comes out must serialize into a traffic-log payload.
        let _ = serde_json_roundtrip(&record);
    }

    // As a whole capture batch.
    let mut count = 0usize;
    process_batch(data, &mut |_record: PacketRecord| count += 1);
});

fn serde_json_roundtrip(record: &PacketRecord) -> PacketRecord {
    let json = serde_json::to_vec(record).expect("records always serialize");
    serde_json::from_slice(&json).expect("records always round-trip")
}
