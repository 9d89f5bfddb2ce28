//! Fuzz the stream reassembler with arbitrary bytes and arbitrary
//! chunking.
//!
//! Invariants exercised:
//! - the decoder never panics, whatever the input
//! - every frame it yields re-encodes to valid wire bytes
//! - a fatal framing error leaves the buffer empty

#![no_main]

use libfuzzer_sys::fuzz_target;
use netspan_proto::FrameDecoder;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // First byte drives the chunk size so libFuzzer can explore
    // different fragmentation patterns of the same stream.
    let chunk_len = usize::from(data[0]).max(1);
    let stream = &data[1..];

    let mut decoder = FrameDecoder::new();
    for chunk in stream.chunks(chunk_len) {
        decoder.push(chunk);
        loop {
            match decoder.next_frame() {
                Ok(Some(frame)) => {
                    let wire = frame.to_bytes().expect("yielded frame must re-encode");
                    assert_eq!(wire.len(), 4 + frame.payload.len() + 1);
                },
                Ok(None) => break,
                Err(_) => {
                    assert!(decoder.is_empty(), "fatal error must discard the buffer");
                    return;
                },
            }
        }
    }
});
