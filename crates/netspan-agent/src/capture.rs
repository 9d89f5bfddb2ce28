//! The capture loop: tap batches in, records out.
//!
//! Runs on a dedicated thread because the tap read blocks in the kernel.
//! Each batch is fully decoded and handed to the sink before the next
//! read, so the batch buffer is never aliased across reads.

use netspan_core::{RecordSink, process_batch};

use crate::tap::Tap;

/// Drive `tap` until it fails hard.
///
/// Empty batches are normal (immediate mode can return early) and
/// interrupted reads are retried by the tap itself. Any other read error
/// ends the loop; the process keeps running until its signal arrives.
pub fn run(mut tap: impl Tap, mut sink: impl RecordSink) {
    loop {
        match tap.next_batch() {
            Ok(batch) => process_batch(batch, &mut sink),
            Err(e) => {
                tracing::error!(error = %e, "capture tap read failed, stopping capture");
                break;
            },
        }
    }
}
