//! Capture-batch walking with zero-copy header parsing.
//!
//! One read of the kernel packet tap returns a *batch*: a sequence of
//! records, each a fixed-shape capture header followed by the captured
//! packet bytes, padded to the kernel's word boundary:
//!
//! ```text
//! [capture header][packet bytes][pad]  [capture header][packet bytes][pad]  ...
//! ```
//!
//! Records are not self-delimiting beyond the header's length fields, so
//! the walker advances by `align_up(header_len + captured_len, WORD)` and
//! stops dead on any structural truncation. A truncated batch is not an
//! error condition for the caller; the tap simply supplies the next batch.
//!
//! Packet slices borrow from the batch buffer and cannot outlive one
//! iteration, which keeps the "pointers into the batch must not escape"
//! lifecycle rule in the type system.

use zerocopy::{FromBytes, Immutable, KnownLayout, Unaligned};

/// Alignment unit of the capture kernel's record layout.
pub const WORD_ALIGN: usize = 4;

/// Per-packet kernel metadata preceding packet bytes in a batch.
///
/// Fields are stored as raw byte arrays and read in *native* byte order:
/// the tap header is written by the local kernel, not by a network peer.
/// The layout mirrors the classic BPF header: timestamp (seconds +
/// microseconds), captured length, original length, and the header's own
/// length. `header_len` is authoritative for advancing past the header;
/// kernels pad it beyond [`CaptureHeader::SIZE`].
#[repr(C)]
#[derive(Clone, Copy, FromBytes, KnownLayout, Immutable, Unaligned)]
pub struct CaptureHeader {
    ts_sec: [u8; 4],
    ts_usec: [u8; 4],
    cap_len: [u8; 4],
    orig_len: [u8; 4],
    hdr_len: [u8; 2],
}

impl CaptureHeader {
    /// Minimum bytes required to read the header's own fields.
    pub const SIZE: usize = 18;

    /// Capture timestamp (seconds since epoch + microseconds).
    #[must_use]
    pub fn timestamp(&self) -> CaptureTimestamp {
        CaptureTimestamp {
            secs: u32::from_ne_bytes(self.ts_sec),
            micros: u32::from_ne_bytes(self.ts_usec),
        }
    }

    /// Bytes of the packet actually captured.
    #[must_use]
    pub fn captured_len(&self) -> u32 {
        u32::from_ne_bytes(self.cap_len)
    }

    /// Original on-the-wire length of the packet.
    #[must_use]
    pub fn original_len(&self) -> u32 {
        u32::from_ne_bytes(self.orig_len)
    }

    /// Kernel-reported length of this header, including padding.
    #[must_use]
    pub fn header_len(&self) -> u16 {
        u16::from_ne_bytes(self.hdr_len)
    }
}

impl std::fmt::Debug for CaptureHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureHeader")
            .field("timestamp", &self.timestamp())
            .field("captured_len", &self.captured_len())
            .field("original_len", &self.original_len())
            .field("header_len", &self.header_len())
            .finish()
    }
}

/// Kernel capture timestamp: seconds since the epoch plus microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureTimestamp {
    /// Whole seconds since the Unix epoch
    pub secs: u32,
    /// Microsecond fraction, `0..1_000_000` from a well-behaved kernel
    pub micros: u32,
}

/// One packet yielded by [`BatchWalker`].
#[derive(Debug, Clone, Copy)]
pub struct CapturedPacket<'a> {
    /// Captured bytes, starting at the link layer
    pub bytes: &'a [u8],
    /// Kernel capture timestamp
    pub timestamp: CaptureTimestamp,
}

/// Round `len` up to the next multiple of [`WORD_ALIGN`].
#[must_use]
pub fn align_up(len: usize) -> usize {
    (len + WORD_ALIGN - 1) & !(WORD_ALIGN - 1)
}

/// Iterator over the records of one capture batch.
///
/// Stops (fail-safe) on any of:
/// - a capture header truncated by the end of the batch,
/// - a `header_len` smaller than the header's own fields,
/// - packet bytes truncated by the end of the batch.
///
/// Individual packet *decode* failures are not the walker's concern;
/// every structurally intact record is yielded.
#[derive(Debug)]
pub struct BatchWalker<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BatchWalker<'a> {
    /// Walk the batch in `buf` from the beginning.
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }
}

impl<'a> Iterator for BatchWalker<'a> {
    type Item = CapturedPacket<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let remaining = &self.buf[self.pos..];

        let (header, _) = CaptureHeader::ref_from_prefix(remaining).ok()?;
        let hdr_len = usize::from(header.header_len());
        let cap_len = header.captured_len() as usize;

        if hdr_len < CaptureHeader::SIZE {
            return None;
        }
        let record_len = hdr_len.checked_add(cap_len)?;
        if record_len > remaining.len() {
            return None;
        }

        let packet = CapturedPacket {
            bytes: &remaining[hdr_len..record_len],
            timestamp: header.timestamp(),
        };

        // Advance to the next word-aligned record; clamping covers the
        // final record whose padding the kernel did not emit.
        self.pos = (self.pos + align_up(record_len)).min(self.buf.len());

        Some(packet)
    }
}
