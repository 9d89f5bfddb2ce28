//! Record sinks: where decoded packets go.
//!
//! Standalone agents render to stdout; connected agents feed the uplink
//! task through a channel. The decode pipeline sees only the
//! `RecordSink` capability either way.

use netspan_core::RecordSink;
use netspan_proto::PacketRecord;
use tokio::sync::mpsc;

/// Render each record to standard output.
pub struct StdoutSink;

impl RecordSink for StdoutSink {
    fn accept(&mut self, record: PacketRecord) {
        println!("{record}");
    }
}

/// Forward records into the uplink task's channel.
///
/// Uses `blocking_send` from the capture thread: a full channel applies
/// the transport's backpressure to the tap instead of buffering without
/// bound.
pub struct ChannelSink {
    tx: mpsc::Sender<PacketRecord>,
    disconnected: bool,
}

impl ChannelSink {
    /// Wrap the sending side of the uplink channel.
    pub fn new(tx: mpsc::Sender<PacketRecord>) -> Self {
        Self { tx, disconnected: false }
    }
}

impl RecordSink for ChannelSink {
    fn accept(&mut self, record: PacketRecord) {
        if self.disconnected {
            return;
        }
        if self.tx.blocking_send(record).is_err() {
            tracing::warn!("uplink channel closed, discarding further records");
            self.disconnected = true;
        }
    }
}
