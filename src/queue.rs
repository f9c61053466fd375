//! Handoff buffer between the TNC reader and the publish loop.

use chrono::{DateTime, Local};

use crate::ax25::DecodedFrame;

/// A decoded frame paired with its wall-clock arrival time.
#[derive(Debug, Clone)]
pub struct ArrivalRecord {
    pub frame: DecodedFrame,
    pub received_at: DateTime<Local>,
}

/// Unbounded FIFO of arrival records.
///
/// The TNC reader task pushes, the publish loop polls. The channel is safe
/// for concurrent senders and receivers, and unbounded sends never block
/// the reader. Growth is unchecked when decoding outpaces publishing - the
/// `ingest_queue_depth` gauge is the way to watch for that.
#[derive(Clone)]
pub struct FrameQueue {
    tx: flume::Sender<ArrivalRecord>,
    rx: flume::Receiver<ArrivalRecord>,
}

impl FrameQueue {
    pub fn new() -> Self {
        let (tx, rx) = flume::unbounded();
        Self { tx, rx }
    }

    /// Append a record. Never blocks.
    pub fn push(&self, record: ArrivalRecord) {
        // Send only fails once every receiver is gone, i.e. during teardown.
        let _ = self.tx.send(record);
        metrics::gauge!("ingest_queue_depth").set(self.len() as f64);
    }

    /// Non-blocking poll used by the publish loop.
    pub fn try_pop(&self) -> Option<ArrivalRecord> {
        let record = self.rx.try_recv().ok();
        if record.is_some() {
            metrics::gauge!("ingest_queue_depth").set(self.len() as f64);
        }
        record
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::new()
    }
}
