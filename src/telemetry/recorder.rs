use ringbuf::traits::{Consumer, Observer, RingBuffer};
use ringbuf::HeapRb;
use std::sync::{Mutex, PoisonError};

use super::metrics::{compute_metrics, Metrics};
use super::record::TelemetryRecord;
use super::TelemetrySink;

pub const DEFAULT_CAPACITY: usize = 1_000;

/// Keeps the most recent records in a fixed-size ring.
///
/// One mutex guards the ring: an append that evicts is atomic with respect to
/// snapshots. Statistics are computed from a copied snapshot, outside the
/// lock.
pub struct RingTelemetry {
    buffer: Mutex<HeapRb<TelemetryRecord>>,
}

impl RingTelemetry {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Mutex::new(HeapRb::new(capacity.max(1))),
        }
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity().get()
    }

    pub fn len(&self) -> usize {
        self.lock().occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Oldest first.
    pub fn records(&self) -> Vec<TelemetryRecord> {
        self.lock().iter().cloned().collect()
    }

    pub fn metrics(&self) -> Metrics {
        let snapshot = self.records();
        compute_metrics(&snapshot)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HeapRb<TelemetryRecord>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RingTelemetry {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl TelemetrySink for RingTelemetry {
    fn log(&self, record: TelemetryRecord) {
        self.lock().push_overwrite(record);
    }
}
