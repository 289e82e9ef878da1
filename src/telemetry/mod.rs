//! Request telemetry.
//!
//! # INVARIANT
//! Exactly one [`TelemetryRecord`] per handled request, success or failure.
//!
//! # PRIVACY
//! Records carry sizes, durations, codes and ids. Never image bytes, prompts
//! or generated text.

pub mod metrics;
pub mod record;
pub mod recorder;

use std::sync::Arc;
use tracing::info;

pub use metrics::{compute_metrics, percentile, Metrics};
pub use record::{Mode, TelemetryRecord, Timing};
pub use recorder::RingTelemetry;

/// Destination for finished request records.
pub trait TelemetrySink: Send + Sync {
    fn log(&self, record: TelemetryRecord);
}

/// Emits every record as one structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn log(&self, record: TelemetryRecord) {
        info!(
            target: "lumen::telemetry",
            mode = %record.mode,
            route = %record.route,
            ok = record.ok,
            err_code = record.err_code.map(|c| c.as_str()).unwrap_or("-"),
            bytes_in = record.bytes_in,
            bytes_out = record.bytes_out,
            inspection_ms = record.timing.inspection_ms,
            processing_ms = record.timing.processing_ms,
            total_ms = record.timing.total_ms,
            correlation_id = record.correlation_id.as_deref().unwrap_or("-"),
            "request completed"
        );
    }
}

/// Forwards each record to every inner sink.
#[derive(Clone, Default)]
pub struct FanoutTelemetry {
    sinks: Vec<Arc<dyn TelemetrySink>>,
}

impl FanoutTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl TelemetrySink for FanoutTelemetry {
    fn log(&self, record: TelemetryRecord) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.log(record.clone());
            }
            last.log(record);
        }
    }
}
