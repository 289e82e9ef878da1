use chrono::Utc;
use std::sync::Arc;
use tracing::warn;

use crate::clock::Clock;
use crate::error::ErrorCode;
use crate::telemetry::{Mode, TelemetryRecord, TelemetrySink, Timing};

/// Per-request telemetry guard.
///
/// Writes exactly one record: on [`RequestSpan::finish`], or from `Drop` when
/// the request future is cancelled or unwinds first. The drop path records an
/// `UNKNOWN` failure.
pub(crate) struct RequestSpan {
    sink: Arc<dyn TelemetrySink>,
    clock: Arc<dyn Clock>,
    mode: Mode,
    route: &'static str,
    session_id: Option<String>,
    correlation_id: Option<String>,
    started_at: u64,
    processing_started: Option<u64>,
    processing_ended: Option<u64>,
    inspection_ms: Option<u64>,
    pub bytes_in: u64,
    pub bytes_out: u64,
    recorded: bool,
}

impl RequestSpan {
    pub fn start(
        sink: Arc<dyn TelemetrySink>,
        clock: Arc<dyn Clock>,
        mode: Mode,
        route: &'static str,
        session_id: Option<String>,
        correlation_id: Option<String>,
    ) -> Self {
        let started_at = clock.now();
        Self {
            sink,
            clock,
            mode,
            route,
            session_id,
            correlation_id,
            started_at,
            processing_started: None,
            processing_ended: None,
            inspection_ms: None,
            bytes_in: 0,
            bytes_out: 0,
            recorded: false,
        }
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn begin_processing(&mut self) {
        self.processing_started = Some(self.clock.now());
    }

    pub fn end_processing(&mut self) {
        self.processing_ended = Some(self.clock.now());
    }

    pub fn set_inspection_since(&mut self, started: u64) {
        self.inspection_ms = Some(self.clock.now().saturating_sub(started));
    }

    fn timing(&self) -> Timing {
        let now = self.clock.now();
        let processing_ms = match self.processing_started {
            Some(start) => self.processing_ended.unwrap_or(now).saturating_sub(start),
            None => 0,
        };
        Timing {
            inspection_ms: self.inspection_ms,
            processing_ms,
            total_ms: now.saturating_sub(self.started_at),
        }
    }

    fn record(&mut self, err_code: Option<ErrorCode>) -> Timing {
        let timing = self.timing();
        self.recorded = true;
        self.sink.log(TelemetryRecord {
            timestamp: Utc::now(),
            mode: self.mode,
            route: self.route.to_string(),
            bytes_in: self.bytes_in,
            bytes_out: self.bytes_out,
            timing,
            ok: err_code.is_none(),
            err_code,
            correlation_id: self.correlation_id.take(),
            session_id: self.session_id.take(),
        });
        timing
    }

    /// Records the terminal outcome and returns the timing block for the
    /// caller.
    pub fn finish(mut self, err_code: Option<ErrorCode>) -> Timing {
        self.record(err_code)
    }
}

impl Drop for RequestSpan {
    fn drop(&mut self) {
        if !self.recorded {
            warn!(mode = %self.mode, route = self.route, "Request abandoned before completion");
            self.record(Some(ErrorCode::Unknown));
        }
    }
}
