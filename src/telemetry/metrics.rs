use serde::Serialize;
use std::collections::BTreeMap;

use super::record::{Mode, TelemetryRecord};
use crate::error::ErrorCode;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub total_calls: u64,
    pub successes: u64,
    pub failures: u64,
    /// successes / total_calls, 0.0 when empty.
    pub success_rate: f64,
    pub mean_latency_ms: f64,
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub max_latency_ms: u64,
    pub errors: BTreeMap<ErrorCode, u64>,
    pub calls_by_mode: BTreeMap<Mode, u64>,
}

/// Nearest-rank percentile over an ascending slice: the value at 1-based
/// rank `ceil(p / 100 * n)`. Returns 0 for an empty slice.
pub fn percentile(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let n = sorted.len();
    let rank = (p * n as f64 / 100.0).ceil() as usize;
    sorted[rank.clamp(1, n) - 1]
}

pub fn compute_metrics<'a, I>(records: I) -> Metrics
where
    I: IntoIterator<Item = &'a TelemetryRecord>,
{
    let mut metrics = Metrics::default();
    let mut latencies = Vec::new();

    for record in records {
        metrics.total_calls += 1;
        *metrics.calls_by_mode.entry(record.mode).or_insert(0) += 1;
        latencies.push(record.timing.total_ms);

        if record.ok {
            metrics.successes += 1;
        } else {
            metrics.failures += 1;
            let code = record.err_code.unwrap_or(ErrorCode::Unknown);
            *metrics.errors.entry(code).or_insert(0) += 1;
        }
    }

    if metrics.total_calls == 0 {
        return metrics;
    }

    latencies.sort_unstable();
    let total: u64 = latencies.iter().sum();
    metrics.success_rate = metrics.successes as f64 / metrics.total_calls as f64;
    metrics.mean_latency_ms = total as f64 / latencies.len() as f64;
    metrics.p50_ms = percentile(&latencies, 50.0);
    metrics.p95_ms = percentile(&latencies, 95.0);
    metrics.max_latency_ms = latencies.last().copied().unwrap_or(0);

    metrics
}
