//! Cycle metrics collection and reporting
//!
//! Tracks fetch latencies, success rates and upstream throttling per
//! poller.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::RwLock;

/// Maximum number of samples to keep for metrics calculation
const MAX_SAMPLES: usize = 100;

/// Metrics for a single poller
#[derive(Debug, Clone)]
pub struct PollerMetrics {
    /// Name of the poller
    pub poller_name: String,
    /// 50th percentile cycle latency in milliseconds
    pub latency_p50_ms: f64,
    /// 99th percentile cycle latency in milliseconds
    pub latency_p99_ms: f64,
    /// Cycle success rate (0.0 to 1.0)
    pub success_rate: f64,
    /// Total cycles run
    pub total_cycles: u64,
    /// Cycles that ended in a transient failure
    pub failed_cycles: u64,
    /// Times the upstream answered 429
    pub throttled_hits: u64,
}

impl PollerMetrics {
    /// Creates metrics with no data
    pub fn empty(poller_name: &str) -> Self {
        Self {
            poller_name: poller_name.to_string(),
            latency_p50_ms: 0.0,
            latency_p99_ms: 0.0,
            success_rate: 1.0,
            total_cycles: 0,
            failed_cycles: 0,
            throttled_hits: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct CycleSample {
    duration_ms: f64,
    success: bool,
}

#[derive(Default)]
struct CollectorState {
    samples: VecDeque<CycleSample>,
    total_cycles: u64,
    failed_cycles: u64,
    throttled_hits: u64,
}

/// Collects and computes cycle metrics for one poller
pub struct MetricsCollector {
    poller_name: String,
    state: RwLock<CollectorState>,
}

impl MetricsCollector {
    /// Creates a new metrics collector for a poller
    pub fn new(poller_name: &str) -> Self {
        Self {
            poller_name: poller_name.to_string(),
            state: RwLock::new(CollectorState::default()),
        }
    }

    /// Records a completed cycle with its duration and outcome
    pub async fn record_cycle(&self, duration: Duration, success: bool) {
        let mut state = self.state.write().await;

        state.total_cycles += 1;
        if !success {
            state.failed_cycles += 1;
        }

        if state.samples.len() >= MAX_SAMPLES {
            state.samples.pop_front();
        }
        state.samples.push_back(CycleSample {
            duration_ms: duration.as_secs_f64() * 1000.0,
            success,
        });
    }

    /// Records an upstream 429 hit
    pub async fn record_throttle(&self) {
        self.state.write().await.throttled_hits += 1;
    }

    /// Computes current metrics from collected samples
    pub async fn get_metrics(&self) -> PollerMetrics {
        let state = self.state.read().await;

        if state.samples.is_empty() {
            let mut metrics = PollerMetrics::empty(&self.poller_name);
            metrics.throttled_hits = state.throttled_hits;
            return metrics;
        }

        let mut latencies: Vec<f64> = state
            .samples
            .iter()
            .filter(|s| s.success)
            .map(|s| s.duration_ms)
            .collect();

        latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let success_rate = if state.total_cycles > 0 {
            (state.total_cycles - state.failed_cycles) as f64 / state.total_cycles as f64
        } else {
            1.0
        };

        PollerMetrics {
            poller_name: self.poller_name.clone(),
            latency_p50_ms: percentile(&latencies, 50.0),
            latency_p99_ms: percentile(&latencies, 99.0),
            success_rate,
            total_cycles: state.total_cycles,
            failed_cycles: state.failed_cycles,
            throttled_hits: state.throttled_hits,
        }
    }
}

/// Calculate percentile from sorted values
fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let idx = (p / 100.0 * (sorted_values.len() - 1) as f64).round() as usize;
    sorted_values[idx.min(sorted_values.len() - 1)]
}
