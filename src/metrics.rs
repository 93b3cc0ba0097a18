//! Execution metrics
//!
//! Process-wide prometheus registry; the embedding application decides how
//! (and whether) to export it.

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::time::Instant;

pub struct Metrics {
    registry: Registry,

    // Counters
    pub execution_attempts: IntCounterVec,
    pub retries: IntCounterVec,
    pub precheck_failures: IntCounterVec,
    pub node_backoffs: IntCounterVec,
    pub receipts: IntCounterVec,
    pub execution_timeouts: IntCounter,

    // Gauges
    pub executions_in_flight: IntGauge,

    // Histograms
    pub submit_latency: Histogram,
    pub receipt_latency: Histogram,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let execution_attempts = IntCounterVec::new(
            Opts::new("ledger_execution_attempts_total", "Requests sent to nodes"),
            &["operation"],
        )?;

        let retries = IntCounterVec::new(
            Opts::new("ledger_retries_total", "Retried attempts by reason"),
            &["reason"],
        )?;

        let precheck_failures = IntCounterVec::new(
            Opts::new("ledger_precheck_failures_total", "Non-retryable precheck statuses"),
            &["status"],
        )?;

        let node_backoffs = IntCounterVec::new(
            Opts::new("ledger_node_backoffs_total", "Times a node entered backoff"),
            &["node"],
        )?;

        let receipts = IntCounterVec::new(
            Opts::new("ledger_receipts_total", "Resolved receipts by final status"),
            &["status"],
        )?;

        let execution_timeouts = IntCounter::with_opts(Opts::new(
            "ledger_execution_timeouts_total",
            "Executions that exhausted their attempt or time budget",
        ))?;

        let executions_in_flight = IntGauge::with_opts(Opts::new(
            "ledger_executions_in_flight",
            "Executions currently running",
        ))?;

        let submit_latency = Histogram::with_opts(
            HistogramOpts::new("ledger_submit_latency_seconds", "Time from execute to accepted precheck")
                .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        )?;

        let receipt_latency = Histogram::with_opts(
            HistogramOpts::new("ledger_receipt_latency_seconds", "Time to resolve a receipt or record")
                .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        )?;

        registry.register(Box::new(execution_attempts.clone()))?;
        registry.register(Box::new(retries.clone()))?;
        registry.register(Box::new(precheck_failures.clone()))?;
        registry.register(Box::new(node_backoffs.clone()))?;
        registry.register(Box::new(receipts.clone()))?;
        registry.register(Box::new(execution_timeouts.clone()))?;
        registry.register(Box::new(executions_in_flight.clone()))?;
        registry.register(Box::new(submit_latency.clone()))?;
        registry.register(Box::new(receipt_latency.clone()))?;

        Ok(Self {
            registry,
            execution_attempts,
            retries,
            precheck_failures,
            node_backoffs,
            receipts,
            execution_timeouts,
            executions_in_flight,
            submit_latency,
            receipt_latency,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Records elapsed wall time into a histogram when finished.
pub struct Timer<'a> {
    start: Instant,
    histogram: &'a Histogram,
}

impl<'a> Timer<'a> {
    pub fn start(histogram: &'a Histogram) -> Self {
        Self {
            start: Instant::now(),
            histogram,
        }
    }

    pub fn finish(self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register() {
        let m = Metrics::new().unwrap();
        m.retries.with_label_values(&["node"]).inc();
        m.execution_timeouts.inc();
        assert_eq!(m.retries.with_label_values(&["node"]).get(), 1);
        assert!(!m.registry().gather().is_empty());
    }

    #[test]
    fn test_timer_observes() {
        let m = Metrics::new().unwrap();
        Timer::start(&m.submit_latency).finish();
        assert_eq!(m.submit_latency.get_sample_count(), 1);
    }
}
