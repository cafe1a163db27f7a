//! Queue metrics.
//!
//! Registered against a caller-provided `Registry` so several queues (and
//! tests) can coexist in one process.

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts,
    Registry, TextEncoder,
};

const SUBSYSTEM: &str = "queue";

/// Processing-time buckets, seconds.
const PROCESSING_BUCKETS: [f64; 7] = [1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0];

#[derive(Clone)]
pub struct QueueMetrics {
    pub enqueued_total: IntCounter,
    pub started_total: IntCounter,
    pub succeeded_total: IntCounter,
    pub failed_total: IntCounter,
    /// Duplicate enqueues for a key already in flight.
    pub skipped_total: IntCounter,
    /// Enqueues refused because the queue was full.
    pub rejected_total: IntCounter,
    pub in_flight: IntGauge,
    pub queue_length: IntGauge,
    pub processing_seconds: Histogram,
    registry: Registry,
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub enqueued: u64,
    pub started: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,
    pub rejected: u64,
    pub in_flight: i64,
    pub queue_length: i64,
}

impl QueueMetrics {
    pub fn new(namespace: &str, registry: Registry) -> Result<Self, prometheus::Error> {
        let counter = |name: &str, help: &str| {
            register_int_counter_with_registry!(
                Opts::new(name, help).namespace(namespace).subsystem(SUBSYSTEM),
                registry
            )
        };
        let gauge = |name: &str, help: &str| {
            register_int_gauge_with_registry!(
                Opts::new(name, help).namespace(namespace).subsystem(SUBSYSTEM),
                registry
            )
        };

        let enqueued_total = counter("enqueued_total", "Evaluations accepted into the queue")?;
        let started_total = counter("started_total", "Evaluations picked up by a worker")?;
        let succeeded_total = counter("succeeded_total", "Evaluations that completed without error")?;
        let failed_total = counter("failed_total", "Evaluations that ended in error, panic or cancellation")?;
        let skipped_total = counter("skipped_total", "Enqueues skipped because the target was already in flight")?;
        let rejected_total = counter("rejected_total", "Enqueues rejected because the queue was full")?;
        let in_flight = gauge("in_flight", "Evaluations currently running")?;
        let queue_length = gauge("length", "Evaluations waiting for a worker")?;

        let processing_seconds = register_histogram_with_registry!(
            HistogramOpts::new("processing_seconds", "Evaluation processing time in seconds")
                .namespace(namespace)
                .subsystem(SUBSYSTEM)
                .buckets(PROCESSING_BUCKETS.to_vec()),
            registry
        )?;

        Ok(Self {
            enqueued_total,
            started_total,
            succeeded_total,
            failed_total,
            skipped_total,
            rejected_total,
            in_flight,
            queue_length,
            processing_seconds,
            registry,
        })
    }

    pub fn snapshot(&self) -> QueueStats {
        QueueStats {
            enqueued: self.enqueued_total.get(),
            started: self.started_total.get(),
            succeeded: self.succeeded_total.get(),
            failed: self.failed_total.get(),
            skipped: self.skipped_total.get(),
            rejected: self.rejected_total.get(),
            in_flight: self.in_flight.get(),
            queue_length: self.queue_length.get(),
        }
    }

    /// Prometheus text exposition of everything in the registry.
    pub fn gather_text(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            log::warn!("METRICS_ENCODE_FAILED error={}", e);
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = QueueMetrics::new("pulse", Registry::new()).unwrap();
        metrics.enqueued_total.inc();
        metrics.enqueued_total.inc();
        metrics.in_flight.inc();
        metrics.skipped_total.inc();

        let stats = metrics.snapshot();
        assert_eq!(stats.enqueued, 2);
        assert_eq!(stats.in_flight, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.succeeded, 0);
    }

    #[test]
    fn test_gather_text_uses_namespace() {
        let metrics = QueueMetrics::new("pulse", Registry::new()).unwrap();
        metrics.started_total.inc();
        let text = metrics.gather_text();
        assert!(text.contains("pulse_queue_started_total 1"));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = Registry::new();
        let _first = QueueMetrics::new("pulse", registry.clone()).unwrap();
        assert!(QueueMetrics::new("pulse", registry).is_err());
    }
}
