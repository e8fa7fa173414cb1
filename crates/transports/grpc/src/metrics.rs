//! Prometheus metrics for the gRPC service
//!
//! Transport-level request counters and latency histograms, separate
//! from the gateway's domain counters (those live in
//! `mcp_gateway_core::metrics`).

use prometheus::{CounterVec, HistogramOpts, HistogramVec, IntGauge, Opts, Registry};
use std::sync::Arc;

/// Prometheus metrics for the gRPC service
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Total requests processed (labeled by RPC method and status)
    pub requests_total: CounterVec,

    /// Request latency distribution in seconds (labeled by RPC method)
    pub request_duration_seconds: HistogramVec,

    /// Open bidirectional streams
    pub active_streams: IntGauge,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl ServiceMetrics {
    /// Create new metrics with a custom registry
    pub fn new(registry: Registry) -> Result<Self, prometheus::Error> {
        let requests_total = CounterVec::new(
            Opts::new(
                "mcp_gateway_grpc_requests_total",
                "Total number of gRPC requests processed",
            ),
            &["method", "status"],
        )?;

        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "mcp_gateway_grpc_request_duration_seconds",
                "Request latency distribution in seconds",
            )
            .buckets(vec![
                0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ]),
            &["method"],
        )?;

        let active_streams = IntGauge::new(
            "mcp_gateway_grpc_active_streams",
            "Number of open bidirectional event streams",
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration_seconds.clone()))?;
        registry.register(Box::new(active_streams.clone()))?;

        Ok(Self {
            requests_total,
            request_duration_seconds,
            active_streams,
            registry: Arc::new(registry),
        })
    }

    /// Create with a fresh registry
    pub fn with_default_registry() -> Result<Self, prometheus::Error> {
        Self::new(Registry::new())
    }

    /// Record RPC request start (returns start time for duration calculation)
    pub fn record_request_start(&self) -> std::time::Instant {
        std::time::Instant::now()
    }

    /// Record RPC request completion
    pub fn record_request_end(&self, method: &str, status: &str, start: std::time::Instant) {
        self.requests_total
            .with_label_values(&[method, status])
            .inc();
        self.request_duration_seconds
            .with_label_values(&[method])
            .observe(start.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::core::Collector;

    #[test]
    fn metrics_register_cleanly() {
        assert!(ServiceMetrics::with_default_registry().is_ok());
    }

    #[test]
    fn request_lifecycle_is_recorded() {
        let metrics = ServiceMetrics::with_default_registry().unwrap();

        let start = metrics.record_request_start();
        metrics.record_request_end("Ingest", "ok", start);

        let samples = metrics.requests_total.collect();
        assert!(!samples.is_empty());
    }

    #[test]
    fn stream_gauge_moves_both_ways() {
        let metrics = ServiceMetrics::with_default_registry().unwrap();
        metrics.active_streams.inc();
        metrics.active_streams.inc();
        metrics.active_streams.dec();
        assert_eq!(metrics.active_streams.get(), 1);
    }
}
