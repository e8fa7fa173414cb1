//! Gateway counters and per-target delivery statistics
//!
//! Global counters are lock-free atomics so every ingestion path can bump
//! them without contention. Per-target stats live inside the forwarding
//! engine's registry lock; both expose deep-copied snapshots so callers
//! never observe mid-update state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Instant;

/// Number of response-time samples kept per target
const RESPONSE_WINDOW: usize = 100;

/// Process-wide event counters
pub struct GatewayMetrics {
    total_events: AtomicU64,
    stream_events: AtomicU64,
    forwarded_events: AtomicU64,
    failed_events: AtomicU64,
    dropped_events: AtomicU64,
    error_events: AtomicU64,
    active_streams: AtomicI64,
    started_at: Instant,
    start_time: DateTime<Utc>,
}

impl GatewayMetrics {
    /// Create a fresh counter set stamped with the current time
    pub fn new() -> Self {
        Self {
            total_events: AtomicU64::new(0),
            stream_events: AtomicU64::new(0),
            forwarded_events: AtomicU64::new(0),
            failed_events: AtomicU64::new(0),
            dropped_events: AtomicU64::new(0),
            error_events: AtomicU64::new(0),
            active_streams: AtomicI64::new(0),
            started_at: Instant::now(),
            start_time: Utc::now(),
        }
    }

    /// One event entered an ingestion path (counted before validation)
    pub fn inc_total(&self) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
    }

    /// One event arrived over a bidirectional stream
    pub fn inc_stream(&self) {
        self.stream_events.fetch_add(1, Ordering::Relaxed);
    }

    /// At least one matched target accepted the event
    pub fn inc_forwarded(&self) {
        self.forwarded_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Every matched target failed the event
    pub fn inc_failed(&self) {
        self.failed_events.fetch_add(1, Ordering::Relaxed);
    }

    /// A full per-target queue dropped the event
    pub fn inc_dropped(&self) {
        self.dropped_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Validation rejected an event
    pub fn inc_error(&self) {
        self.error_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a stream subscription coming or going
    pub fn set_active_streams(&self, count: usize) {
        self.active_streams.store(count as i64, Ordering::Relaxed);
    }

    /// Milliseconds since process start
    pub fn uptime_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    /// Consistent copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_events: self.total_events.load(Ordering::Relaxed),
            stream_events: self.stream_events.load(Ordering::Relaxed),
            forwarded_events: self.forwarded_events.load(Ordering::Relaxed),
            failed_events: self.failed_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_events.load(Ordering::Relaxed),
            error_events: self.error_events.load(Ordering::Relaxed),
            active_streams: self.active_streams.load(Ordering::Relaxed).max(0) as u64,
            uptime_seconds: self.started_at.elapsed().as_secs(),
            start_time: self.start_time,
        }
    }
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable copy of the global counters
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Events that entered any ingestion path
    pub total_events: u64,
    /// Events received over bidirectional streams
    pub stream_events: u64,
    /// Events accepted by at least one target
    pub forwarded_events: u64,
    /// Events for which every matched target failed
    pub failed_events: u64,
    /// Events dropped on full per-target queues
    pub dropped_events: u64,
    /// Events rejected by validation
    pub error_events: u64,
    /// Currently registered stream subscriptions
    pub active_streams: u64,
    /// Seconds since process start
    pub uptime_seconds: u64,
    /// Process start time
    pub start_time: DateTime<Utc>,
}

/// Bounded circular buffer over the last [`RESPONSE_WINDOW`] successful
/// response times, milliseconds.
#[derive(Debug, Clone)]
pub struct ResponseWindow {
    samples: Vec<f64>,
    next: usize,
    filled: bool,
}

impl ResponseWindow {
    fn new() -> Self {
        Self {
            samples: Vec::with_capacity(RESPONSE_WINDOW),
            next: 0,
            filled: false,
        }
    }

    /// Record one sample, evicting the oldest once the window is full
    pub fn record(&mut self, millis: f64) {
        if self.filled {
            self.samples[self.next] = millis;
        } else {
            self.samples.push(millis);
            if self.samples.len() == RESPONSE_WINDOW {
                self.filled = true;
            }
        }
        self.next = (self.next + 1) % RESPONSE_WINDOW;
    }

    /// Mean over the retained samples; zero when empty
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    /// Samples currently retained
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when no sample has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Default for ResponseWindow {
    fn default() -> Self {
        Self::new()
    }
}

/// Delivery statistics for one forwarding target
#[derive(Debug, Clone, Default)]
pub struct TargetStats {
    /// Successful deliveries
    pub events_sent: u64,
    /// Final (post-retry) delivery failures
    pub events_failed: u64,
    /// Most recent failure message
    pub last_error: Option<String>,
    /// Most recent successful delivery
    pub last_success: Option<DateTime<Utc>>,
    /// Rolling response-time window
    pub response_times: ResponseWindow,
    /// events_sent / (events_sent + events_failed) × 100, restamped by
    /// the rollup task
    pub uptime_percentage: f64,
    /// Last rollup stamp
    pub last_updated: Option<DateTime<Utc>>,
}

impl TargetStats {
    /// Record a successful delivery and its latency
    pub fn record_success(&mut self, latency_ms: f64) {
        self.events_sent += 1;
        self.last_success = Some(Utc::now());
        self.response_times.record(latency_ms);
    }

    /// Record a final delivery failure
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.events_failed += 1;
        self.last_error = Some(error.into());
    }

    /// Recompute the uptime ratio from the cumulative counters
    pub fn recompute_uptime(&mut self) {
        let attempts = self.events_sent + self.events_failed;
        self.uptime_percentage = if attempts == 0 {
            100.0
        } else {
            self.events_sent as f64 / attempts as f64 * 100.0
        };
        self.last_updated = Some(Utc::now());
    }

    /// Deep copy for the management surface
    pub fn snapshot(&self) -> TargetStatsSnapshot {
        TargetStatsSnapshot {
            events_sent: self.events_sent,
            events_failed: self.events_failed,
            last_error: self.last_error.clone(),
            last_success: self.last_success,
            avg_response_time_ms: self.response_times.average(),
            uptime_percentage: self.uptime_percentage,
            last_updated: self.last_updated,
        }
    }
}

/// Serializable copy of one target's statistics
#[derive(Debug, Clone, Serialize)]
pub struct TargetStatsSnapshot {
    /// Successful deliveries
    pub events_sent: u64,
    /// Final delivery failures
    pub events_failed: u64,
    /// Most recent failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Most recent successful delivery
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success: Option<DateTime<Utc>>,
    /// Mean of the last 100 successful response times
    pub avg_response_time_ms: f64,
    /// Success ratio out of 100
    pub uptime_percentage: f64,
    /// Last rollup stamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_independently() {
        let m = GatewayMetrics::new();
        m.inc_total();
        m.inc_total();
        m.inc_forwarded();
        m.inc_error();

        let snap = m.snapshot();
        assert_eq!(snap.total_events, 2);
        assert_eq!(snap.forwarded_events, 1);
        assert_eq!(snap.failed_events, 0);
        assert_eq!(snap.error_events, 1);
        // Invariant: forwarded + failed never exceeds total.
        assert!(snap.forwarded_events + snap.failed_events <= snap.total_events);
    }

    #[test]
    fn response_window_is_bounded_at_100() {
        let mut w = ResponseWindow::default();
        for i in 0..250 {
            w.record(i as f64);
        }
        assert_eq!(w.len(), 100);
        // Only samples 150..250 remain: mean is 199.5.
        assert!((w.average() - 199.5).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_window_averages_zero() {
        assert_eq!(ResponseWindow::default().average(), 0.0);
    }

    #[test]
    fn uptime_percentage_tracks_success_ratio() {
        let mut stats = TargetStats::default();
        stats.record_success(12.0);
        stats.record_success(8.0);
        stats.record_failure("connection reset");
        stats.recompute_uptime();

        assert_eq!(stats.events_sent, 2);
        assert_eq!(stats.events_failed, 1);
        assert!((stats.uptime_percentage - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.snapshot().avg_response_time_ms, 10.0);
    }

    #[test]
    fn untried_target_reports_full_uptime() {
        let mut stats = TargetStats::default();
        stats.recompute_uptime();
        assert_eq!(stats.uptime_percentage, 100.0);
    }
}
