//! Per-target dispatch worker
//!
//! Each target runs one worker task fed by a bounded queue, so deliveries
//! to the same target are serialized while distinct targets proceed in
//! parallel. The worker snapshots the transport and retry settings before
//! each attempt and never performs I/O while holding the registry guard.

use crate::engine::{Registry, TargetEntry};
use crate::retry::{execute_with_retry, RetryPolicy};
use mcp_gateway_core::rules::Transform;
use mcp_gateway_core::target::TargetStatus;
use mcp_gateway_core::{Error, Event, GatewayMetrics, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Dispatch failures in a row before a target turns unhealthy
pub(crate) const UNHEALTHY_THRESHOLD: u32 = 3;

/// One queued delivery plus the channel reporting its settled outcome
pub(crate) struct DispatchJob {
    pub event: Arc<Event>,
    pub transform: Option<Transform>,
    pub done: oneshot::Sender<Result<()>>,
}

/// Consume the target's queue until every sender is gone.
pub(crate) async fn run_worker(
    target_id: String,
    registry: Registry,
    mut queue: mpsc::Receiver<DispatchJob>,
) {
    debug!(target = %target_id, "dispatch worker started");

    while let Some(job) = queue.recv().await {
        let snapshot = {
            let reg = registry.read().await;
            reg.get(&target_id).map(|entry| {
                (
                    Arc::clone(&entry.transport),
                    RetryPolicy::fixed(
                        entry.target.config.retry_attempts,
                        Duration::from_millis(entry.target.config.retry_delay_ms),
                    ),
                    Duration::from_secs(entry.target.config.timeout_secs),
                )
            })
        };

        let Some((transport, policy, deadline)) = snapshot else {
            // Target removed while the job was queued.
            let _ = job
                .done
                .send(Err(Error::NotFound(format!("target {target_id} removed"))));
            continue;
        };

        let event: Arc<Event> = match &job.transform {
            Some(transform) => Arc::new(transform.apply(&job.event)),
            None => Arc::clone(&job.event),
        };

        let started = Instant::now();
        let attempt_transport = Arc::clone(&transport);
        let attempt_event = Arc::clone(&event);
        let outcome = match tokio::time::timeout(
            deadline,
            execute_with_retry(policy, move || {
                let transport = Arc::clone(&attempt_transport);
                let event = Arc::clone(&attempt_event);
                async move { transport.deliver(&event).await }
            }),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                timeout_ms: deadline.as_millis() as u64,
                context: format!("delivery to {target_id}"),
            }),
        };

        let latency_ms = started.elapsed().as_secs_f64() * 1_000.0;
        record_outcome(&registry, &target_id, &outcome, latency_ms).await;
        let _ = job.done.send(outcome);
    }

    debug!(target = %target_id, "dispatch worker stopped");
}

/// Fold a settled dispatch into the target's stats and health state.
async fn record_outcome(registry: &Registry, target_id: &str, outcome: &Result<()>, latency_ms: f64) {
    let mut reg = registry.write().await;
    let Some(entry) = reg.get_mut(target_id) else {
        return;
    };

    match outcome {
        Ok(()) => mark_success(entry, latency_ms),
        Err(e) => mark_failure(entry, e.to_string()),
    }
}

/// Any success resets the error streak and restores health.
pub(crate) fn mark_success(entry: &mut TargetEntry, latency_ms: f64) {
    entry.stats.record_success(latency_ms);
    entry.target.consecutive_errors = 0;
    entry.target.last_healthy = Some(chrono::Utc::now());
    if entry.target.status != TargetStatus::Disabled {
        entry.target.status = TargetStatus::Healthy;
    }
}

/// Final failures count toward the three-strikes threshold.
pub(crate) fn mark_failure(entry: &mut TargetEntry, error: String) {
    warn!(target = %entry.target.id, error = %error, "delivery failed");
    entry.stats.record_failure(error.clone());
    entry.target.consecutive_errors += 1;
    entry.target.last_error = Some(error);
    if entry.target.consecutive_errors >= UNHEALTHY_THRESHOLD
        && entry.target.status != TargetStatus::Disabled
    {
        entry.target.status = TargetStatus::Unhealthy;
    }
}

/// Health-probe outcome uses the same streak rules but does not touch
/// delivery stats.
pub(crate) fn mark_probe(entry: &mut TargetEntry, healthy: bool) {
    if entry.target.status == TargetStatus::Disabled {
        return;
    }
    if healthy {
        entry.target.consecutive_errors = 0;
        entry.target.status = TargetStatus::Healthy;
        entry.target.last_healthy = Some(chrono::Utc::now());
    } else {
        entry.target.consecutive_errors += 1;
        entry.target.last_error = Some("health probe failed".to_string());
        if entry.target.consecutive_errors >= UNHEALTHY_THRESHOLD {
            entry.target.status = TargetStatus::Unhealthy;
        }
    }
}

/// Count a dropped event against the global counters without enqueueing.
pub(crate) fn mark_dropped(metrics: &GatewayMetrics, target_id: &str) {
    warn!(target = %target_id, "dispatch queue full, dropping event");
    metrics.inc_dropped();
}
