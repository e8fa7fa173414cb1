//! The forwarding engine
//!
//! Owns the target registry and everything inside it: configuration,
//! stats, the live transport handle, and a per-target worker fed by a
//! bounded queue. `forward` fans an event out to every matching target in
//! parallel and settles to a single outcome; the health sweep and metrics
//! rollup run as background tasks between `start` and `stop`.

use crate::adapters::TransportHandle;
use crate::limiter::TokenBucket;
use crate::worker::{self, DispatchJob};
use async_trait::async_trait;
use mcp_gateway_core::config::{
    HEALTH_PROBE_TIMEOUT, HEALTH_SWEEP_INTERVAL, METRICS_ROLLUP_INTERVAL, SHUTDOWN_GRACE,
};
use mcp_gateway_core::ingest::EventSink;
use mcp_gateway_core::metrics::{MetricsSnapshot, TargetStats, TargetStatsSnapshot};
use mcp_gateway_core::target::TargetStatus;
use mcp_gateway_core::{Error, Event, ForwardingTarget, GatewayMetrics, Result};
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Queued events per target before back-pressure drops them
const TARGET_QUEUE_DEPTH: usize = 64;

/// Shared registry of live targets
pub(crate) type Registry = Arc<RwLock<HashMap<String, TargetEntry>>>;

/// Everything the engine tracks for one target
pub(crate) struct TargetEntry {
    pub target: ForwardingTarget,
    pub stats: TargetStats,
    pub transport: Arc<TransportHandle>,
    pub queue: mpsc::Sender<DispatchJob>,
    pub worker: Option<JoinHandle<()>>,
    pub limiters: HashMap<String, TokenBucket>,
}

/// Read-only view of a target and its delivery statistics
#[derive(Serialize)]
pub struct TargetSnapshot {
    /// Target definition including engine-owned health state
    #[serde(flatten)]
    pub target: ForwardingTarget,
    /// Delivery statistics
    pub stats: TargetStatsSnapshot,
}

/// Deep copy of the engine's metrics surface
#[derive(Serialize)]
pub struct ForwardingMetrics {
    /// Global gateway counters
    pub global: MetricsSnapshot,
    /// Per-target delivery statistics
    pub targets: HashMap<String, TargetStatsSnapshot>,
}

/// Policy-driven fan-out of accepted events to downstream targets
pub struct ForwardingEngine {
    registry: Registry,
    metrics: Arc<GatewayMetrics>,
    initial_targets: Vec<ForwardingTarget>,
    shutdown: watch::Sender<bool>,
    running: AtomicBool,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl ForwardingEngine {
    /// Create a stopped engine. `initial_targets` are opened by
    /// [`ForwardingEngine::start`].
    pub fn new(metrics: Arc<GatewayMetrics>, initial_targets: Vec<ForwardingTarget>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            registry: Arc::new(RwLock::new(HashMap::new())),
            metrics,
            initial_targets,
            shutdown,
            running: AtomicBool::new(false),
            background: Mutex::new(Vec::new()),
        }
    }

    /// Open the configured targets and launch the background tasks.
    /// Idempotent; a second call is a no-op.
    pub async fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let _ = self.shutdown.send(false);

        for target in self.initial_targets.clone() {
            let id = target.id.clone();
            if let Err(e) = self.add_target(target).await {
                // A dead downstream must not keep the gateway from coming
                // up; the target can be re-added through management later.
                warn!(target = %id, error = %e, "failed to open configured target");
            }
        }

        let mut background = self.background.lock().await;
        background.push(tokio::spawn(run_health_sweep(
            Arc::clone(&self.registry),
            self.shutdown.subscribe(),
        )));
        background.push(tokio::spawn(run_metrics_rollup(
            Arc::clone(&self.registry),
            self.shutdown.subscribe(),
        )));

        info!("forwarding engine started");
        Ok(())
    }

    /// Cancel background tasks, drain in-flight dispatches within the
    /// shutdown grace period, and close every transport. Idempotent.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown.send(true);

        let background = std::mem::take(&mut *self.background.lock().await);
        for task in background {
            let _ = task.await;
        }

        let entries: Vec<TargetEntry> = {
            let mut registry = self.registry.write().await;
            registry.drain().map(|(_, entry)| entry).collect()
        };

        let mut workers = Vec::new();
        let mut transports = Vec::new();
        for mut entry in entries {
            if let Some(worker) = entry.worker.take() {
                workers.push(worker);
            }
            transports.push(Arc::clone(&entry.transport));
            // Dropping the entry drops its queue sender; the worker
            // finishes the in-flight job and exits.
        }

        if tokio::time::timeout(SHUTDOWN_GRACE, join_all(workers))
            .await
            .is_err()
        {
            warn!("dispatch workers did not drain within the grace period");
        }

        for transport in transports {
            transport.close().await;
        }

        info!("forwarding engine stopped");
    }

    /// Fan the event out to every matching target.
    ///
    /// No matches is a silent success. Otherwise all dispatches run in
    /// parallel; once every one has settled, at least one acceptance
    /// makes the event forwarded, and a full sweep of failures surfaces
    /// as an aggregated error.
    pub async fn forward(&self, event: Arc<Event>) -> Result<()> {
        let mut pending: Vec<(String, oneshot::Receiver<Result<()>>)> = Vec::new();
        let mut failures: Vec<String> = Vec::new();

        {
            let registry = self.registry.read().await;
            for (id, entry) in registry.iter() {
                if !entry.target.matches_event(&event) {
                    continue;
                }

                let rule = entry.target.matching_rule(&event);
                if let Some(rule) = rule {
                    if let Some(bucket) = entry.limiters.get(&rule.id) {
                        if !bucket.try_acquire() {
                            debug!(target = %id, rule = %rule.id, "rate limit exhausted, skipping target");
                            continue;
                        }
                    }
                }

                let (done_tx, done_rx) = oneshot::channel();
                let job = DispatchJob {
                    event: Arc::clone(&event),
                    transform: rule.and_then(|r| r.transform.clone()),
                    done: done_tx,
                };
                match entry.queue.try_send(job) {
                    Ok(()) => pending.push((id.clone(), done_rx)),
                    Err(_) => {
                        worker::mark_dropped(&self.metrics, id);
                        failures.push(format!("{id}: dispatch queue full"));
                    }
                }
            }
        }

        if pending.is_empty() && failures.is_empty() {
            return Ok(());
        }

        let mut successes = 0usize;
        for (id, done) in pending {
            match done.await {
                Ok(Ok(())) => successes += 1,
                Ok(Err(e)) => failures.push(format!("{id}: {e}")),
                Err(_) => failures.push(format!("{id}: worker terminated")),
            }
        }

        if successes > 0 {
            self.metrics.inc_forwarded();
            Ok(())
        } else {
            self.metrics.inc_failed();
            Err(Error::AllTargetsFailed {
                count: failures.len(),
                details: failures.join("; "),
            })
        }
    }

    /// Register a new target: validate, open the transport, insert, and
    /// start its worker. The transport is opened before insertion so a
    /// target that cannot connect is never registered.
    pub async fn add_target(&self, mut target: ForwardingTarget) -> Result<()> {
        target.validate()?;

        {
            let registry = self.registry.read().await;
            if registry.contains_key(&target.id) {
                return Err(Error::AlreadyExists(target.id));
            }
        }

        let transport = Arc::new(TransportHandle::connect(&target).await?);

        // Health bookkeeping belongs to the engine; only an explicit
        // Disabled survives from the caller's definition.
        if target.status != TargetStatus::Disabled {
            target.status = TargetStatus::Unknown;
        }
        target.consecutive_errors = 0;
        target.last_error = None;

        let entry = self.build_entry(target, transport);
        let id = entry.target.id.clone();
        let endpoint = entry.target.endpoint.clone();

        let duplicate = {
            let mut registry = self.registry.write().await;
            if registry.contains_key(&id) {
                Some(entry)
            } else {
                info!(target = %id, endpoint = %endpoint, "target added");
                registry.insert(id.clone(), entry);
                None
            }
        };

        if let Some(entry) = duplicate {
            entry.transport.close().await;
            return Err(Error::AlreadyExists(id));
        }
        Ok(())
    }

    /// Replace an existing target wholesale. The new transport is opened
    /// before the old target is removed, so a broken replacement leaves
    /// the old route intact.
    pub async fn replace_target(&self, id: &str, mut target: ForwardingTarget) -> Result<()> {
        target.id = id.to_string();
        target.validate()?;

        {
            let registry = self.registry.read().await;
            if !registry.contains_key(id) {
                return Err(Error::NotFound(format!("target {id}")));
            }
        }

        let transport = Arc::new(TransportHandle::connect(&target).await?);
        if target.status != TargetStatus::Disabled {
            target.status = TargetStatus::Unknown;
        }
        target.consecutive_errors = 0;

        let entry = self.build_entry(target, transport);
        let old = {
            let mut registry = self.registry.write().await;
            registry.insert(id.to_string(), entry)
        };

        match old {
            Some(old) => {
                old.transport.close().await;
                info!(target = %id, "target replaced");
                Ok(())
            }
            None => {
                // Removed concurrently between the check and the swap;
                // the replacement simply became an add.
                info!(target = %id, "target replaced");
                Ok(())
            }
        }
    }

    /// Remove a target and release its transport
    pub async fn remove_target(&self, id: &str) -> Result<()> {
        let entry = {
            let mut registry = self.registry.write().await;
            registry.remove(id)
        }
        .ok_or_else(|| Error::NotFound(format!("target {id}")))?;

        let transport = Arc::clone(&entry.transport);
        drop(entry);
        transport.close().await;
        info!(target = %id, "target removed");
        Ok(())
    }

    /// Snapshot one target
    pub async fn get_target(&self, id: &str) -> Result<TargetSnapshot> {
        let registry = self.registry.read().await;
        registry
            .get(id)
            .map(|entry| TargetSnapshot {
                target: entry.target.clone(),
                stats: entry.stats.snapshot(),
            })
            .ok_or_else(|| Error::NotFound(format!("target {id}")))
    }

    /// Snapshot every target, sorted by id for stable output
    pub async fn list_targets(&self) -> Vec<TargetSnapshot> {
        let registry = self.registry.read().await;
        let mut snapshots: Vec<TargetSnapshot> = registry
            .values()
            .map(|entry| TargetSnapshot {
                target: entry.target.clone(),
                stats: entry.stats.snapshot(),
            })
            .collect();
        snapshots.sort_by(|a, b| a.target.id.cmp(&b.target.id));
        snapshots
    }

    /// Deep copy of global counters plus per-target statistics
    pub async fn metrics(&self) -> ForwardingMetrics {
        let registry = self.registry.read().await;
        ForwardingMetrics {
            global: self.metrics.snapshot(),
            targets: registry
                .iter()
                .map(|(id, entry)| (id.clone(), entry.stats.snapshot()))
                .collect(),
        }
    }

    fn build_entry(&self, target: ForwardingTarget, transport: Arc<TransportHandle>) -> TargetEntry {
        let (queue_tx, queue_rx) = mpsc::channel(TARGET_QUEUE_DEPTH);
        let limiters = target
            .rules
            .iter()
            .filter_map(|rule| {
                rule.rate_limit
                    .map(|limit| (rule.id.clone(), TokenBucket::new(limit)))
            })
            .collect();
        let worker = tokio::spawn(worker::run_worker(
            target.id.clone(),
            Arc::clone(&self.registry),
            queue_rx,
        ));

        TargetEntry {
            target,
            stats: TargetStats::default(),
            transport,
            queue: queue_tx,
            worker: Some(worker),
            limiters,
        }
    }
}

#[async_trait]
impl EventSink for ForwardingEngine {
    async fn submit(&self, event: Arc<Event>) -> Result<()> {
        self.forward(event).await
    }
}

/// Probe every target on a fixed cadence until shutdown.
async fn run_health_sweep(registry: Registry, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(HEALTH_SWEEP_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => sweep_once(&registry).await,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    debug!("health sweep task stopped");
}

async fn sweep_once(registry: &Registry) {
    let probes: Vec<(String, Arc<TransportHandle>)> = {
        let registry = registry.read().await;
        registry
            .iter()
            .filter(|(_, entry)| entry.target.status != TargetStatus::Disabled)
            .map(|(id, entry)| (id.clone(), Arc::clone(&entry.transport)))
            .collect()
    };

    for (id, transport) in probes {
        let healthy = tokio::time::timeout(HEALTH_PROBE_TIMEOUT, transport.health_check())
            .await
            .unwrap_or(false);

        let mut registry = registry.write().await;
        if let Some(entry) = registry.get_mut(&id) {
            worker::mark_probe(entry, healthy);
        }
    }
}

/// Restamp uptime percentages on a fixed cadence until shutdown.
async fn run_metrics_rollup(registry: Registry, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(METRICS_ROLLUP_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let mut registry = registry.write().await;
                for entry in registry.values_mut() {
                    entry.stats.recompute_uptime();
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    debug!("metrics rollup task stopped");
}
