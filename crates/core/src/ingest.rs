//! Ingestion core shared by every transport
//!
//! All ingestion paths (gRPC unary, gRPC stream, HTTP unary, HTTP batch,
//! legacy) funnel through [`IngestCore::ingest`]: count, stamp the
//! timestamp, validate, then hand the immutable event to the forwarding
//! engine and the broadcast fabric. Ingest never waits on downstream
//! targets — forwarding runs on a spawned task and the gateway answers
//! `accepted` as soon as the event is enqueued.

use crate::error::{Error, Result};
use crate::event::Event;
use crate::metrics::GatewayMetrics;
use crate::streams::StreamRegistry;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Largest accepted batch
pub const MAX_BATCH_EVENTS: usize = 1_000;

/// Seam between the ingestion core and the forwarding engine.
///
/// The engine implements this; the core stays transport-free. A `None`
/// sink (forwarding disabled) leaves ingestion and broadcast fully
/// functional.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver the event to every matching target. Errors are observable
    /// through metrics only; they never fail the ingest that produced the
    /// event.
    async fn submit(&self, event: Arc<Event>) -> Result<()>;
}

/// Acknowledgement returned to the ingesting caller
#[derive(Debug, Clone, Serialize)]
pub struct IngestAck {
    /// Echo of the event id
    pub event_id: String,
    /// Always `accepted` on success
    pub status: String,
}

/// Per-element outcome of a batch ingest
#[derive(Debug, Clone, Serialize)]
pub struct BatchItemOutcome {
    /// Echo of the element's event id (possibly empty when invalid)
    pub event_id: String,
    /// `accepted` or `error`
    pub status: String,
    /// Failure message for `error` outcomes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response of a batch ingest; the batch itself succeeds even when every
/// element fails validation
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    /// Number of elements examined
    pub processed: usize,
    /// Outcome per element, in request order
    pub results: Vec<BatchItemOutcome>,
}

/// Minimal legacy ingest shape
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyEvent {
    /// Event id
    #[serde(default)]
    pub id: String,
    /// JSON body
    #[serde(default)]
    pub data: String,
}

/// The polymorphic ingestion service behind every transport
pub struct IngestCore {
    metrics: Arc<GatewayMetrics>,
    streams: Arc<StreamRegistry>,
    sink: Option<Arc<dyn EventSink>>,
}

impl IngestCore {
    /// Wire the core to the shared metrics, the stream registry, and an
    /// optional forwarding sink
    pub fn new(
        metrics: Arc<GatewayMetrics>,
        streams: Arc<StreamRegistry>,
        sink: Option<Arc<dyn EventSink>>,
    ) -> Self {
        Self {
            metrics,
            streams,
            sink,
        }
    }

    /// Shared metrics handle
    pub fn metrics(&self) -> &Arc<GatewayMetrics> {
        &self.metrics
    }

    /// Shared stream registry
    pub fn streams(&self) -> &Arc<StreamRegistry> {
        &self.streams
    }

    /// Unary ingest: count, stamp, validate, forward, broadcast.
    pub async fn ingest(&self, event: Event) -> Result<IngestAck> {
        self.ingest_inner(event, false).await
    }

    /// Ingest one event received over a bidirectional stream. Identical
    /// to [`IngestCore::ingest`] plus the stream counter.
    pub async fn ingest_from_stream(&self, event: Event) -> Result<IngestAck> {
        self.ingest_inner(event, true).await
    }

    async fn ingest_inner(&self, mut event: Event, from_stream: bool) -> Result<IngestAck> {
        // Counted before validation so invalid events appear in both
        // total_events and error_events.
        self.metrics.inc_total();
        if from_stream {
            self.metrics.inc_stream();
        }

        if event.timestamp == 0 {
            event.timestamp = Utc::now().timestamp();
        }

        if let Err(e) = event.validate() {
            self.metrics.inc_error();
            return Err(e);
        }

        let event = Arc::new(event);

        // Forwarding runs detached: target slowness or failure must never
        // stall the ingesting caller. Outcomes land in the engine metrics.
        if let Some(sink) = &self.sink {
            let sink = Arc::clone(sink);
            let forwarded = Arc::clone(&event);
            tokio::spawn(async move {
                if let Err(e) = sink.submit(forwarded).await {
                    warn!(error = %e, "forwarding failed");
                }
            });
        }

        let delivered = self.streams.broadcast(Arc::clone(&event)).await;
        debug!(
            event_id = %event.event_id,
            event_type = %event.event_type,
            subscribers = delivered,
            "event accepted"
        );

        Ok(IngestAck {
            event_id: event.event_id.clone(),
            status: "accepted".to_string(),
        })
    }

    /// Batch ingest: each element is processed independently and reported
    /// in order. Fails only on an empty or oversized list.
    pub async fn ingest_batch(&self, events: Vec<Event>) -> Result<BatchOutcome> {
        if events.is_empty() {
            return Err(Error::invalid_argument("batch is empty"));
        }
        if events.len() > MAX_BATCH_EVENTS {
            return Err(Error::invalid_argument(format!(
                "batch exceeds {MAX_BATCH_EVENTS} events"
            )));
        }

        let mut results = Vec::with_capacity(events.len());
        for event in events {
            let event_id = event.event_id.clone();
            match self.ingest(event).await {
                Ok(ack) => results.push(BatchItemOutcome {
                    event_id: ack.event_id,
                    status: "accepted".to_string(),
                    error: None,
                }),
                Err(e) => results.push(BatchItemOutcome {
                    event_id,
                    status: "error".to_string(),
                    error: Some(e.to_string()),
                }),
            }
        }

        Ok(BatchOutcome {
            processed: results.len(),
            results,
        })
    }

    /// Legacy ingest: synthesize the full envelope around a `{id, data}`
    /// body and run the standard path.
    pub async fn ingest_legacy(&self, legacy: LegacyEvent) -> Result<IngestAck> {
        let event = Event {
            event_id: legacy.id,
            event_type: "legacy.event".to_string(),
            source: "legacy-api".to_string(),
            timestamp: Utc::now().timestamp(),
            data: legacy.data,
            metadata: HashMap::new(),
        };
        self.ingest(event).await
    }
}
