//! Stream registry: fan-out broadcast to subscribed clients
//!
//! The registry owns the send half of every open subscription. Broadcast
//! uses non-blocking sends so one dead or lagging client never delays
//! delivery to the healthy ones; failed senders are removed in the same
//! sweep. Subscribers never hold ownership of their registry entry — their
//! disconnect is observed as a send failure (or an explicit deregister
//! from the transport layer).

use crate::event::Event;
use crate::metrics::GatewayMetrics;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Buffered events per subscription before a client counts as lagging
pub const STREAM_BUFFER: usize = 256;

/// Process-wide mapping from stream id to the subscriber's send handle
pub struct StreamRegistry {
    streams: RwLock<HashMap<String, mpsc::Sender<Arc<Event>>>>,
    metrics: Arc<GatewayMetrics>,
}

impl StreamRegistry {
    /// Create an empty registry publishing its size into `metrics`
    pub fn new(metrics: Arc<GatewayMetrics>) -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
            metrics,
        }
    }

    /// Register a new subscription under `stream_id`.
    ///
    /// Replaces any stale entry left by an earlier connection with the
    /// same id.
    pub async fn register(&self, stream_id: impl Into<String>, sender: mpsc::Sender<Arc<Event>>) {
        let stream_id = stream_id.into();
        let mut streams = self.streams.write().await;
        if streams.insert(stream_id.clone(), sender).is_some() {
            warn!(stream_id = %stream_id, "replacing existing stream registration");
        }
        self.metrics.set_active_streams(streams.len());
        debug!(stream_id = %stream_id, active = streams.len(), "stream registered");
    }

    /// Drop a subscription. Safe to call twice; deregistering an unknown
    /// id is a no-op.
    pub async fn deregister(&self, stream_id: &str) {
        let mut streams = self.streams.write().await;
        if streams.remove(stream_id).is_some() {
            debug!(stream_id = %stream_id, active = streams.len(), "stream deregistered");
        }
        self.metrics.set_active_streams(streams.len());
    }

    /// Send the event to every registered subscriber.
    ///
    /// Sends are non-blocking; subscribers whose buffers are full or whose
    /// receive half is gone are removed after the sweep. Returns the
    /// number of successful deliveries.
    pub async fn broadcast(&self, event: Arc<Event>) -> usize {
        let mut dead: Vec<String> = Vec::new();
        let delivered = {
            let streams = self.streams.read().await;
            let mut delivered = 0;
            for (id, sender) in streams.iter() {
                match sender.try_send(event.clone()) {
                    Ok(()) => delivered += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        warn!(stream_id = %id, "stream buffer full, dropping subscriber");
                        dead.push(id.clone());
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        dead.push(id.clone());
                    }
                }
            }
            delivered
        };

        if !dead.is_empty() {
            let mut streams = self.streams.write().await;
            for id in dead {
                streams.remove(&id);
            }
            self.metrics.set_active_streams(streams.len());
        }
        delivered
    }

    /// Number of currently registered subscriptions
    pub async fn active_count(&self) -> usize {
        self.streams.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    fn event(id: &str) -> Arc<Event> {
        Arc::new(Event {
            event_id: id.into(),
            event_type: "user.created".into(),
            source: "test".into(),
            timestamp: 1,
            data: "{}".into(),
            metadata: StdHashMap::new(),
        })
    }

    fn registry() -> StreamRegistry {
        StreamRegistry::new(Arc::new(GatewayMetrics::new()))
    }

    #[tokio::test]
    async fn broadcast_reaches_every_subscriber_once() {
        let registry = registry();
        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);
        registry.register("a", tx_a).await;
        registry.register("b", tx_b).await;

        let delivered = registry.broadcast(event("e2")).await;
        assert_eq!(delivered, 2);
        assert_eq!(rx_a.recv().await.unwrap().event_id, "e2");
        assert_eq!(rx_b.recv().await.unwrap().event_id, "e2");
        assert!(rx_a.try_recv().is_err(), "exactly one copy per subscriber");
    }

    #[tokio::test]
    async fn closed_subscriber_is_swept_without_blocking_others() {
        let registry = registry();
        let (tx_dead, rx_dead) = mpsc::channel(8);
        let (tx_live, mut rx_live) = mpsc::channel(8);
        registry.register("dead", tx_dead).await;
        registry.register("live", tx_live).await;
        drop(rx_dead);

        let delivered = registry.broadcast(event("e1")).await;
        assert_eq!(delivered, 1);
        assert_eq!(rx_live.recv().await.unwrap().event_id, "e1");
        assert_eq!(registry.active_count().await, 1);
    }

    #[tokio::test]
    async fn full_buffer_drops_the_lagging_subscriber() {
        let registry = registry();
        let (tx, _rx) = mpsc::channel(1);
        registry.register("laggard", tx).await;

        assert_eq!(registry.broadcast(event("e1")).await, 1);
        // Buffer of one is now full and the client is not draining.
        assert_eq!(registry.broadcast(event("e2")).await, 0);
        assert_eq!(registry.active_count().await, 0);
    }

    #[tokio::test]
    async fn deregister_is_idempotent() {
        let registry = registry();
        let (tx, _rx) = mpsc::channel(8);
        registry.register("s", tx).await;
        registry.deregister("s").await;
        registry.deregister("s").await;
        assert_eq!(registry.active_count().await, 0);
    }
}
