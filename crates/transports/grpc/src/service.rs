//! The McpGateway service implementation
//!
//! Unary ingest and the bidirectional stream both funnel into the shared
//! [`IngestCore`]; the stream side additionally registers itself with the
//! stream registry so every broadcast event is pushed back to the client.

use crate::metrics::ServiceMetrics;
use mcp_gateway_core::streams::STREAM_BUFFER;
use mcp_gateway_core::{Event, IngestCore};
use mcp_gateway_forwarding::FederationRouter;
use mcp_gateway_proto::convert::error_to_status;
use mcp_gateway_proto::generated::{
    mcp_gateway_server::McpGateway, Event as ProtoEvent, HealthRequest, HealthResponse,
    IngestRequest, IngestResponse, McpRequest, McpResponse, MetricsRequest, MetricsResponse,
};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tonic::{Request, Response, Status, Streaming};
use tracing::{debug, info};
use uuid::Uuid;

/// gRPC surface over the shared ingestion core
pub struct GatewayGrpcService {
    ingest: Arc<IngestCore>,
    federation: Option<Arc<FederationRouter>>,
    metrics: Arc<ServiceMetrics>,
}

impl GatewayGrpcService {
    /// Wire the service to the ingestion core and optional federation
    /// router
    pub fn new(
        ingest: Arc<IngestCore>,
        federation: Option<Arc<FederationRouter>>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            ingest,
            federation,
            metrics,
        }
    }
}

#[tonic::async_trait]
impl McpGateway for GatewayGrpcService {
    async fn ingest(
        &self,
        request: Request<IngestRequest>,
    ) -> Result<Response<IngestResponse>, Status> {
        let start = self.metrics.record_request_start();

        let Some(proto_event) = request.into_inner().event else {
            // The absent record still counts: total and error both move.
            self.ingest.metrics().inc_total();
            self.ingest.metrics().inc_error();
            self.metrics.record_request_end("Ingest", "error", start);
            return Err(Status::invalid_argument("event is absent"));
        };

        match self.ingest.ingest(Event::from(proto_event)).await {
            Ok(ack) => {
                self.metrics.record_request_end("Ingest", "ok", start);
                Ok(Response::new(IngestResponse {
                    event_id: ack.event_id,
                    status: ack.status,
                }))
            }
            Err(e) => {
                self.metrics.record_request_end("Ingest", "error", start);
                Err(error_to_status(&e))
            }
        }
    }

    type StreamEventsStream = Pin<Box<dyn Stream<Item = Result<ProtoEvent, Status>> + Send>>;

    async fn stream_events(
        &self,
        request: Request<Streaming<ProtoEvent>>,
    ) -> Result<Response<Self::StreamEventsStream>, Status> {
        let mut inbound = request.into_inner();
        let stream_id = Uuid::new_v4().to_string();

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        self.ingest.streams().register(stream_id.clone(), tx).await;
        self.metrics.active_streams.inc();
        info!(stream_id = %stream_id, "event stream opened");

        // Reader: every client message is a full ingest. Validation
        // failures are counted and skipped; the stream itself stays up
        // until EOF or a transport error.
        let ingest = Arc::clone(&self.ingest);
        let streams = Arc::clone(self.ingest.streams());
        let service_metrics = Arc::clone(&self.metrics);
        let reader_id = stream_id.clone();
        tokio::spawn(async move {
            while let Some(message) = inbound.next().await {
                match message {
                    Ok(proto_event) => {
                        if let Err(e) = ingest.ingest_from_stream(Event::from(proto_event)).await {
                            debug!(stream_id = %reader_id, error = %e, "stream event rejected");
                        }
                    }
                    Err(status) => {
                        debug!(stream_id = %reader_id, status = %status, "stream read error");
                        break;
                    }
                }
            }
            streams.deregister(&reader_id).await;
            service_metrics.active_streams.dec();
            info!(stream_id = %reader_id, "event stream closed");
        });

        // Writer: broadcast copies flow back in registry order.
        let outbound =
            ReceiverStream::new(rx).map(|event: Arc<Event>| Ok(ProtoEvent::from(event.as_ref())));
        Ok(Response::new(Box::pin(outbound)))
    }

    async fn health(
        &self,
        _request: Request<HealthRequest>,
    ) -> Result<Response<HealthResponse>, Status> {
        let snapshot = self.ingest.metrics().snapshot();
        let mut details = HashMap::new();
        details.insert("version".to_string(), env!("CARGO_PKG_VERSION").to_string());
        details.insert(
            "active_streams".to_string(),
            snapshot.active_streams.to_string(),
        );

        Ok(Response::new(HealthResponse {
            status: "healthy".to_string(),
            uptime_ms: self.ingest.metrics().uptime_ms() as i64,
            details,
        }))
    }

    async fn metrics(
        &self,
        _request: Request<MetricsRequest>,
    ) -> Result<Response<MetricsResponse>, Status> {
        let snapshot = self.ingest.metrics().snapshot();
        Ok(Response::new(MetricsResponse {
            total_events: snapshot.total_events,
            stream_events: snapshot.stream_events,
            forwarded_events: snapshot.forwarded_events,
            failed_events: snapshot.failed_events,
            dropped_events: snapshot.dropped_events,
            error_events: snapshot.error_events,
            active_streams: snapshot.active_streams,
            uptime_seconds: snapshot.uptime_seconds,
            start_time: snapshot.start_time.timestamp(),
        }))
    }

    async fn invoke(
        &self,
        request: Request<McpRequest>,
    ) -> Result<Response<McpResponse>, Status> {
        let start = self.metrics.record_request_start();
        let Some(federation) = &self.federation else {
            self.metrics.record_request_end("Invoke", "error", start);
            return Err(Status::unavailable("federation is not configured"));
        };

        let invocation = request.into_inner();
        if invocation.metadata.get("server").is_none() {
            self.metrics.record_request_end("Invoke", "error", start);
            return Err(Status::invalid_argument(
                "metadata[\"server\"] names the federated server",
            ));
        }
        let server = invocation.metadata["server"].clone();

        match federation.invoke(&server, invocation).await {
            Ok(reply) => {
                self.metrics.record_request_end("Invoke", "ok", start);
                Ok(Response::new(reply))
            }
            Err(e) => {
                self.metrics.record_request_end("Invoke", "error", start);
                Err(error_to_status(&e))
            }
        }
    }
}
