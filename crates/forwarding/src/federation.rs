//! Federation invocation router
//!
//! A thin request router over the same transport adapters the forwarding
//! engine uses: look up the named server, apply its auth, issue the
//! opaque call with retry, and record health on the three-strikes rule.
//! No rule evaluation, no fan-out; failures surface directly to the
//! caller.

use crate::adapters::TransportHandle;
use crate::retry::{execute_with_retry, RetryPolicy};
use crate::worker::UNHEALTHY_THRESHOLD;
use chrono::{DateTime, Utc};
use mcp_gateway_core::target::{TargetConfig, TargetStatus, TargetType};
use mcp_gateway_core::{Error, Result};
use mcp_gateway_proto::generated::{McpRequest, McpResponse};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// A cataloged remote MCP server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederatedServer {
    /// Unique name, the routing key for invocations
    pub name: String,

    /// Transport address
    pub endpoint: String,

    /// gRPC or HTTP; bus targets cannot serve invocations
    pub protocol: TargetType,

    /// Timeout, retry, and auth settings (same shape as targets)
    #[serde(default)]
    pub config: TargetConfig,

    /// Health state, owned by the router
    #[serde(default)]
    pub status: TargetStatus,

    /// Most recent successful invocation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_healthy: Option<DateTime<Utc>>,

    /// Most recent failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    /// Consecutive failed invocations
    #[serde(default)]
    pub consecutive_errors: u32,
}

struct FederationEntry {
    server: FederatedServer,
    transport: Arc<TransportHandle>,
}

/// Routes opaque MCP invocations to cataloged remote servers
pub struct FederationRouter {
    servers: RwLock<HashMap<String, FederationEntry>>,
}

impl FederationRouter {
    /// Empty catalog
    pub fn new() -> Self {
        Self {
            servers: RwLock::new(HashMap::new()),
        }
    }

    /// Add a server to the catalog, opening its transport first
    pub async fn register(&self, mut server: FederatedServer) -> Result<()> {
        if server.name.is_empty() {
            return Err(Error::invalid_argument("server name is empty"));
        }
        if server.endpoint.is_empty() {
            return Err(Error::invalid_argument("server endpoint is empty"));
        }
        if server.protocol == TargetType::MessageBus || server.protocol == TargetType::ArgoEvents {
            return Err(Error::invalid_argument(
                "federated servers must speak gRPC or HTTP",
            ));
        }
        {
            let servers = self.servers.read().await;
            if servers.contains_key(&server.name) {
                return Err(Error::AlreadyExists(server.name));
            }
        }

        // Adapters are shared with the forwarding engine; a synthetic
        // target carries the connection settings.
        let probe_target = mcp_gateway_core::ForwardingTarget {
            id: server.name.clone(),
            name: server.name.clone(),
            target_type: server.protocol,
            endpoint: server.endpoint.clone(),
            config: server.config.clone(),
            rules: Vec::new(),
            status: TargetStatus::Unknown,
            last_healthy: None,
            last_error: None,
            consecutive_errors: 0,
        };
        let transport = Arc::new(TransportHandle::connect(&probe_target).await?);

        server.status = TargetStatus::Unknown;
        server.consecutive_errors = 0;

        let name = server.name.clone();
        let mut servers = self.servers.write().await;
        if servers.contains_key(&name) {
            return Err(Error::AlreadyExists(name));
        }
        info!(server = %name, endpoint = %server.endpoint, "federated server registered");
        servers.insert(name, FederationEntry { server, transport });
        Ok(())
    }

    /// Remove a server and release its transport
    pub async fn deregister(&self, name: &str) -> Result<()> {
        let entry = {
            let mut servers = self.servers.write().await;
            servers.remove(name)
        }
        .ok_or_else(|| Error::NotFound(format!("server {name}")))?;

        entry.transport.close().await;
        info!(server = %name, "federated server removed");
        Ok(())
    }

    /// Snapshot the catalog, sorted by name
    pub async fn list(&self) -> Vec<FederatedServer> {
        let servers = self.servers.read().await;
        let mut list: Vec<FederatedServer> =
            servers.values().map(|entry| entry.server.clone()).collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    /// Route one invocation to the named server.
    pub async fn invoke(&self, name: &str, request: McpRequest) -> Result<McpResponse> {
        let (transport, policy, deadline) = {
            let servers = self.servers.read().await;
            let entry = servers
                .get(name)
                .ok_or_else(|| Error::NotFound(format!("server {name}")))?;
            (
                Arc::clone(&entry.transport),
                RetryPolicy::fixed(
                    entry.server.config.retry_attempts,
                    Duration::from_millis(entry.server.config.retry_delay_ms),
                ),
                Duration::from_secs(entry.server.config.timeout_secs),
            )
        };

        let attempt_transport = Arc::clone(&transport);
        let outcome = match tokio::time::timeout(
            deadline,
            execute_with_retry(policy, move || {
                let transport = Arc::clone(&attempt_transport);
                let request = request.clone();
                async move { transport.invoke(request).await }
            }),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                timeout_ms: deadline.as_millis() as u64,
                context: format!("invocation on {name}"),
            }),
        };

        self.record_outcome(name, outcome.is_ok(), outcome.as_ref().err()).await;
        outcome
    }

    async fn record_outcome(&self, name: &str, success: bool, error: Option<&Error>) {
        let mut servers = self.servers.write().await;
        let Some(entry) = servers.get_mut(name) else {
            return;
        };

        if success {
            entry.server.consecutive_errors = 0;
            entry.server.status = TargetStatus::Healthy;
            entry.server.last_healthy = Some(Utc::now());
        } else {
            let message = error.map(|e| e.to_string()).unwrap_or_default();
            warn!(server = %name, error = %message, "federated invocation failed");
            entry.server.consecutive_errors += 1;
            entry.server.last_error = Some(message);
            if entry.server.consecutive_errors >= UNHEALTHY_THRESHOLD {
                entry.server.status = TargetStatus::Unhealthy;
            }
        }
    }
}

impl Default for FederationRouter {
    fn default() -> Self {
        Self::new()
    }
}
