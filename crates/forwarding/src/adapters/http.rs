//! HTTP, webhook, and argo-events delivery
//!
//! One adapter covers all three: they differ only in content type and
//! health semantics. Events are POSTed as JSON; the response status is
//! classified per the delivery contract (408/429/5xx transient, other
//! 4xx fatal).

use mcp_gateway_core::target::{ForwardingTarget, TargetAuth};
use mcp_gateway_core::{Error, Event, Result};
use mcp_gateway_proto::generated::{McpRequest, McpResponse};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

/// Content type sent with argo-events deliveries
const ARGO_CONTENT_TYPE: &str = "application/cloudevents+json";

/// Default header carrying an API key
const API_KEY_HEADER: &str = "X-API-Key";

/// Delivery flavor of an HTTP-family target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookMode {
    /// Plain JSON POST with an optional health probe
    Standard,
    /// Argo-events source: distinct content type, no health endpoint
    Argo,
}

/// HTTP client handle for one target
pub struct HttpForwarder {
    client: reqwest::Client,
    endpoint: String,
    health_endpoint: Option<String>,
    auth: TargetAuth,
    mode: WebhookMode,
}

impl HttpForwarder {
    /// Build the client with the target's headers baked in. Invalid
    /// header names or values are fatal: the target is not registered.
    pub fn new(target: &ForwardingTarget, mode: WebhookMode) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &target.config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::invalid_argument(format!("invalid header name {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::invalid_argument(format!("invalid header value: {e}")))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(target.config.timeout_secs))
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: target.endpoint.clone(),
            health_endpoint: target.config.health_endpoint.clone(),
            auth: target.config.auth.clone(),
            mode,
        })
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            TargetAuth::None => request,
            TargetAuth::Bearer { token } => request.bearer_auth(token),
            TargetAuth::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
            TargetAuth::ApiKey { key, header } => {
                request.header(header.as_deref().unwrap_or(API_KEY_HEADER), key)
            }
        }
    }

    /// POST the event as JSON
    pub async fn deliver(&self, event: &Event) -> Result<()> {
        let mut request = self.apply_auth(self.client.post(&self.endpoint)).json(event);
        if self.mode == WebhookMode::Argo {
            request = request.header(CONTENT_TYPE, ARGO_CONTENT_TYPE);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::transient(format!("request failed: {e}")))?;

        classify_status(response.status())
    }

    /// Probe the configured health URL, or HEAD the endpoint. Argo
    /// targets have no health surface and count as healthy.
    pub async fn health_check(&self) -> bool {
        if self.mode == WebhookMode::Argo {
            return true;
        }
        let request = match &self.health_endpoint {
            Some(url) => self.client.get(url),
            None => self.client.head(&self.endpoint),
        };
        match self.apply_auth(request).send().await {
            Ok(response) => {
                let healthy = !response.status().is_server_error();
                debug!(status = %response.status(), healthy, "http health probe");
                healthy
            }
            Err(_) => false,
        }
    }

    /// POST an opaque MCP invocation and hand back the body verbatim
    pub async fn invoke(&self, request: McpRequest) -> Result<McpResponse> {
        let body = serde_json::json!({
            "id": request.id,
            "method": request.method,
            "params": serde_json::from_str::<serde_json::Value>(&request.params)
                .unwrap_or(serde_json::Value::Null),
            "metadata": request.metadata,
        });

        let response = self
            .apply_auth(self.client.post(&self.endpoint))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::transient(format!("invocation failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::transient(format!("invocation body unreadable: {e}")))?;

        classify_status(status)?;
        Ok(McpResponse {
            id: request.id,
            result: text,
            error: String::new(),
        })
    }
}

/// Map a response status onto the delivery outcome
fn classify_status(status: StatusCode) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }
    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        return Err(Error::transient(format!("downstream returned {status}")));
    }
    Err(Error::internal(format!("downstream rejected delivery: {status}")))
}
