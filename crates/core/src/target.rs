//! Forwarding target data model
//!
//! A target is a persistent route to a downstream recipient. The engine
//! exclusively owns every target and its live transport resource; the
//! management surface only sees cloned snapshots.

use crate::event::Event;
use crate::rules::ForwardingRule;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Transport family of a target endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetType {
    /// Remote gateway peer speaking the gRPC ingest contract
    Grpc,
    /// Generic HTTP JSON receiver
    Http,
    /// NATS subject (endpoint is `nats://host:port/subject`)
    MessageBus,
    /// HTTP webhook
    Webhook,
    /// Argo Events webhook source; no health endpoint
    ArgoEvents,
}

/// Authentication applied to outbound deliveries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TargetAuth {
    /// No authentication
    #[default]
    None,
    /// `Authorization: Bearer <token>`
    Bearer {
        /// Token value
        token: String,
    },
    /// HTTP basic auth
    Basic {
        /// User name
        username: String,
        /// Password
        password: String,
    },
    /// Static API key header
    ApiKey {
        /// Key value
        key: String,
        /// Header name; defaults to `X-API-Key`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        header: Option<String>,
    },
}

/// Delivery tuning for a target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Upper bound on one dispatch including all retries, seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after the first failed attempt
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Fixed delay between attempts, milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Extra headers sent with every HTTP/webhook delivery
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Outbound authentication
    #[serde(default)]
    pub auth: TargetAuth,

    /// Health probe URL for HTTP targets; a `HEAD` against the endpoint
    /// is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_endpoint: Option<String>,

    /// Batch size hint for bus producers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,

    /// Batch flush interval hint, milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_timeout_ms: Option<u64>,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            headers: HashMap::new(),
            auth: TargetAuth::None,
            health_endpoint: None,
            batch_size: None,
            batch_timeout_ms: None,
        }
    }
}

/// Health state of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    /// Last probe or delivery succeeded
    Healthy,
    /// Three consecutive failures
    Unhealthy,
    /// Administratively off; never matched, never probed
    Disabled,
    /// Not yet probed
    Unknown,
}

impl Default for TargetStatus {
    fn default() -> Self {
        TargetStatus::Unknown
    }
}

/// A registered downstream recipient of forwarded events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardingTarget {
    /// Unique key, enforced on add
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Transport family
    #[serde(rename = "type")]
    pub target_type: TargetType,

    /// Transport-specific address
    pub endpoint: String,

    /// Delivery tuning
    #[serde(default)]
    pub config: TargetConfig,

    /// Ordered rule list; empty matches every event
    #[serde(default)]
    pub rules: Vec<ForwardingRule>,

    /// Health state, owned by the engine
    #[serde(default)]
    pub status: TargetStatus,

    /// Last successful probe or delivery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_healthy: Option<DateTime<Utc>>,

    /// Most recent delivery or probe error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    /// Consecutive dispatch failures; three flips status to unhealthy
    #[serde(default)]
    pub consecutive_errors: u32,
}

impl ForwardingTarget {
    /// Validate the administrative fields supplied on add/update.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::invalid_argument("target id is empty"));
        }
        if self.name.is_empty() {
            return Err(Error::invalid_argument("target name is empty"));
        }
        if self.endpoint.is_empty() {
            return Err(Error::invalid_argument("target endpoint is empty"));
        }
        Ok(())
    }

    /// Whether this target should receive the event.
    ///
    /// Disabled targets never match. A target with no rules matches every
    /// event; otherwise any enabled rule matching is enough.
    pub fn matches_event(&self, event: &Event) -> bool {
        if self.status == TargetStatus::Disabled {
            return false;
        }
        if self.rules.is_empty() {
            return true;
        }
        self.rules.iter().any(|r| r.matches(event))
    }

    /// First enabled rule matching the event, in priority order. The
    /// winning rule supplies the transform and rate limit for dispatch.
    pub fn matching_rule(&self, event: &Event) -> Option<&ForwardingRule> {
        let mut rules: Vec<&ForwardingRule> = self.rules.iter().collect();
        rules.sort_by_key(|r| r.priority);
        rules.into_iter().find(|r| r.matches(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{ConditionOperator, RuleCondition};
    use serde_json::json;

    fn event(event_type: &str) -> Event {
        Event {
            event_id: "e1".into(),
            event_type: event_type.into(),
            source: "auth".into(),
            timestamp: 1,
            data: "{}".into(),
            metadata: HashMap::new(),
        }
    }

    fn rule(id: &str, event_type: &str, priority: i32) -> ForwardingRule {
        ForwardingRule {
            id: id.into(),
            name: id.into(),
            enabled: true,
            priority,
            conditions: vec![RuleCondition {
                field: "event_type".into(),
                operator: ConditionOperator::Eq,
                value: json!(event_type),
                negate: false,
            }],
            transform: None,
            rate_limit: None,
        }
    }

    fn target(rules: Vec<ForwardingRule>) -> ForwardingTarget {
        ForwardingTarget {
            id: "t1".into(),
            name: "downstream".into(),
            target_type: TargetType::Http,
            endpoint: "http://localhost:9000/events".into(),
            config: TargetConfig::default(),
            rules,
            status: TargetStatus::Unknown,
            last_healthy: None,
            last_error: None,
            consecutive_errors: 0,
        }
    }

    #[test]
    fn zero_rules_match_everything() {
        assert!(target(vec![]).matches_event(&event("anything.at.all")));
    }

    #[test]
    fn rules_are_disjunctive() {
        let t = target(vec![rule("r1", "user.created", 0), rule("r2", "user.deleted", 1)]);
        assert!(t.matches_event(&event("user.created")));
        assert!(t.matches_event(&event("user.deleted")));
        assert!(!t.matches_event(&event("billing.charged")));
    }

    #[test]
    fn disabled_target_never_matches() {
        let mut t = target(vec![]);
        t.status = TargetStatus::Disabled;
        assert!(!t.matches_event(&event("user.created")));
    }

    #[test]
    fn matching_rule_honors_priority() {
        let t = target(vec![rule("low", "user.created", 10), rule("high", "user.created", 1)]);
        assert_eq!(t.matching_rule(&event("user.created")).unwrap().id, "high");
    }

    #[test]
    fn validate_requires_admin_fields() {
        let mut t = target(vec![]);
        t.endpoint.clear();
        assert!(matches!(t.validate(), Err(Error::InvalidArgument(_))));
        assert!(target(vec![]).validate().is_ok());
    }

    #[test]
    fn target_definition_deserializes_from_management_json() {
        let t: ForwardingTarget = serde_json::from_value(json!({
            "id": "audit",
            "name": "Audit webhook",
            "type": "webhook",
            "endpoint": "https://audit.internal/hook",
            "config": {
                "timeout_secs": 10,
                "retry_attempts": 2,
                "retry_delay_ms": 250,
                "auth": {"type": "bearer", "token": "s3cret"}
            },
            "rules": [{
                "id": "users",
                "name": "user events",
                "conditions": [
                    {"field": "event_type", "operator": "contains", "value": "user"}
                ]
            }]
        }))
        .unwrap();

        assert_eq!(t.target_type, TargetType::Webhook);
        assert_eq!(t.config.retry_attempts, 2);
        assert_eq!(t.config.auth, TargetAuth::Bearer { token: "s3cret".into() });
        assert_eq!(t.status, TargetStatus::Unknown);
        assert!(t.matches_event(&event("user.created")));
    }
}
