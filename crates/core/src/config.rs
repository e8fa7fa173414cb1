//! Process configuration
//!
//! Read from the environment (optionally pointing at a JSON file for the
//! initial forwarding targets). Unset variables fall back to defaults;
//! values that are set but unparseable are configuration errors rather
//! than silent fallbacks.

use crate::error::{Error, Result};
use crate::target::ForwardingTarget;
use std::time::Duration;

/// HTTP read timeout
pub const HTTP_READ_TIMEOUT: Duration = Duration::from_secs(30);
/// HTTP write timeout
pub const HTTP_WRITE_TIMEOUT: Duration = Duration::from_secs(30);
/// HTTP idle connection timeout
pub const HTTP_IDLE_TIMEOUT: Duration = Duration::from_secs(120);
/// Grace period for in-flight work on shutdown
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);
/// Interval between target health sweeps
pub const HEALTH_SWEEP_INTERVAL: Duration = Duration::from_secs(30);
/// Timeout for one health probe
pub const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(10);
/// Interval between per-target metrics rollups
pub const METRICS_ROLLUP_INTERVAL: Duration = Duration::from_secs(60);

/// Gateway process configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// HTTP/REST listener port
    pub http_port: u16,
    /// gRPC listener port
    pub grpc_port: u16,
    /// Standalone health/readiness listener port
    pub health_port: u16,
    /// Log level handed to the tracing env filter
    pub log_level: String,
    /// Whether the forwarding engine starts at all
    pub forwarding_enabled: bool,
    /// Targets loaded by the engine on start
    pub targets: Vec<ForwardingTarget>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            grpc_port: 50051,
            health_port: 8081,
            log_level: "info".to_string(),
            forwarding_enabled: true,
            targets: Vec::new(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from the process environment.
    ///
    /// `FORWARDING_TARGETS` takes an inline JSON list of target
    /// definitions; `FORWARDING_CONFIG_FILE` points at a file with the
    /// same shape. The inline form wins when both are set.
    pub fn from_env() -> Result<Self> {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup (tests inject a
    /// map here).
    pub fn from_source(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let http_port = parse_port(&get, "HTTP_PORT", defaults.http_port)?;
        let grpc_port = parse_port(&get, "GRPC_PORT", defaults.grpc_port)?;
        let health_port = parse_port(&get, "HEALTH_PORT", defaults.health_port)?;

        let log_level = match get("LOG_LEVEL") {
            Some(level) => {
                let level = level.to_ascii_lowercase();
                match level.as_str() {
                    "debug" | "info" | "warn" | "error" => level,
                    other => {
                        return Err(Error::Config(format!("unknown LOG_LEVEL: {other}")));
                    }
                }
            }
            None => defaults.log_level,
        };

        let forwarding_enabled = match get("FORWARDING_ENABLED") {
            Some(v) => v
                .parse::<bool>()
                .map_err(|_| Error::Config(format!("FORWARDING_ENABLED is not a boolean: {v}")))?,
            None => defaults.forwarding_enabled,
        };

        let targets = if let Some(inline) = get("FORWARDING_TARGETS") {
            parse_targets(&inline, "FORWARDING_TARGETS")?
        } else if let Some(path) = get("FORWARDING_CONFIG_FILE") {
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| Error::Config(format!("cannot read {path}: {e}")))?;
            parse_targets(&raw, &path)?
        } else {
            Vec::new()
        };

        Ok(Self {
            http_port,
            grpc_port,
            health_port,
            log_level,
            forwarding_enabled,
            targets,
        })
    }
}

fn parse_port(
    get: impl Fn(&str) -> Option<String>,
    key: &str,
    default: u16,
) -> Result<u16> {
    match get(key) {
        Some(v) => v
            .parse::<u16>()
            .map_err(|_| Error::Config(format!("{key} is not a valid port: {v}"))),
        None => Ok(default),
    }
}

fn parse_targets(raw: &str, origin: &str) -> Result<Vec<ForwardingTarget>> {
    let targets: Vec<ForwardingTarget> = serde_json::from_str(raw)
        .map_err(|e| Error::Config(format!("invalid target list in {origin}: {e}")))?;
    for target in &targets {
        target.validate()?;
    }
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn source<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        move |key| map.get(key).map(|v| v.to_string())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = GatewayConfig::from_source(|_| None).unwrap();
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.grpc_port, 50051);
        assert_eq!(cfg.health_port, 8081);
        assert_eq!(cfg.log_level, "info");
        assert!(cfg.forwarding_enabled);
        assert!(cfg.targets.is_empty());
    }

    #[test]
    fn explicit_values_override_defaults() {
        let cfg = GatewayConfig::from_source(source(&[
            ("HTTP_PORT", "9090"),
            ("LOG_LEVEL", "debug"),
            ("FORWARDING_ENABLED", "false"),
        ]))
        .unwrap();
        assert_eq!(cfg.http_port, 9090);
        assert_eq!(cfg.log_level, "debug");
        assert!(!cfg.forwarding_enabled);
    }

    #[test]
    fn bad_values_fail_instead_of_falling_back() {
        assert!(GatewayConfig::from_source(source(&[("HTTP_PORT", "eighty")])).is_err());
        assert!(GatewayConfig::from_source(source(&[("LOG_LEVEL", "loud")])).is_err());
        assert!(GatewayConfig::from_source(source(&[("FORWARDING_ENABLED", "yep")])).is_err());
    }

    #[test]
    fn inline_targets_parse_and_validate() {
        let targets = r#"[{
            "id": "peer",
            "name": "Peer gateway",
            "type": "grpc",
            "endpoint": "http://peer:50051"
        }]"#;
        let cfg =
            GatewayConfig::from_source(source(&[("FORWARDING_TARGETS", targets)])).unwrap();
        assert_eq!(cfg.targets.len(), 1);
        assert_eq!(cfg.targets[0].id, "peer");
    }

    #[test]
    fn invalid_target_definitions_are_config_errors() {
        let missing_endpoint = r#"[{"id": "x", "name": "x", "type": "http", "endpoint": ""}]"#;
        let err = GatewayConfig::from_source(source(&[("FORWARDING_TARGETS", missing_endpoint)]))
            .unwrap_err();
        assert!(err.to_string().contains("endpoint"));
    }
}
