//! Event contract, validation, and dotted-path field extraction
//!
//! The event is the unit of ingestion, forwarding, and broadcast. Events
//! are immutable once validated; the ingestion core wraps them in `Arc` and
//! every downstream consumer shares the same copy.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// The canonical in-memory event record.
///
/// `data` is an opaque JSON document; the gateway never interprets it
/// beyond the strict parse in [`Event::validate`] and top-level field
/// extraction for rule matching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// Opaque identifier chosen by the producer
    pub event_id: String,

    /// Category string, the primary input to rule matching
    pub event_type: String,

    /// Originating system
    pub source: String,

    /// Seconds since epoch; `0` is replaced with the gateway wall clock
    /// at ingest
    #[serde(default)]
    pub timestamp: i64,

    /// Event body; must parse as a JSON value
    pub data: String,

    /// Free-form string metadata
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Event {
    /// Validate the event against the ingestion contract.
    ///
    /// Pure check, no side effects: all string fields non-empty and `data`
    /// syntactically valid JSON. Every ingestion path calls this before
    /// any further processing.
    pub fn validate(&self) -> Result<()> {
        if self.event_id.is_empty() {
            return Err(Error::invalid_argument("event_id is empty"));
        }
        if self.event_type.is_empty() {
            return Err(Error::invalid_argument("event_type is empty"));
        }
        if self.source.is_empty() {
            return Err(Error::invalid_argument("source is empty"));
        }
        if self.data.is_empty() {
            return Err(Error::invalid_argument("data is empty"));
        }
        if serde_json::from_str::<Value>(&self.data).is_err() {
            return Err(Error::invalid_argument("data is not valid JSON"));
        }
        Ok(())
    }

    /// Resolve a dotted path against the event for rule evaluation.
    ///
    /// Bare names address the envelope (`event_id`, `event_type`,
    /// `source`, `timestamp`). A `data.` prefix parses the body and
    /// returns the named top-level field; a `metadata.` prefix looks up
    /// the metadata map. Anything else is absent, which makes the owning
    /// condition false before negation.
    pub fn field(&self, path: &str) -> Option<Value> {
        match path {
            "event_id" => Some(Value::String(self.event_id.clone())),
            "event_type" => Some(Value::String(self.event_type.clone())),
            "source" => Some(Value::String(self.source.clone())),
            "timestamp" => Some(Value::from(self.timestamp)),
            _ => {
                if let Some(key) = path.strip_prefix("data.") {
                    let body: Value = serde_json::from_str(&self.data).ok()?;
                    body.get(key).cloned()
                } else if let Some(key) = path.strip_prefix("metadata.") {
                    self.metadata.get(key).map(|v| Value::String(v.clone()))
                } else {
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Event {
        Event {
            event_id: "e1".into(),
            event_type: "user.created".into(),
            source: "auth".into(),
            timestamp: 1_700_000_000,
            data: r#"{"user_id":"123","count":7}"#.into(),
            metadata: HashMap::from([("region".to_string(), "eu-west".to_string())]),
        }
    }

    #[test]
    fn valid_event_passes() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn empty_fields_are_rejected_with_field_name() {
        for (field, mutate) in [
            ("event_id", Box::new(|e: &mut Event| e.event_id.clear()) as Box<dyn Fn(&mut Event)>),
            ("event_type", Box::new(|e: &mut Event| e.event_type.clear())),
            ("source", Box::new(|e: &mut Event| e.source.clear())),
            ("data", Box::new(|e: &mut Event| e.data.clear())),
        ] {
            let mut event = sample();
            mutate(&mut event);
            let err = event.validate().unwrap_err();
            assert!(
                err.to_string().contains(field),
                "expected error naming {field}, got: {err}"
            );
        }
    }

    #[test]
    fn malformed_data_is_rejected() {
        let mut event = sample();
        event.data = "{oops".into();
        let err = event.validate().unwrap_err();
        assert!(err.to_string().contains("JSON"));
    }

    #[test]
    fn validation_is_deterministic() {
        let event = sample();
        let a = event.validate().is_ok();
        let b = event.validate().is_ok();
        assert_eq!(a, b);
    }

    #[test]
    fn envelope_fields_resolve() {
        let event = sample();
        assert_eq!(event.field("event_id"), Some(Value::String("e1".into())));
        assert_eq!(
            event.field("event_type"),
            Some(Value::String("user.created".into()))
        );
        assert_eq!(event.field("timestamp"), Some(Value::from(1_700_000_000_i64)));
    }

    #[test]
    fn data_prefix_resolves_top_level_fields() {
        let event = sample();
        assert_eq!(event.field("data.user_id"), Some(Value::String("123".into())));
        assert_eq!(event.field("data.count"), Some(Value::from(7)));
        assert_eq!(event.field("data.missing"), None);
    }

    #[test]
    fn metadata_prefix_resolves() {
        let event = sample();
        assert_eq!(
            event.field("metadata.region"),
            Some(Value::String("eu-west".into()))
        );
        assert_eq!(event.field("metadata.zone"), None);
    }

    #[test]
    fn unknown_paths_are_absent() {
        let event = sample();
        assert_eq!(event.field("unknown"), None);
        assert_eq!(event.field("data"), None);
    }
}
