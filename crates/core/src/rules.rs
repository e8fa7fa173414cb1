//! Forwarding rules and the condition evaluator
//!
//! A rule is a conjunction of conditions; a target's rules are disjunctive.
//! Evaluation never fails: a condition that cannot be resolved or coerced
//! is simply false (before negation).

use crate::event::Event;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Comparison operator of a [`RuleCondition`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionOperator {
    /// Structural equality on raw values
    Eq,
    /// Structural inequality
    Ne,
    /// Numeric greater-than
    Gt,
    /// Numeric greater-or-equal
    Gte,
    /// Numeric less-than
    Lt,
    /// Numeric less-or-equal
    Lte,
    /// Substring match, strings only
    Contains,
    /// Membership in a list value
    In,
    /// Regular-expression match; false on compilation error
    Regex,
}

/// A single condition selecting events by field value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleCondition {
    /// Dotted path resolved via [`Event::field`]
    pub field: String,

    /// Comparison operator
    pub operator: ConditionOperator,

    /// Right-hand side of the comparison
    pub value: Value,

    /// Invert the result after evaluating the operator
    #[serde(default)]
    pub negate: bool,
}

impl RuleCondition {
    /// Evaluate this condition against an event.
    pub fn matches(&self, event: &Event) -> bool {
        let outcome = match event.field(&self.field) {
            Some(actual) => apply_operator(self.operator, &actual, &self.value),
            // Absent fields fail the operator, subject to negate below.
            None => false,
        };
        outcome != self.negate
    }
}

fn apply_operator(op: ConditionOperator, actual: &Value, expected: &Value) -> bool {
    match op {
        ConditionOperator::Eq => actual == expected,
        ConditionOperator::Ne => actual != expected,
        ConditionOperator::Gt => numeric(actual, expected, |a, b| a > b),
        ConditionOperator::Gte => numeric(actual, expected, |a, b| a >= b),
        ConditionOperator::Lt => numeric(actual, expected, |a, b| a < b),
        ConditionOperator::Lte => numeric(actual, expected, |a, b| a <= b),
        ConditionOperator::Contains => match (actual.as_str(), expected.as_str()) {
            // Empty needle would match everything; treat it as no match.
            (Some(haystack), Some(needle)) => !needle.is_empty() && haystack.contains(needle),
            _ => false,
        },
        ConditionOperator::In => expected
            .as_array()
            .map(|list| list.contains(actual))
            .unwrap_or(false),
        ConditionOperator::Regex => match (actual.as_str(), expected.as_str()) {
            (Some(haystack), Some(pattern)) => regex::Regex::new(pattern)
                .map(|re| re.is_match(haystack))
                .unwrap_or(false),
            _ => false,
        },
    }
}

/// Coerce both sides to f64 and compare; either side failing to coerce
/// makes the condition false.
fn numeric(actual: &Value, expected: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (as_f64(actual), as_f64(expected)) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Metadata rewrite applied to the delivered copy of a matched event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transform {
    /// Metadata entries added (or overwritten) on delivery
    #[serde(default)]
    pub add_fields: HashMap<String, String>,

    /// Metadata keys removed on delivery
    #[serde(default)]
    pub remove_fields: Vec<String>,

    /// Metadata keys renamed on delivery (old name to new name)
    #[serde(default)]
    pub rename_fields: HashMap<String, String>,
}

impl Transform {
    /// Apply the rewrite to a copy of the event. The original stays
    /// untouched; only the delivered copy carries the transform.
    pub fn apply(&self, event: &Event) -> Event {
        let mut out = event.clone();
        for (old, new) in &self.rename_fields {
            if let Some(v) = out.metadata.remove(old) {
                out.metadata.insert(new.clone(), v);
            }
        }
        for key in &self.remove_fields {
            out.metadata.remove(key);
        }
        for (key, value) in &self.add_fields {
            out.metadata.insert(key.clone(), value.clone());
        }
        out
    }
}

/// Token-bucket rate limit attached to a rule
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimit {
    /// Sustained requests per second
    pub requests_per_second: f64,
    /// Bucket capacity
    pub burst: u32,
}

/// Conditions selecting events for a target.
///
/// Conditions are combined with AND; a rule with no conditions matches
/// every event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardingRule {
    /// Unique id within the target
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Disabled rules never match
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Evaluation order among the target's rules (lower first)
    #[serde(default)]
    pub priority: i32,

    /// ANDed conditions
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,

    /// Optional metadata rewrite for the delivered copy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,

    /// Optional per-rule rate limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimit>,
}

fn default_enabled() -> bool {
    true
}

impl ForwardingRule {
    /// A rule matches when it is enabled and every condition matches.
    pub fn matches(&self, event: &Event) -> bool {
        self.enabled && self.conditions.iter().all(|c| c.matches(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn event() -> Event {
        Event {
            event_id: "e1".into(),
            event_type: "user.created".into(),
            source: "auth".into(),
            timestamp: 100,
            data: r#"{"user_id":"123","score":4.5,"level":"gold"}"#.into(),
            metadata: HashMap::from([("env".to_string(), "prod".to_string())]),
        }
    }

    fn cond(field: &str, op: ConditionOperator, value: Value) -> RuleCondition {
        RuleCondition {
            field: field.into(),
            operator: op,
            value,
            negate: false,
        }
    }

    #[test]
    fn eq_and_ne_are_structural() {
        assert!(cond("event_type", ConditionOperator::Eq, json!("user.created")).matches(&event()));
        assert!(!cond("event_type", ConditionOperator::Eq, json!("user.deleted")).matches(&event()));
        assert!(cond("event_type", ConditionOperator::Ne, json!("user.deleted")).matches(&event()));
        assert!(cond("data.score", ConditionOperator::Eq, json!(4.5)).matches(&event()));
    }

    #[test]
    fn numeric_operators_coerce_both_sides() {
        assert!(cond("timestamp", ConditionOperator::Gt, json!(50)).matches(&event()));
        assert!(cond("timestamp", ConditionOperator::Lte, json!(100)).matches(&event()));
        assert!(cond("data.score", ConditionOperator::Gte, json!("4.5")).matches(&event()));
        // Non-numeric side fails the condition outright.
        assert!(!cond("event_type", ConditionOperator::Gt, json!(1)).matches(&event()));
        assert!(!cond("timestamp", ConditionOperator::Lt, json!("not-a-number")).matches(&event()));
    }

    #[test]
    fn contains_requires_strings_and_nonempty_needle() {
        assert!(cond("event_type", ConditionOperator::Contains, json!("user")).matches(&event()));
        assert!(cond("event_type", ConditionOperator::Contains, json!("created")).matches(&event()));
        assert!(!cond("event_type", ConditionOperator::Contains, json!("")).matches(&event()));
        assert!(!cond("timestamp", ConditionOperator::Contains, json!("1")).matches(&event()));
    }

    #[test]
    fn in_checks_list_membership() {
        assert!(cond("source", ConditionOperator::In, json!(["auth", "billing"])).matches(&event()));
        assert!(!cond("source", ConditionOperator::In, json!(["billing"])).matches(&event()));
        assert!(!cond("source", ConditionOperator::In, json!("auth")).matches(&event()));
    }

    #[test]
    fn regex_matches_and_swallows_bad_patterns() {
        assert!(cond("event_type", ConditionOperator::Regex, json!("^user\\.")).matches(&event()));
        assert!(!cond("event_type", ConditionOperator::Regex, json!("^billing\\.")).matches(&event()));
        assert!(!cond("event_type", ConditionOperator::Regex, json!("(unclosed")).matches(&event()));
    }

    #[test]
    fn negate_inverts_after_evaluation() {
        let mut c = cond("event_type", ConditionOperator::Eq, json!("user.created"));
        c.negate = true;
        assert!(!c.matches(&event()));

        // An absent field is false, so negation makes it true.
        let mut absent = cond("data.missing", ConditionOperator::Eq, json!("x"));
        assert!(!absent.matches(&event()));
        absent.negate = true;
        assert!(absent.matches(&event()));
    }

    #[test]
    fn rule_requires_every_condition() {
        let rule = ForwardingRule {
            id: "r1".into(),
            name: "prod user events".into(),
            enabled: true,
            priority: 0,
            conditions: vec![
                cond("event_type", ConditionOperator::Contains, json!("user")),
                cond("metadata.env", ConditionOperator::Eq, json!("prod")),
            ],
            transform: None,
            rate_limit: None,
        };
        assert!(rule.matches(&event()));

        let mut other = event();
        other.metadata.insert("env".into(), "staging".into());
        assert!(!rule.matches(&other));
    }

    #[test]
    fn disabled_rule_never_matches() {
        let rule = ForwardingRule {
            id: "r1".into(),
            name: "anything".into(),
            enabled: false,
            priority: 0,
            conditions: vec![],
            transform: None,
            rate_limit: None,
        };
        assert!(!rule.matches(&event()));
    }

    #[test]
    fn transform_rewrites_only_the_copy() {
        let transform = Transform {
            add_fields: HashMap::from([("stage".to_string(), "fanout".to_string())]),
            remove_fields: vec!["env".into()],
            rename_fields: HashMap::new(),
        };
        let original = event();
        let delivered = transform.apply(&original);

        assert_eq!(delivered.metadata.get("stage").map(String::as_str), Some("fanout"));
        assert!(!delivered.metadata.contains_key("env"));
        // Original untouched.
        assert_eq!(original.metadata.get("env").map(String::as_str), Some("prod"));
    }

    #[test]
    fn transform_rename_runs_before_add() {
        let transform = Transform {
            add_fields: HashMap::from([("env".to_string(), "forwarded".to_string())]),
            remove_fields: vec![],
            rename_fields: HashMap::from([("env".to_string(), "origin_env".to_string())]),
        };
        let delivered = transform.apply(&event());
        assert_eq!(delivered.metadata.get("origin_env").map(String::as_str), Some("prod"));
        assert_eq!(delivered.metadata.get("env").map(String::as_str), Some("forwarded"));
    }

    #[test]
    fn operator_names_deserialize_lowercase() {
        let parsed: RuleCondition = serde_json::from_str(
            r#"{"field":"event_type","operator":"in","value":["a","b"]}"#,
        )
        .unwrap();
        assert_eq!(parsed.operator, ConditionOperator::In);
        assert!(!parsed.negate);
    }
}
