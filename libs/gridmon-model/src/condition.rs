//! Condition Schema Validation
//!
//! Pure validation of merged rule configurations against the shape required
//! by each condition type. No IO dependencies.

use serde_json::{Map, Value};

use crate::types::ConditionType;

/// Outcome of a condition config validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaCheck {
    /// Whether the config satisfies the schema for its condition type
    pub ok: bool,
    /// Required fields that are absent or carry the wrong JSON type
    pub missing_fields: Vec<String>,
}

impl SchemaCheck {
    fn passed() -> Self {
        Self {
            ok: true,
            missing_fields: Vec::new(),
        }
    }

    fn failed(missing_fields: Vec<String>) -> Self {
        Self {
            ok: false,
            missing_fields,
        }
    }
}

/// Validate a merged condition configuration against its condition type.
///
/// Required fields per type:
/// - `threshold`: `threshold` (number); `deadband` is optional
/// - `range`: both of `min_value`/`max_value`, or all of `high_high_limit`,
///   `high_limit`, `low_limit`, `low_low_limit`
/// - `digital`: `trigger_state`
/// - `pattern`: `trigger_state` and `hold_time` (non-negative number)
/// - `script`: `expression` (non-empty string; syntax is checked by the
///   external script sandbox, presence only here)
///
/// A field present with the wrong JSON type counts as missing. Never panics.
pub fn validate_condition_config(
    condition_type: ConditionType,
    config: &Map<String, Value>,
) -> SchemaCheck {
    match condition_type {
        ConditionType::Threshold => {
            if has_number(config, "threshold") {
                SchemaCheck::passed()
            } else {
                SchemaCheck::failed(vec!["threshold".to_string()])
            }
        }
        ConditionType::Range => validate_range(config),
        ConditionType::Digital => {
            if config.contains_key("trigger_state") {
                SchemaCheck::passed()
            } else {
                SchemaCheck::failed(vec!["trigger_state".to_string()])
            }
        }
        ConditionType::Pattern => {
            let mut missing = Vec::new();
            if !config.contains_key("trigger_state") {
                missing.push("trigger_state".to_string());
            }
            if !has_non_negative_number(config, "hold_time") {
                missing.push("hold_time".to_string());
            }
            if missing.is_empty() {
                SchemaCheck::passed()
            } else {
                SchemaCheck::failed(missing)
            }
        }
        ConditionType::Script => {
            let non_empty = config
                .get("expression")
                .and_then(Value::as_str)
                .is_some_and(|s| !s.trim().is_empty());
            if non_empty {
                SchemaCheck::passed()
            } else {
                SchemaCheck::failed(vec!["expression".to_string()])
            }
        }
    }
}

const RANGE_PAIR: [&str; 2] = ["min_value", "max_value"];
const RANGE_LIMITS: [&str; 4] = [
    "high_high_limit",
    "high_limit",
    "low_limit",
    "low_low_limit",
];

/// A range config needs one complete group: the min/max pair or the four-limit
/// band. Reporting names the gaps of whichever group the caller started to
/// fill in, so a partial override points at its own group instead of the
/// other one.
fn validate_range(config: &Map<String, Value>) -> SchemaCheck {
    let pair_missing: Vec<String> = RANGE_PAIR
        .iter()
        .filter(|&&k| !has_number(config, k))
        .map(|k| k.to_string())
        .collect();
    let limits_missing: Vec<String> = RANGE_LIMITS
        .iter()
        .filter(|&&k| !has_number(config, k))
        .map(|k| k.to_string())
        .collect();

    if pair_missing.is_empty() || limits_missing.is_empty() {
        return SchemaCheck::passed();
    }

    let pair_started = pair_missing.len() < RANGE_PAIR.len();
    let limits_started = limits_missing.len() < RANGE_LIMITS.len();

    if limits_started && !pair_started {
        SchemaCheck::failed(limits_missing)
    } else {
        SchemaCheck::failed(pair_missing)
    }
}

fn has_number(config: &Map<String, Value>, key: &str) -> bool {
    config.get(key).is_some_and(Value::is_number)
}

fn has_non_negative_number(config: &Map<String, Value>, key: &str) -> bool {
    config
        .get(key)
        .and_then(Value::as_f64)
        .is_some_and(|v| v >= 0.0)
}
