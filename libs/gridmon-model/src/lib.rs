//! Gridmon Alarm Domain Model
//!
//! Shared domain types and pure logic for the alarm subsystem: templates,
//! rules, occurrences, condition schema validation, and template config
//! merging. No IO and no async; services layer persistence and transport on
//! top of this crate.

pub mod condition;
pub mod error;
pub mod merge;
pub mod types;

pub use condition::{validate_condition_config, SchemaCheck};
pub use error::{ModelError, Result};
pub use merge::merge_rule_config;
pub use types::{
    AlarmOccurrence, AlarmRule, AlarmSeverityStats, AlarmState, AlarmStateStats, AlarmStatistics,
    AlarmTemplate, ConditionType, PointDataType, Severity, TelemetryPoint, TransitionMeta,
};
