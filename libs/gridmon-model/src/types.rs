use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Alarm severity
///
/// Ordered from least to most severe so that `Ord` comparisons read naturally
/// (`Severity::Critical > Severity::High`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Low severity
    Low,
    /// Medium severity
    Medium,
    /// High severity
    High,
    /// Critical severity
    Critical,
}

/// Occurrence lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmState {
    /// Condition is breached and nobody has responded
    Active,
    /// A human has seen the alarm; the condition may still be breached
    Acknowledged,
    /// Terminal state; the occurrence is retained for history only
    Cleared,
}

impl AlarmState {
    /// Legal transition table: active→acknowledged, active→cleared,
    /// acknowledged→cleared. Everything else is rejected, including any
    /// transition out of `Cleared`.
    pub fn can_transition_to(self, target: AlarmState) -> bool {
        matches!(
            (self, target),
            (AlarmState::Active, AlarmState::Acknowledged)
                | (AlarmState::Active, AlarmState::Cleared)
                | (AlarmState::Acknowledged, AlarmState::Cleared)
        )
    }

    /// Active and acknowledged occurrences are still "open" for dedup purposes
    pub fn is_open(self) -> bool {
        matches!(self, AlarmState::Active | AlarmState::Acknowledged)
    }
}

/// Condition type of a template or rule
///
/// A closed enum: an unrecognized wire value fails deserialization at the
/// boundary instead of reaching the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionType {
    /// Single limit with optional deadband
    Threshold,
    /// Min/max pair or four-limit band
    Range,
    /// Boolean trigger state
    Digital,
    /// Trigger state held for a duration
    Pattern,
    /// Custom expression evaluated by the external script engine
    Script,
}

/// Data type of a telemetry point value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointDataType {
    Float,
    Int,
    Bool,
    String,
}

/// A telemetry point that alarm rules can be bound to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPoint {
    /// Point ID
    pub id: u32,
    /// Point name
    pub name: String,
    /// Value data type
    pub data_type: PointDataType,
}

/// Reusable, parametrized alarm condition definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmTemplate {
    /// Template ID
    pub id: u32,
    /// Template name
    pub name: String,
    /// Condition type the template parametrizes
    pub condition_type: ConditionType,
    /// Default condition configuration, shape depends on `condition_type`
    pub default_config: Map<String, Value>,
    /// Severity assigned to rules created from this template
    pub severity: Severity,
    /// Message template (placeholders resolved at trigger time)
    pub message_template: String,
    /// Point data types this template can be applied to
    pub applicable_data_types: Vec<PointDataType>,
    /// Number of successful apply calls; owned by the backing store
    #[serde(default)]
    pub usage_count: u64,
    /// Inactive templates cannot be applied
    pub is_active: bool,
    /// System templates cannot be edited or deleted
    #[serde(default)]
    pub is_system_template: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Update time
    pub updated_at: DateTime<Utc>,
}

impl AlarmTemplate {
    /// Check whether the template accepts a point of the given data type
    pub fn accepts_data_type(&self, data_type: PointDataType) -> bool {
        self.applicable_data_types.contains(&data_type)
    }
}

/// A template bound to one telemetry target with resolved configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmRule {
    /// Rule ID
    pub id: Uuid,
    /// Template the rule was created from, if any
    pub template_id: Option<u32>,
    /// Telemetry point the rule watches
    pub target_id: u32,
    /// Merged, validated condition configuration
    pub config: Map<String, Value>,
    /// Condition type, copied from the template at creation time
    pub condition_type: ConditionType,
    /// Rule severity
    pub severity: Severity,
    /// Message template carried from the source template
    pub message_template: String,
    /// Disabled rules are not evaluated
    pub enabled: bool,
    /// Shared by all rules created in one apply call
    pub rule_group_id: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// One lifecycle instance of a rule firing, tracked from trigger to clear
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmOccurrence {
    /// Occurrence ID
    pub id: Uuid,
    /// Rule that fired
    pub rule_id: Uuid,
    /// Severity at trigger time; rule edits do not retroactively change it
    pub severity: Severity,
    /// Rendered alarm message
    pub message: String,
    /// Value that breached the condition
    pub triggered_value: Value,
    /// First trigger time
    pub triggered_at: DateTime<Utc>,
    /// Lifecycle state
    pub state: AlarmState,
    /// Acknowledgment time
    pub acknowledged_at: Option<DateTime<Utc>>,
    /// Acknowledging operator
    pub acknowledged_by: Option<String>,
    /// Acknowledgment comment
    pub acknowledgment_comment: Option<String>,
    /// Clear time
    pub cleared_at: Option<DateTime<Utc>>,
    /// Clearing operator
    pub cleared_by: Option<String>,
    /// Clear comment
    pub clear_comment: Option<String>,
    /// Trigger count while the occurrence has been open, always >= 1
    pub occurrence_count: u32,
    /// Escalation level, starts at 0
    #[serde(default)]
    pub escalation_level: u32,
    /// Whether a notification went out for this occurrence
    #[serde(default)]
    pub notification_sent: bool,
    /// How many notifications went out
    #[serde(default)]
    pub notification_count: u32,
}

impl AlarmOccurrence {
    /// Create a fresh occurrence for the first trigger of a rule
    pub fn new(
        rule_id: Uuid,
        severity: Severity,
        message: String,
        triggered_value: Value,
        triggered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            rule_id,
            severity,
            message,
            triggered_value,
            triggered_at,
            state: AlarmState::Active,
            acknowledged_at: None,
            acknowledged_by: None,
            acknowledgment_comment: None,
            cleared_at: None,
            cleared_by: None,
            clear_comment: None,
            occurrence_count: 1,
            escalation_level: 0,
            notification_sent: false,
            notification_count: 0,
        }
    }

    /// Check if the occurrence still counts toward the active view
    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// Fold a repeat trigger into this occurrence (dedup-while-open)
    pub fn record_retrigger(&mut self, value: Value, at: DateTime<Utc>) {
        self.occurrence_count += 1;
        self.triggered_value = value;
        self.triggered_at = at;
    }

    /// Apply a state transition with its audit metadata.
    ///
    /// Returns `false` and leaves the occurrence untouched when the requested
    /// transition is not in the legal table.
    pub fn apply_transition(&mut self, target: AlarmState, meta: &TransitionMeta) -> bool {
        if !self.state.can_transition_to(target) {
            return false;
        }

        let at = meta.timestamp.unwrap_or_else(Utc::now);
        match target {
            AlarmState::Acknowledged => {
                self.acknowledged_at = Some(at);
                self.acknowledged_by = meta.actor.clone();
                self.acknowledgment_comment = meta.comment.clone();
            }
            AlarmState::Cleared => {
                self.cleared_at = Some(at);
                self.cleared_by = meta.actor.clone();
                self.clear_comment = meta.comment.clone();
            }
            AlarmState::Active => {}
        }
        self.state = target;
        true
    }
}

/// Metadata attached to a state transition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransitionMeta {
    /// Operator performing the transition
    pub actor: Option<String>,
    /// Free-form comment
    pub comment: Option<String>,
    /// Transition time
    pub timestamp: Option<DateTime<Utc>>,
}

/// Alarm statistics derived from the current occurrence set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlarmStatistics {
    /// Total occurrence count, cleared included
    pub total: usize,
    /// Open occurrences (active + acknowledged)
    pub open: usize,
    /// Counts by state
    pub by_state: AlarmStateStats,
    /// Counts by severity over open occurrences
    pub by_severity: AlarmSeverityStats,
    /// Open occurrences triggered within the recency window
    pub recent: usize,
}

/// Occurrence counts by state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlarmStateStats {
    pub active: usize,
    pub acknowledged: usize,
    pub cleared: usize,
}

/// Open occurrence counts by severity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlarmSeverityStats {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_transition_table() {
        assert!(AlarmState::Active.can_transition_to(AlarmState::Acknowledged));
        assert!(AlarmState::Active.can_transition_to(AlarmState::Cleared));
        assert!(AlarmState::Acknowledged.can_transition_to(AlarmState::Cleared));

        assert!(!AlarmState::Acknowledged.can_transition_to(AlarmState::Active));
        assert!(!AlarmState::Cleared.can_transition_to(AlarmState::Active));
        assert!(!AlarmState::Cleared.can_transition_to(AlarmState::Acknowledged));
        assert!(!AlarmState::Active.can_transition_to(AlarmState::Active));
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_occurrence_creation() {
        let occ = AlarmOccurrence::new(
            Uuid::new_v4(),
            Severity::High,
            "Voltage high".to_string(),
            json!(242.5),
            Utc::now(),
        );

        assert_eq!(occ.state, AlarmState::Active);
        assert_eq!(occ.occurrence_count, 1);
        assert_eq!(occ.escalation_level, 0);
        assert!(occ.is_open());
        assert!(occ.acknowledged_at.is_none());
    }

    #[test]
    fn test_occurrence_retrigger() {
        let mut occ = AlarmOccurrence::new(
            Uuid::new_v4(),
            Severity::Medium,
            "Temperature high".to_string(),
            json!(81.0),
            Utc::now(),
        );

        let later = Utc::now();
        occ.record_retrigger(json!(83.5), later);

        assert_eq!(occ.occurrence_count, 2);
        assert_eq!(occ.triggered_value, json!(83.5));
        assert_eq!(occ.triggered_at, later);
    }

    #[test]
    fn test_apply_transition() {
        let mut occ = AlarmOccurrence::new(
            Uuid::new_v4(),
            Severity::Critical,
            "Breaker open".to_string(),
            json!(true),
            Utc::now(),
        );

        let meta = TransitionMeta {
            actor: Some("operator1".to_string()),
            comment: Some("investigating".to_string()),
            timestamp: None,
        };
        assert!(occ.apply_transition(AlarmState::Acknowledged, &meta));
        assert_eq!(occ.state, AlarmState::Acknowledged);
        assert_eq!(occ.acknowledged_by.as_deref(), Some("operator1"));
        assert!(occ.acknowledged_at.is_some());

        // acknowledged -> active is illegal and must not mutate
        let before = occ.clone();
        assert!(!occ.apply_transition(AlarmState::Active, &meta));
        assert_eq!(occ, before);

        assert!(occ.apply_transition(AlarmState::Cleared, &TransitionMeta::default()));
        assert_eq!(occ.state, AlarmState::Cleared);

        // cleared is terminal
        let before = occ.clone();
        assert!(!occ.apply_transition(AlarmState::Acknowledged, &meta));
        assert_eq!(occ, before);
    }

    #[test]
    fn test_serde_roundtrip_state() {
        let s = serde_json::to_string(&AlarmState::Acknowledged).unwrap();
        assert_eq!(s, "\"acknowledged\"");
        let back: AlarmState = serde_json::from_str(&s).unwrap();
        assert_eq!(back, AlarmState::Acknowledged);
    }

    #[test]
    fn test_unknown_condition_type_rejected() {
        let result: Result<ConditionType, _> = serde_json::from_str("\"wavelet\"");
        assert!(result.is_err());
    }
}
