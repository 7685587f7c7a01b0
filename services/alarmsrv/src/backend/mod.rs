//! Backing store abstraction
//!
//! The alarm service persists configuration and arbitrates occurrence state
//! through this trait. The client-side transition table is only a fast path;
//! the backing store's answer is authoritative under concurrent operators.

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gridmon_model::{
    AlarmOccurrence, AlarmRule, AlarmTemplate, ConditionType, PointDataType, Severity,
    TelemetryPoint, TransitionMeta,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::Result;

pub use self::memory::MemoryBackend;
pub use self::redis::RedisBackend;

/// Template listing filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateFilter {
    /// Only templates with the given active flag
    pub is_active: Option<bool>,
    /// Only templates of the given condition type
    pub condition_type: Option<ConditionType>,
}

impl TemplateFilter {
    pub fn matches(&self, template: &AlarmTemplate) -> bool {
        self.is_active.is_none_or(|v| template.is_active == v)
            && self
                .condition_type
                .is_none_or(|v| template.condition_type == v)
    }
}

/// New template payload; identity and server-owned fields are assigned by the
/// backing store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateDraft {
    pub name: String,
    pub condition_type: ConditionType,
    #[serde(default)]
    pub default_config: Map<String, Value>,
    pub severity: Severity,
    pub message_template: String,
    pub applicable_data_types: Vec<PointDataType>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// Trigger event emitted by the external condition evaluator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerEvent {
    /// Rule that fired
    pub rule_id: Uuid,
    /// Value that breached the condition
    pub value: Value,
    /// Trigger time
    pub triggered_at: DateTime<Utc>,
    /// Severity denormalized from the rule
    pub severity: Severity,
    /// Rendered alarm message
    pub message: String,
}

/// Backing store interface for alarm configuration and occurrence state
#[async_trait]
pub trait AlarmBackend: Send + Sync {
    // --- Templates ---

    async fn list_templates(&self, filter: TemplateFilter) -> Result<Vec<AlarmTemplate>>;

    async fn get_template(&self, id: u32) -> Result<Option<AlarmTemplate>>;

    async fn create_template(&self, draft: TemplateDraft) -> Result<AlarmTemplate>;

    /// Rejects system templates with `AlarmError::SystemTemplate`
    async fn update_template(&self, template: AlarmTemplate) -> Result<AlarmTemplate>;

    /// Rejects system templates with `AlarmError::SystemTemplate`
    async fn delete_template(&self, id: u32) -> Result<()>;

    /// Server-owned monotonic counter: one atomic +1 per successful apply
    /// call, never derived client-side
    async fn increment_template_usage(&self, id: u32) -> Result<u64>;

    // --- Telemetry points ---

    async fn get_point(&self, id: u32) -> Result<Option<TelemetryPoint>>;

    // --- Rules ---

    async fn insert_rule(&self, rule: AlarmRule) -> Result<AlarmRule>;

    async fn list_rules(&self, group: Option<String>) -> Result<Vec<AlarmRule>>;

    async fn set_rule_enabled(&self, id: Uuid, enabled: bool) -> Result<AlarmRule>;

    async fn delete_rule(&self, id: Uuid) -> Result<()>;

    // --- Occurrences ---

    async fn list_active_occurrences(&self) -> Result<Vec<AlarmOccurrence>>;

    async fn get_occurrence(&self, id: Uuid) -> Result<Option<AlarmOccurrence>>;

    /// Entry point for the external evaluator: creates an occurrence on the
    /// first trigger of a rule, or increments `occurrence_count` on the open
    /// occurrence (dedup-while-open)
    async fn record_trigger(&self, event: TriggerEvent) -> Result<AlarmOccurrence>;

    /// Arbitrated transition to acknowledged; rejects illegal transitions
    /// with `AlarmError::InvalidStateTransition` and leaves state untouched
    async fn acknowledge_occurrence(
        &self,
        id: Uuid,
        meta: TransitionMeta,
    ) -> Result<AlarmOccurrence>;

    /// Arbitrated transition to cleared (terminal); same rejection contract
    async fn clear_occurrence(&self, id: Uuid, meta: TransitionMeta) -> Result<AlarmOccurrence>;

    /// Raise the escalation level of an open occurrence by one
    async fn escalate_occurrence(&self, id: Uuid) -> Result<AlarmOccurrence>;
}
