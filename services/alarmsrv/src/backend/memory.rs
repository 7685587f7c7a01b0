//! In-memory backing store
//!
//! Deterministic substrate used by the test suite and for running the service
//! without external infrastructure. Arbitration semantics are identical to
//! the Redis backend.

use async_trait::async_trait;
use chrono::Utc;
use gridmon_model::{
    AlarmOccurrence, AlarmRule, AlarmState, AlarmTemplate, TelemetryPoint, TransitionMeta,
};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::backend::{AlarmBackend, TemplateDraft, TemplateFilter, TriggerEvent};
use crate::error::{AlarmError, Result};

#[derive(Default)]
struct MemoryState {
    templates: HashMap<u32, AlarmTemplate>,
    points: HashMap<u32, TelemetryPoint>,
    rules: HashMap<Uuid, AlarmRule>,
    occurrences: HashMap<Uuid, AlarmOccurrence>,
    next_template_id: u32,
}

/// In-memory alarm backing store
#[derive(Default)]
pub struct MemoryBackend {
    state: RwLock<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a telemetry point (configuration normally owned by the
    /// platform's point management, seeded directly here)
    pub async fn seed_point(&self, point: TelemetryPoint) {
        self.state.write().await.points.insert(point.id, point);
    }

    /// Insert a template verbatim, keeping its id and flags
    pub async fn seed_template(&self, template: AlarmTemplate) {
        let mut state = self.state.write().await;
        state.next_template_id = state.next_template_id.max(template.id);
        state.templates.insert(template.id, template);
    }

    /// Insert an occurrence verbatim, bypassing trigger dedup
    pub async fn seed_occurrence(&self, occurrence: AlarmOccurrence) {
        self.state
            .write()
            .await
            .occurrences
            .insert(occurrence.id, occurrence);
    }
}

#[async_trait]
impl AlarmBackend for MemoryBackend {
    async fn list_templates(&self, filter: TemplateFilter) -> Result<Vec<AlarmTemplate>> {
        let state = self.state.read().await;
        let mut templates: Vec<AlarmTemplate> = state
            .templates
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        templates.sort_by_key(|t| t.id);
        Ok(templates)
    }

    async fn get_template(&self, id: u32) -> Result<Option<AlarmTemplate>> {
        Ok(self.state.read().await.templates.get(&id).cloned())
    }

    async fn create_template(&self, draft: TemplateDraft) -> Result<AlarmTemplate> {
        let mut state = self.state.write().await;
        state.next_template_id += 1;
        let now = Utc::now();
        let template = AlarmTemplate {
            id: state.next_template_id,
            name: draft.name,
            condition_type: draft.condition_type,
            default_config: draft.default_config,
            severity: draft.severity,
            message_template: draft.message_template,
            applicable_data_types: draft.applicable_data_types,
            usage_count: 0,
            is_active: draft.is_active,
            is_system_template: false,
            created_at: now,
            updated_at: now,
        };
        state.templates.insert(template.id, template.clone());
        debug!("Created template {} ({})", template.id, template.name);
        Ok(template)
    }

    async fn update_template(&self, template: AlarmTemplate) -> Result<AlarmTemplate> {
        let mut state = self.state.write().await;
        let existing = state
            .templates
            .get(&template.id)
            .ok_or_else(|| AlarmError::NotFound(format!("template {}", template.id)))?;
        if existing.is_system_template {
            return Err(AlarmError::SystemTemplate(template.id));
        }

        // usage_count stays server-owned
        let mut updated = template;
        updated.usage_count = existing.usage_count;
        updated.is_system_template = false;
        updated.created_at = existing.created_at;
        updated.updated_at = Utc::now();
        state.templates.insert(updated.id, updated.clone());
        Ok(updated)
    }

    async fn delete_template(&self, id: u32) -> Result<()> {
        let mut state = self.state.write().await;
        let existing = state
            .templates
            .get(&id)
            .ok_or_else(|| AlarmError::NotFound(format!("template {}", id)))?;
        if existing.is_system_template {
            return Err(AlarmError::SystemTemplate(id));
        }
        state.templates.remove(&id);
        Ok(())
    }

    async fn increment_template_usage(&self, id: u32) -> Result<u64> {
        let mut state = self.state.write().await;
        let template = state
            .templates
            .get_mut(&id)
            .ok_or_else(|| AlarmError::NotFound(format!("template {}", id)))?;
        template.usage_count += 1;
        template.updated_at = Utc::now();
        Ok(template.usage_count)
    }

    async fn get_point(&self, id: u32) -> Result<Option<TelemetryPoint>> {
        Ok(self.state.read().await.points.get(&id).cloned())
    }

    async fn insert_rule(&self, rule: AlarmRule) -> Result<AlarmRule> {
        let mut state = self.state.write().await;
        state.rules.insert(rule.id, rule.clone());
        Ok(rule)
    }

    async fn list_rules(&self, group: Option<String>) -> Result<Vec<AlarmRule>> {
        let state = self.state.read().await;
        let mut rules: Vec<AlarmRule> = state
            .rules
            .values()
            .filter(|r| group.as_deref().is_none_or(|g| r.rule_group_id == g))
            .cloned()
            .collect();
        rules.sort_by_key(|r| (r.target_id, r.created_at));
        Ok(rules)
    }

    async fn set_rule_enabled(&self, id: Uuid, enabled: bool) -> Result<AlarmRule> {
        let mut state = self.state.write().await;
        let rule = state
            .rules
            .get_mut(&id)
            .ok_or_else(|| AlarmError::NotFound(format!("rule {}", id)))?;
        rule.enabled = enabled;
        Ok(rule.clone())
    }

    async fn delete_rule(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .rules
            .remove(&id)
            .ok_or_else(|| AlarmError::NotFound(format!("rule {}", id)))?;
        Ok(())
    }

    async fn list_active_occurrences(&self) -> Result<Vec<AlarmOccurrence>> {
        let state = self.state.read().await;
        let mut occurrences: Vec<AlarmOccurrence> = state
            .occurrences
            .values()
            .filter(|o| o.is_open())
            .cloned()
            .collect();
        occurrences.sort_by_key(|o| o.triggered_at);
        Ok(occurrences)
    }

    async fn get_occurrence(&self, id: Uuid) -> Result<Option<AlarmOccurrence>> {
        Ok(self.state.read().await.occurrences.get(&id).cloned())
    }

    async fn record_trigger(&self, event: TriggerEvent) -> Result<AlarmOccurrence> {
        let mut state = self.state.write().await;

        // Dedup-while-open: a re-trigger folds into the open occurrence
        if let Some(open) = state
            .occurrences
            .values_mut()
            .find(|o| o.rule_id == event.rule_id && o.is_open())
        {
            open.record_retrigger(event.value, event.triggered_at);
            debug!(
                "Re-trigger for rule {} folded into occurrence {} (count {})",
                event.rule_id, open.id, open.occurrence_count
            );
            return Ok(open.clone());
        }

        let occurrence = AlarmOccurrence::new(
            event.rule_id,
            event.severity,
            event.message,
            event.value,
            event.triggered_at,
        );
        state.occurrences.insert(occurrence.id, occurrence.clone());
        debug!(
            "New occurrence {} for rule {}",
            occurrence.id, occurrence.rule_id
        );
        Ok(occurrence)
    }

    async fn acknowledge_occurrence(
        &self,
        id: Uuid,
        meta: TransitionMeta,
    ) -> Result<AlarmOccurrence> {
        self.transition(id, AlarmState::Acknowledged, meta).await
    }

    async fn clear_occurrence(&self, id: Uuid, meta: TransitionMeta) -> Result<AlarmOccurrence> {
        self.transition(id, AlarmState::Cleared, meta).await
    }

    async fn escalate_occurrence(&self, id: Uuid) -> Result<AlarmOccurrence> {
        let mut state = self.state.write().await;
        let occurrence = state
            .occurrences
            .get_mut(&id)
            .ok_or_else(|| AlarmError::NotFound(format!("occurrence {}", id)))?;
        if !occurrence.is_open() {
            return Err(AlarmError::InvalidStateTransition {
                from: occurrence.state,
                to: occurrence.state,
            });
        }
        occurrence.escalation_level += 1;
        Ok(occurrence.clone())
    }
}

impl MemoryBackend {
    async fn transition(
        &self,
        id: Uuid,
        target: AlarmState,
        meta: TransitionMeta,
    ) -> Result<AlarmOccurrence> {
        let mut state = self.state.write().await;
        let occurrence = state
            .occurrences
            .get_mut(&id)
            .ok_or_else(|| AlarmError::NotFound(format!("occurrence {}", id)))?;

        let from = occurrence.state;
        if !occurrence.apply_transition(target, &meta) {
            return Err(AlarmError::InvalidStateTransition { from, to: target });
        }
        Ok(occurrence.clone())
    }
}
