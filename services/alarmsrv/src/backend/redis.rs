//! Redis backing store
//!
//! Hash per entity with a JSON `data` field plus typed fields for the values
//! the platform indexes on, set indexes per state, an HINCRBY usage counter,
//! and pub/sub publication of occurrence updates on the events channel.

use async_trait::async_trait;
use chrono::Utc;
use gridmon_model::{
    AlarmOccurrence, AlarmRule, AlarmState, AlarmTemplate, TelemetryPoint, TransitionMeta,
};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::{debug, info};
use uuid::Uuid;

use crate::backend::{AlarmBackend, TemplateDraft, TemplateFilter, TriggerEvent};
use crate::config::BackendConfig;
use crate::error::{AlarmError, Result};

/// Redis-backed alarm store
pub struct RedisBackend {
    client: redis::Client,
    key_prefix: String,
    events_channel: String,
}

impl RedisBackend {
    /// Connect and verify the Redis backing store
    pub async fn new(config: &BackendConfig) -> Result<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;

        // Verify connectivity before the service starts serving
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("Connected to Redis backing store");

        Ok(Self {
            client,
            key_prefix: config.key_prefix.clone(),
            events_channel: config.events_channel.clone(),
        })
    }

    async fn conn(&self) -> Result<MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    fn template_key(&self, id: u32) -> String {
        format!("{}:templates:{}", self.key_prefix, id)
    }

    fn template_index_key(&self) -> String {
        format!("{}:templates:index", self.key_prefix)
    }

    fn point_key(&self, id: u32) -> String {
        format!("{}:points:{}", self.key_prefix, id)
    }

    fn rule_key(&self, id: Uuid) -> String {
        format!("{}:rules:{}", self.key_prefix, id)
    }

    fn rule_index_key(&self) -> String {
        format!("{}:rules:index", self.key_prefix)
    }

    fn rule_group_key(&self, group: &str) -> String {
        format!("{}:rules:group:{}", self.key_prefix, group)
    }

    fn occurrence_key(&self, id: Uuid) -> String {
        format!("{}:occurrences:{}", self.key_prefix, id)
    }

    fn state_index_key(&self, state: AlarmState) -> String {
        let name = match state {
            AlarmState::Active => "active",
            AlarmState::Acknowledged => "acknowledged",
            AlarmState::Cleared => "cleared",
        };
        format!("{}:occurrences:state:{}", self.key_prefix, name)
    }

    /// Open-occurrence pointer per rule, the dedup-while-open index
    fn open_rule_key(&self, rule_id: Uuid) -> String {
        format!("{}:occurrences:open:{}", self.key_prefix, rule_id)
    }

    async fn read_template(
        &self,
        conn: &mut MultiplexedConnection,
        id: u32,
    ) -> Result<Option<AlarmTemplate>> {
        let data: Option<String> = conn.hget(self.template_key(id), "data").await?;
        match data {
            Some(data) => {
                let mut template: AlarmTemplate = serde_json::from_str(&data)?;
                // usage counter lives in its own field so HINCRBY stays atomic
                let usage: Option<u64> = conn.hget(self.template_key(id), "usage_count").await?;
                template.usage_count = usage.unwrap_or(0);
                Ok(Some(template))
            },
            None => Ok(None),
        }
    }

    async fn write_template(
        &self,
        conn: &mut MultiplexedConnection,
        template: &AlarmTemplate,
    ) -> Result<()> {
        let key = self.template_key(template.id);
        let fields: Vec<(String, String)> = vec![
            ("id".to_string(), template.id.to_string()),
            ("name".to_string(), template.name.clone()),
            (
                "condition_type".to_string(),
                serde_json::to_string(&template.condition_type)?,
            ),
            ("is_active".to_string(), template.is_active.to_string()),
            ("data".to_string(), serde_json::to_string(template)?),
        ];
        let _: () = conn.hset_multiple(&key, &fields).await?;
        let _: () = conn.sadd(self.template_index_key(), template.id).await?;
        Ok(())
    }

    async fn read_occurrence(
        &self,
        conn: &mut MultiplexedConnection,
        id: Uuid,
    ) -> Result<Option<AlarmOccurrence>> {
        let data: Option<String> = conn.hget(self.occurrence_key(id), "data").await?;
        match data {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn write_occurrence(
        &self,
        conn: &mut MultiplexedConnection,
        occurrence: &AlarmOccurrence,
    ) -> Result<()> {
        let key = self.occurrence_key(occurrence.id);
        let fields: Vec<(String, String)> = vec![
            ("id".to_string(), occurrence.id.to_string()),
            ("rule_id".to_string(), occurrence.rule_id.to_string()),
            (
                "severity".to_string(),
                serde_json::to_string(&occurrence.severity)?,
            ),
            (
                "state".to_string(),
                serde_json::to_string(&occurrence.state)?,
            ),
            (
                "triggered_at".to_string(),
                occurrence.triggered_at.to_rfc3339(),
            ),
            ("data".to_string(), serde_json::to_string(occurrence)?),
        ];
        let _: () = conn.hset_multiple(&key, &fields).await?;
        Ok(())
    }

    /// Publish an occurrence update for push delivery to client sessions
    async fn publish_occurrence(
        &self,
        conn: &mut MultiplexedConnection,
        occurrence: &AlarmOccurrence,
    ) -> Result<()> {
        let payload = serde_json::to_string(occurrence)?;
        let _: () = conn.publish(&self.events_channel, payload).await?;
        debug!("Published occurrence {} update", occurrence.id);
        Ok(())
    }

    async fn transition(
        &self,
        id: Uuid,
        target: AlarmState,
        meta: TransitionMeta,
    ) -> Result<AlarmOccurrence> {
        let mut conn = self.conn().await?;
        let mut occurrence = self
            .read_occurrence(&mut conn, id)
            .await?
            .ok_or_else(|| AlarmError::NotFound(format!("occurrence {}", id)))?;

        let from = occurrence.state;
        if !occurrence.apply_transition(target, &meta) {
            return Err(AlarmError::InvalidStateTransition { from, to: target });
        }

        self.write_occurrence(&mut conn, &occurrence).await?;
        let _: () = conn
            .srem(self.state_index_key(from), id.to_string())
            .await?;
        let _: () = conn
            .sadd(self.state_index_key(target), id.to_string())
            .await?;
        if target == AlarmState::Cleared {
            let _: () = conn.del(self.open_rule_key(occurrence.rule_id)).await?;
        }

        self.publish_occurrence(&mut conn, &occurrence).await?;
        info!("Occurrence {} moved {:?} -> {:?}", id, from, target);
        Ok(occurrence)
    }
}

#[async_trait]
impl AlarmBackend for RedisBackend {
    async fn list_templates(&self, filter: TemplateFilter) -> Result<Vec<AlarmTemplate>> {
        let mut conn = self.conn().await?;
        let ids: Vec<u32> = conn.smembers(self.template_index_key()).await?;

        let mut templates = Vec::new();
        for id in ids {
            if let Some(template) = self.read_template(&mut conn, id).await? {
                if filter.matches(&template) {
                    templates.push(template);
                }
            }
        }
        templates.sort_by_key(|t| t.id);
        Ok(templates)
    }

    async fn get_template(&self, id: u32) -> Result<Option<AlarmTemplate>> {
        let mut conn = self.conn().await?;
        self.read_template(&mut conn, id).await
    }

    async fn create_template(&self, draft: TemplateDraft) -> Result<AlarmTemplate> {
        let mut conn = self.conn().await?;
        let id: u32 = conn
            .incr(format!("{}:templates:next_id", self.key_prefix), 1)
            .await?;

        let now = Utc::now();
        let template = AlarmTemplate {
            id,
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
        self.write_template(&mut conn, &template).await?;
        info!("Created template {} ({})", template.id, template.name);
        Ok(template)
    }

    async fn update_template(&self, template: AlarmTemplate) -> Result<AlarmTemplate> {
        let mut conn = self.conn().await?;
        let existing = self
            .read_template(&mut conn, template.id)
            .await?
            .ok_or_else(|| AlarmError::NotFound(format!("template {}", template.id)))?;
        if existing.is_system_template {
            return Err(AlarmError::SystemTemplate(template.id));
        }

        let mut updated = template;
        updated.usage_count = existing.usage_count;
        updated.is_system_template = false;
        updated.created_at = existing.created_at;
        updated.updated_at = Utc::now();
        self.write_template(&mut conn, &updated).await?;
        Ok(updated)
    }

    async fn delete_template(&self, id: u32) -> Result<()> {
        let mut conn = self.conn().await?;
        let existing = self
            .read_template(&mut conn, id)
            .await?
            .ok_or_else(|| AlarmError::NotFound(format!("template {}", id)))?;
        if existing.is_system_template {
            return Err(AlarmError::SystemTemplate(id));
        }

        let _: () = conn.del(self.template_key(id)).await?;
        let _: () = conn.srem(self.template_index_key(), id).await?;
        Ok(())
    }

    async fn increment_template_usage(&self, id: u32) -> Result<u64> {
        let mut conn = self.conn().await?;
        let count: u64 = conn.hincr(self.template_key(id), "usage_count", 1).await?;
        Ok(count)
    }

    async fn get_point(&self, id: u32) -> Result<Option<TelemetryPoint>> {
        let mut conn = self.conn().await?;
        let data: Option<String> = conn.hget(self.point_key(id), "data").await?;
        match data {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn insert_rule(&self, rule: AlarmRule) -> Result<AlarmRule> {
        let mut conn = self.conn().await?;
        let key = self.rule_key(rule.id);
        let fields: Vec<(String, String)> = vec![
            ("id".to_string(), rule.id.to_string()),
            ("target_id".to_string(), rule.target_id.to_string()),
            ("rule_group_id".to_string(), rule.rule_group_id.clone()),
            ("enabled".to_string(), rule.enabled.to_string()),
            ("data".to_string(), serde_json::to_string(&rule)?),
        ];
        let _: () = conn.hset_multiple(&key, &fields).await?;
        let _: () = conn.sadd(self.rule_index_key(), rule.id.to_string()).await?;
        let _: () = conn
            .sadd(self.rule_group_key(&rule.rule_group_id), rule.id.to_string())
            .await?;
        debug!("Stored rule {} for target {}", rule.id, rule.target_id);
        Ok(rule)
    }

    async fn list_rules(&self, group: Option<String>) -> Result<Vec<AlarmRule>> {
        let mut conn = self.conn().await?;
        let index_key = match &group {
            Some(group) => self.rule_group_key(group),
            None => self.rule_index_key(),
        };
        let ids: Vec<String> = conn.smembers(index_key).await?;

        let mut rules = Vec::new();
        for id in ids {
            let data: Option<String> = conn
                .hget(format!("{}:rules:{}", self.key_prefix, id), "data")
                .await?;
            if let Some(data) = data {
                rules.push(serde_json::from_str(&data)?);
            }
        }
        rules.sort_by_key(|r: &AlarmRule| (r.target_id, r.created_at));
        Ok(rules)
    }

    async fn set_rule_enabled(&self, id: Uuid, enabled: bool) -> Result<AlarmRule> {
        let mut conn = self.conn().await?;
        let data: Option<String> = conn.hget(self.rule_key(id), "data").await?;
        let mut rule: AlarmRule = match data {
            Some(data) => serde_json::from_str(&data)?,
            None => return Err(AlarmError::NotFound(format!("rule {}", id))),
        };

        rule.enabled = enabled;
        let fields: Vec<(String, String)> = vec![
            ("enabled".to_string(), enabled.to_string()),
            ("data".to_string(), serde_json::to_string(&rule)?),
        ];
        let _: () = conn.hset_multiple(self.rule_key(id), &fields).await?;
        Ok(rule)
    }

    async fn delete_rule(&self, id: Uuid) -> Result<()> {
        let mut conn = self.conn().await?;
        let data: Option<String> = conn.hget(self.rule_key(id), "data").await?;
        let rule: AlarmRule = match data {
            Some(data) => serde_json::from_str(&data)?,
            None => return Err(AlarmError::NotFound(format!("rule {}", id))),
        };

        let _: () = conn.del(self.rule_key(id)).await?;
        let _: () = conn.srem(self.rule_index_key(), id.to_string()).await?;
        let _: () = conn
            .srem(self.rule_group_key(&rule.rule_group_id), id.to_string())
            .await?;
        Ok(())
    }

    async fn list_active_occurrences(&self) -> Result<Vec<AlarmOccurrence>> {
        let mut conn = self.conn().await?;

        let mut ids: Vec<String> = conn
            .smembers(self.state_index_key(AlarmState::Active))
            .await?;
        let acked: Vec<String> = conn
            .smembers(self.state_index_key(AlarmState::Acknowledged))
            .await?;
        ids.extend(acked);

        let mut occurrences = Vec::new();
        for id in ids {
            let data: Option<String> = conn
                .hget(format!("{}:occurrences:{}", self.key_prefix, id), "data")
                .await?;
            if let Some(data) = data {
                occurrences.push(serde_json::from_str(&data)?);
            }
        }
        occurrences.sort_by_key(|o: &AlarmOccurrence| o.triggered_at);
        Ok(occurrences)
    }

    async fn get_occurrence(&self, id: Uuid) -> Result<Option<AlarmOccurrence>> {
        let mut conn = self.conn().await?;
        self.read_occurrence(&mut conn, id).await
    }

    async fn record_trigger(&self, event: TriggerEvent) -> Result<AlarmOccurrence> {
        let mut conn = self.conn().await?;

        // Dedup-while-open via the per-rule open pointer
        let open_id: Option<String> = conn.get(self.open_rule_key(event.rule_id)).await?;
        if let Some(open_id) = open_id {
            if let Ok(open_id) = Uuid::parse_str(&open_id) {
                if let Some(mut open) = self.read_occurrence(&mut conn, open_id).await? {
                    if open.is_open() {
                        open.record_retrigger(event.value, event.triggered_at);
                        self.write_occurrence(&mut conn, &open).await?;
                        self.publish_occurrence(&mut conn, &open).await?;
                        debug!(
                            "Re-trigger for rule {} folded into occurrence {} (count {})",
                            event.rule_id, open.id, open.occurrence_count
                        );
                        return Ok(open);
                    }
                }
            }
        }

        let occurrence = AlarmOccurrence::new(
            event.rule_id,
            event.severity,
            event.message,
            event.value,
            event.triggered_at,
        );
        self.write_occurrence(&mut conn, &occurrence).await?;
        let _: () = conn
            .sadd(
                self.state_index_key(AlarmState::Active),
                occurrence.id.to_string(),
            )
            .await?;
        let _: () = conn
            .set(
                self.open_rule_key(occurrence.rule_id),
                occurrence.id.to_string(),
            )
            .await?;
        self.publish_occurrence(&mut conn, &occurrence).await?;
        info!(
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
        let mut conn = self.conn().await?;
        let mut occurrence = self
            .read_occurrence(&mut conn, id)
            .await?
            .ok_or_else(|| AlarmError::NotFound(format!("occurrence {}", id)))?;
        if !occurrence.is_open() {
            return Err(AlarmError::InvalidStateTransition {
                from: occurrence.state,
                to: occurrence.state,
            });
        }

        occurrence.escalation_level += 1;
        self.write_occurrence(&mut conn, &occurrence).await?;
        self.publish_occurrence(&mut conn, &occurrence).await?;
        Ok(occurrence)
    }
}
