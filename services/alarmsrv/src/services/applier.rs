//! Bulk template-to-rule application
//!
//! Applies one template to a set of telemetry targets: merges configuration
//! per target, validates it, and creates one rule per valid target under a
//! shared rule group id. Best-effort batch: targets succeed or fail
//! independently, and partial success is success with warnings.

use chrono::Utc;
use futures::future::join_all;
use gridmon_model::{merge_rule_config, AlarmRule, AlarmTemplate, ModelError};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::AlarmBackend;
use crate::error::{AlarmError, Result};

/// Per-target failure in an apply call
#[derive(Debug, Clone, Serialize)]
pub struct ApplyFailure {
    /// Target that failed
    pub target_id: u32,
    /// Machine-readable reason code
    pub reason: String,
    /// Missing config fields, set for `invalid_config` failures
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<String>,
}

/// Result of one apply call
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    /// Group id shared by every rule created in this call
    pub rule_group_id: String,
    /// Rules created, one per valid target
    pub created: Vec<AlarmRule>,
    /// Per-target failures; never aborts the rest of the batch
    pub failed: Vec<ApplyFailure>,
}

/// Applies templates to telemetry targets through the backing store
pub struct TemplateApplier {
    backend: Arc<dyn AlarmBackend>,
}

impl TemplateApplier {
    pub fn new(backend: Arc<dyn AlarmBackend>) -> Self {
        Self { backend }
    }

    /// Apply `template_id` to each target independently.
    ///
    /// All targets are processed concurrently; one target's failure never
    /// rolls back another's rule. An all-failed batch returns an empty
    /// `created` list, which is an empty success rather than an error. The
    /// template's usage counter is incremented exactly once per call that
    /// creates at least one rule.
    pub async fn apply(
        &self,
        template_id: u32,
        target_ids: Vec<u32>,
        overrides_by_target: HashMap<u32, Map<String, Value>>,
        group_name: Option<String>,
    ) -> Result<ApplyReport> {
        let template = self
            .backend
            .get_template(template_id)
            .await?
            .ok_or_else(|| AlarmError::NotFound(format!("template {}", template_id)))?;
        if !template.is_active {
            return Err(AlarmError::InvalidInput(format!(
                "template {} is not active",
                template_id
            )));
        }

        let rule_group_id = group_name
            .unwrap_or_else(|| format!("{}_{}", template.name, Utc::now().format("%Y%m%d")));

        let outcomes = join_all(target_ids.iter().map(|&target_id| {
            let override_config = overrides_by_target.get(&target_id);
            self.apply_to_target(&template, target_id, override_config, &rule_group_id)
        }))
        .await;

        let mut report = ApplyReport {
            rule_group_id,
            created: Vec::new(),
            failed: Vec::new(),
        };
        for outcome in outcomes {
            match outcome {
                Ok(rule) => report.created.push(rule),
                Err(failure) => report.failed.push(failure),
            }
        }

        // One apply event, not one per rule
        if !report.created.is_empty() {
            if let Err(e) = self.backend.increment_template_usage(template.id).await {
                warn!(
                    "Rules created but usage counter update failed for template {}: {}",
                    template.id, e
                );
            }
        }

        info!(
            "Applied template {} ({}): created {}, failed {}",
            template.id,
            template.name,
            report.created.len(),
            report.failed.len()
        );
        Ok(report)
    }

    async fn apply_to_target(
        &self,
        template: &AlarmTemplate,
        target_id: u32,
        override_config: Option<&Map<String, Value>>,
        rule_group_id: &str,
    ) -> std::result::Result<AlarmRule, ApplyFailure> {
        let point = match self.backend.get_point(target_id).await {
            Ok(Some(point)) => point,
            Ok(None) => {
                return Err(ApplyFailure {
                    target_id,
                    reason: "unknown_target".to_string(),
                    missing_fields: Vec::new(),
                })
            },
            Err(e) => {
                return Err(ApplyFailure {
                    target_id,
                    reason: e.reason_code().to_string(),
                    missing_fields: Vec::new(),
                })
            },
        };

        if !template.accepts_data_type(point.data_type) {
            return Err(ApplyFailure {
                target_id,
                reason: "incompatible_data_type".to_string(),
                missing_fields: Vec::new(),
            });
        }

        let config = match merge_rule_config(template, override_config) {
            Ok(config) => config,
            Err(ModelError::InvalidConditionConfig { missing_fields }) => {
                return Err(ApplyFailure {
                    target_id,
                    reason: "invalid_config".to_string(),
                    missing_fields,
                })
            },
            Err(_) => {
                return Err(ApplyFailure {
                    target_id,
                    reason: "invalid_config".to_string(),
                    missing_fields: Vec::new(),
                })
            },
        };

        let rule = AlarmRule {
            id: Uuid::new_v4(),
            template_id: Some(template.id),
            target_id,
            config,
            condition_type: template.condition_type,
            severity: template.severity,
            message_template: template.message_template.clone(),
            enabled: true,
            rule_group_id: rule_group_id.to_string(),
            created_at: Utc::now(),
        };

        self.backend
            .insert_rule(rule)
            .await
            .map_err(|e| ApplyFailure {
                target_id,
                reason: e.reason_code().to_string(),
                missing_fields: Vec::new(),
            })
    }
}
