//! API request and response models

use gridmon_model::AlarmOccurrence;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

use crate::services::{ApplyFailure, ApplyReport, BulkAckReport, BulkFailure};

/// Health check endpoint response
pub const HEALTH_OK: &str = "OK";

/// Template apply request
#[derive(Debug, Deserialize)]
pub struct ApplyTemplateRequest {
    /// Telemetry points to bind the template to
    pub target_ids: Vec<u32>,
    /// Optional per-target config overrides
    #[serde(default)]
    pub overrides_by_target: HashMap<u32, Map<String, Value>>,
    /// Optional rule group name; defaults to "<template-name>_<date>"
    pub group_name: Option<String>,
}

/// Template apply response with partial-success counts
#[derive(Debug, Serialize)]
pub struct ApplyTemplateResponse {
    pub rule_group_id: String,
    pub created_count: usize,
    pub failed_count: usize,
    pub created: Vec<gridmon_model::AlarmRule>,
    pub failed: Vec<ApplyFailure>,
}

impl From<ApplyReport> for ApplyTemplateResponse {
    fn from(report: ApplyReport) -> Self {
        Self {
            rule_group_id: report.rule_group_id,
            created_count: report.created.len(),
            failed_count: report.failed.len(),
            created: report.created,
            failed: report.failed,
        }
    }
}

/// Rule listing query
#[derive(Debug, Deserialize)]
pub struct RuleQuery {
    /// Only rules in the given group
    pub group: Option<String>,
}

/// Rule update request
#[derive(Debug, Deserialize)]
pub struct UpdateRuleRequest {
    pub enabled: bool,
}

/// Single acknowledge/clear request body
#[derive(Debug, Default, Deserialize)]
pub struct TransitionRequest {
    /// Operator performing the transition; defaults to "system"
    pub actor: Option<String>,
    pub comment: Option<String>,
}

/// Bulk acknowledge request
#[derive(Debug, Deserialize)]
pub struct BulkAckRequest {
    pub ids: Vec<Uuid>,
    pub actor: Option<String>,
    pub comment: Option<String>,
}

/// Bulk acknowledge response with partial-success counts
#[derive(Debug, Serialize)]
pub struct BulkAckResponse {
    pub succeeded_count: usize,
    pub failed_count: usize,
    pub succeeded: Vec<Uuid>,
    pub failed: Vec<BulkFailure>,
}

impl From<BulkAckReport> for BulkAckResponse {
    fn from(report: BulkAckReport) -> Self {
        Self {
            succeeded_count: report.succeeded.len(),
            failed_count: report.failed.len(),
            succeeded: report.succeeded,
            failed: report.failed,
        }
    }
}

/// Occurrence list response
#[derive(Debug, Serialize)]
pub struct OccurrenceListResponse {
    pub occurrences: Vec<AlarmOccurrence>,
    pub total: usize,
}

/// Status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub service: String,
    pub status: String,
    pub known_occurrences: usize,
    pub open_occurrences: usize,
}
