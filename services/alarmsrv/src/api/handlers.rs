//! API handlers for the alarm service

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use gridmon_model::{AlarmRule, AlarmStatistics, AlarmTemplate};
use uuid::Uuid;

use crate::api::models::*;
use crate::backend::{TemplateDraft, TemplateFilter};
use crate::error::Result;
use crate::services::reconciler::refresh_statistics;
use crate::AppState;

/// Health check endpoint
pub async fn health_check() -> &'static str {
    HEALTH_OK
}

/// Get system status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let snapshot = state.store.snapshot().await;
    let open = snapshot.iter().filter(|o| o.is_open()).count();

    Json(StatusResponse {
        service: "alarmsrv".to_string(),
        status: "running".to_string(),
        known_occurrences: snapshot.len(),
        open_occurrences: open,
    })
}

// === Templates ===

/// List templates with optional filtering
pub async fn list_templates(
    State(state): State<AppState>,
    Query(filter): Query<TemplateFilter>,
) -> Result<Json<Vec<AlarmTemplate>>> {
    let templates = state.backend.list_templates(filter).await?;
    Ok(Json(templates))
}

/// Create a new template
pub async fn create_template(
    State(state): State<AppState>,
    Json(draft): Json<TemplateDraft>,
) -> Result<Json<AlarmTemplate>> {
    let template = state.backend.create_template(draft).await?;
    Ok(Json(template))
}

/// Update a template; system templates are rejected
pub async fn update_template(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(mut template): Json<AlarmTemplate>,
) -> Result<Json<AlarmTemplate>> {
    template.id = id;
    let updated = state.backend.update_template(template).await?;
    Ok(Json(updated))
}

/// Delete a template; system templates are rejected
pub async fn delete_template(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<serde_json::Value>> {
    state.backend.delete_template(id).await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

/// Apply a template to a set of targets
pub async fn apply_template(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(request): Json<ApplyTemplateRequest>,
) -> Result<Json<ApplyTemplateResponse>> {
    let report = state
        .applier
        .apply(
            id,
            request.target_ids,
            request.overrides_by_target,
            request.group_name,
        )
        .await?;
    Ok(Json(report.into()))
}

// === Rules ===

/// List rules, optionally by group
pub async fn list_rules(
    State(state): State<AppState>,
    Query(query): Query<RuleQuery>,
) -> Result<Json<Vec<AlarmRule>>> {
    let rules = state.backend.list_rules(query.group).await?;
    Ok(Json(rules))
}

/// Enable or disable a rule
pub async fn update_rule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateRuleRequest>,
) -> Result<Json<AlarmRule>> {
    let rule = state.backend.set_rule_enabled(id, request.enabled).await?;
    Ok(Json(rule))
}

/// Delete a rule
pub async fn delete_rule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    state.backend.delete_rule(id).await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

// === Occurrences ===

/// Current occurrence snapshot, newest first
pub async fn list_occurrences(State(state): State<AppState>) -> Json<OccurrenceListResponse> {
    let snapshot = state.store.snapshot().await;
    let occurrences = snapshot.to_sorted_vec();

    Json(OccurrenceListResponse {
        total: occurrences.len(),
        occurrences,
    })
}

/// Acknowledge one occurrence
pub async fn acknowledge_occurrence(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<TransitionRequest>>,
) -> Result<Json<gridmon_model::AlarmOccurrence>> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let actor = request.actor.as_deref().unwrap_or("system");

    let occurrence = state
        .coordinator
        .acknowledge(id, actor, request.comment)
        .await?;
    state.refresh_stats().await;
    Ok(Json(occurrence))
}

/// Clear one occurrence
pub async fn clear_occurrence(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<TransitionRequest>>,
) -> Result<Json<gridmon_model::AlarmOccurrence>> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let actor = request.actor.as_deref().unwrap_or("system");

    let occurrence = state.coordinator.clear(id, actor, request.comment).await?;
    state.refresh_stats().await;
    Ok(Json(occurrence))
}

/// Acknowledge a batch of occurrences; partial success is reported as counts
pub async fn bulk_acknowledge(
    State(state): State<AppState>,
    Json(request): Json<BulkAckRequest>,
) -> Json<BulkAckResponse> {
    let actor = request.actor.as_deref().unwrap_or("system");
    let report = state
        .coordinator
        .bulk_acknowledge(request.ids, actor, request.comment)
        .await;
    state.refresh_stats().await;
    Json(report.into())
}

// === Statistics ===

/// Get alarm statistics, recomputed from the current snapshot
pub async fn get_statistics(State(state): State<AppState>) -> Json<AlarmStatistics> {
    let window = chrono::Duration::seconds(state.config.stats.recent_window_secs as i64);
    let stats = refresh_statistics(&state.store, &state.stats, window).await;
    Json(stats)
}
