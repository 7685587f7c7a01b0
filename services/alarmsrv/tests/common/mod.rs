//! Common test utilities and helpers

use std::sync::Arc;

use alarmsrv::{
    api::routes,
    backend::{AlarmBackend, MemoryBackend, TemplateDraft, TriggerEvent},
    AlarmConfig, AppState,
};
use chrono::Utc;
use gridmon_model::{ConditionType, PointDataType, Severity, TelemetryPoint};
use serde_json::{json, Value};
use uuid::Uuid;

/// Create a test app state over a fresh in-memory backend
pub fn create_test_state() -> (AppState, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let state = AppState::new(AlarmConfig::default(), backend.clone());
    (state, backend)
}

/// Create a test router for API testing
pub fn create_test_router() -> (axum::Router, AppState, Arc<MemoryBackend>) {
    let (state, backend) = create_test_state();
    (routes::create_router(state.clone()), state, backend)
}

/// Pull the backing store's active occurrences into the local store once
pub async fn sync_store(state: &AppState) {
    let batch = state.backend.list_active_occurrences().await.unwrap();
    state.store.merge_batch(batch).await;
    state.refresh_stats().await;
}

/// A threshold template draft with the given default config
pub fn threshold_draft(name: &str, default_config: Value) -> TemplateDraft {
    TemplateDraft {
        name: name.to_string(),
        condition_type: ConditionType::Threshold,
        default_config: default_config.as_object().unwrap().clone(),
        severity: Severity::High,
        message_template: "{point} exceeded {threshold}".to_string(),
        applicable_data_types: vec![PointDataType::Float],
        is_active: true,
    }
}

/// Register a float telemetry point
pub async fn seed_float_point(backend: &MemoryBackend, id: u32) {
    backend
        .seed_point(TelemetryPoint {
            id,
            name: format!("point_{}", id),
            data_type: PointDataType::Float,
        })
        .await;
}

/// Register a bool telemetry point
pub async fn seed_bool_point(backend: &MemoryBackend, id: u32) {
    backend
        .seed_point(TelemetryPoint {
            id,
            name: format!("point_{}", id),
            data_type: PointDataType::Bool,
        })
        .await;
}

/// Record a trigger event against the backing store
pub async fn trigger_rule(backend: &MemoryBackend, rule_id: Uuid, value: f64) -> Uuid {
    backend
        .record_trigger(TriggerEvent {
            rule_id,
            value: json!(value),
            triggered_at: Utc::now(),
            severity: Severity::High,
            message: "test trigger".to_string(),
        })
        .await
        .unwrap()
        .id
}
