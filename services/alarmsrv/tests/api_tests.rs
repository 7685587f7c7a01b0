//! API integration tests

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use tower::util::ServiceExt;
use uuid::Uuid;

mod common;
use common::{create_test_router, seed_float_point, sync_store, trigger_rule};

/// Helper to make JSON requests
async fn json_request(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let request = if let Some(json) = body {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&json).unwrap()))
            .unwrap()
    } else {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    };

    let response = app.clone().oneshot(request).await.unwrap();

    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    let body: Value = if body_bytes.is_empty() {
        json!({})
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(json!({}))
    };

    (status, body)
}

fn template_request(name: &str) -> Value {
    json!({
        "name": name,
        "condition_type": "threshold",
        "default_config": {"threshold": 80.0},
        "severity": "high",
        "message_template": "{point} exceeded {threshold}",
        "applicable_data_types": ["float"]
    })
}

#[tokio::test]
async fn test_health_check() {
    let (app, _, _) = create_test_router();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_status_endpoint() {
    let (app, _, _) = create_test_router();

    let (status, body) = json_request(&app, "GET", "/api/v1/status", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "alarmsrv");
    assert_eq!(body["status"], "running");
    assert_eq!(body["known_occurrences"], 0);
}

#[tokio::test]
async fn test_template_crud() {
    let (app, _, _) = create_test_router();

    let (status, created) = json_request(
        &app,
        "POST",
        "/api/v1/templates",
        Some(template_request("High Voltage")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["name"], "High Voltage");
    assert_eq!(created["usage_count"], 0);
    assert_eq!(created["is_system_template"], false);
    let id = created["id"].as_u64().unwrap();

    let (status, listed) = json_request(&app, "GET", "/api/v1/templates", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    // update the severity
    let mut updated = created.clone();
    updated["severity"] = json!("critical");
    let (status, body) = json_request(
        &app,
        "PUT",
        &format!("/api/v1/templates/{}", id),
        Some(updated),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["severity"], "critical");

    let (status, _) =
        json_request(&app, "DELETE", &format!("/api/v1/templates/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, listed) = json_request(&app, "GET", "/api/v1/templates", None).await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_condition_type_is_rejected() {
    let (app, _, _) = create_test_router();

    let mut request = template_request("Bad Type");
    request["condition_type"] = json!("wavelet");

    let (status, _) = json_request(&app, "POST", "/api/v1/templates", Some(request)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_apply_endpoint_reports_counts() {
    let (app, _, backend) = create_test_router();
    seed_float_point(&backend, 101).await;
    seed_float_point(&backend, 102).await;

    let (_, template) = json_request(
        &app,
        "POST",
        "/api/v1/templates",
        Some(template_request("High Temp")),
    )
    .await;
    let id = template["id"].as_u64().unwrap();

    let apply = json!({
        "target_ids": [101, 102, 999],
        "overrides_by_target": {"102": {"threshold": 90.0}}
    });
    let (status, body) = json_request(
        &app,
        "POST",
        &format!("/api/v1/templates/{}/apply", id),
        Some(apply),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["created_count"], 2);
    assert_eq!(body["failed_count"], 1);
    assert_eq!(body["failed"][0]["target_id"], 999);
    assert_eq!(body["failed"][0]["reason"], "unknown_target");

    let group = body["rule_group_id"].as_str().unwrap();
    let (status, rules) =
        json_request(&app, "GET", &format!("/api/v1/rules?group={}", group), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rules.as_array().unwrap().len(), 2);

    // template usage incremented once for the whole call
    let (_, listed) = json_request(&app, "GET", "/api/v1/templates", None).await;
    assert_eq!(listed[0]["usage_count"], 1);
}

#[tokio::test]
async fn test_rule_enable_toggle_and_delete() {
    let (app, _, backend) = create_test_router();
    seed_float_point(&backend, 101).await;

    let (_, template) = json_request(
        &app,
        "POST",
        "/api/v1/templates",
        Some(template_request("High Temp")),
    )
    .await;
    let apply = json!({"target_ids": [101]});
    let (_, report) = json_request(
        &app,
        "POST",
        &format!("/api/v1/templates/{}/apply", template["id"]),
        Some(apply),
    )
    .await;
    let rule_id = report["created"][0]["id"].as_str().unwrap().to_string();

    let (status, rule) = json_request(
        &app,
        "PUT",
        &format!("/api/v1/rules/{}", rule_id),
        Some(json!({"enabled": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rule["enabled"], false);

    let (status, _) =
        json_request(&app, "DELETE", &format!("/api/v1/rules/{}", rule_id), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, rules) = json_request(&app, "GET", "/api/v1/rules", None).await;
    assert!(rules.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_acknowledge_and_clear_occurrence() {
    let (app, state, backend) = create_test_router();
    let occurrence_id = trigger_rule(&backend, Uuid::new_v4(), 242.0).await;
    sync_store(&state).await;

    let (status, body) = json_request(
        &app,
        "POST",
        &format!("/api/v1/occurrences/{}/ack", occurrence_id),
        Some(json!({"actor": "operator1", "comment": "seen"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "acknowledged");
    assert_eq!(body["acknowledged_by"], "operator1");
    assert_eq!(body["acknowledgment_comment"], "seen");

    let (status, body) = json_request(
        &app,
        "POST",
        &format!("/api/v1/occurrences/{}/clear", occurrence_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "cleared");

    // cleared is terminal: another ack attempt conflicts
    let (status, _) = json_request(
        &app,
        "POST",
        &format!("/api/v1/occurrences/{}/ack", occurrence_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_bulk_acknowledge_partial_success_over_api() {
    let (app, state, backend) = create_test_router();

    let a = trigger_rule(&backend, Uuid::new_v4(), 1.0).await;
    let b = trigger_rule(&backend, Uuid::new_v4(), 2.0).await;
    let c = trigger_rule(&backend, Uuid::new_v4(), 3.0).await;
    sync_store(&state).await;

    // clear one first
    json_request(
        &app,
        "POST",
        &format!("/api/v1/occurrences/{}/clear", b),
        None,
    )
    .await;

    let (status, body) = json_request(
        &app,
        "POST",
        "/api/v1/occurrences/ack",
        Some(json!({"ids": [a, b, c], "actor": "operator1"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["succeeded_count"], 2);
    assert_eq!(body["failed_count"], 1);
    assert_eq!(body["failed"][0]["id"], json!(b));
    assert_eq!(body["failed"][0]["reason"], "invalid_state_transition");
}

#[tokio::test]
async fn test_occurrence_list_and_stats() {
    let (app, state, backend) = create_test_router();

    trigger_rule(&backend, Uuid::new_v4(), 1.0).await;
    trigger_rule(&backend, Uuid::new_v4(), 2.0).await;
    sync_store(&state).await;

    let (status, body) = json_request(&app, "GET", "/api/v1/occurrences", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["occurrences"].as_array().unwrap().len(), 2);

    let (status, stats) = json_request(&app, "GET", "/api/v1/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["open"], 2);
    assert_eq!(stats["by_state"]["active"], 2);
    assert_eq!(stats["by_severity"]["high"], 2);
    assert_eq!(stats["recent"], 2);
}

#[tokio::test]
async fn test_unknown_occurrence_returns_not_found() {
    let (app, _, _) = create_test_router();

    let (status, _) = json_request(
        &app,
        "POST",
        &format!("/api/v1/occurrences/{}/ack", Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
