//! API routes configuration

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::api::handlers::*;
use crate::AppState;

/// Create API routes
pub fn create_router(state: AppState) -> Router {
    let api_config = &state.config.api;

    Router::new()
        .route("/health", get(health_check))
        .route(&api_config.build_path("status"), get(get_status))
        .route(
            &api_config.build_path("templates"),
            get(list_templates).post(create_template),
        )
        .route(
            &api_config.build_path("templates/{id}"),
            put(update_template).delete(delete_template),
        )
        .route(
            &api_config.build_path("templates/{id}/apply"),
            post(apply_template),
        )
        .route(&api_config.build_path("rules"), get(list_rules))
        .route(
            &api_config.build_path("rules/{id}"),
            put(update_rule).delete(delete_rule),
        )
        .route(
            &api_config.build_path("occurrences"),
            get(list_occurrences),
        )
        .route(
            &api_config.build_path("occurrences/ack"),
            post(bulk_acknowledge),
        )
        .route(
            &api_config.build_path("occurrences/{id}/ack"),
            post(acknowledge_occurrence),
        )
        .route(
            &api_config.build_path("occurrences/{id}/clear"),
            post(clear_occurrence),
        )
        .route(&api_config.build_path("stats"), get(get_statistics))
        .with_state(state)
}
