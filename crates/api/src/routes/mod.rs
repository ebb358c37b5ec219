//! API route definitions

pub mod leads;
pub mod webhooks;

use axum::extract::State;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::state::AppState;

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // ===== Liveness =====
        .route("/", get(root))
        .route("/health", get(health))
        // ===== Webhook ingestion =====
        .route(
            "/webhook/{platform}/{store_id}",
            post(webhooks::receive_webhook),
        )
        // ===== Lead management =====
        .route("/api/leads", get(leads::list_leads))
        .route(
            "/api/leads/{lead_id}/status",
            patch(leads::update_lead_status),
        )
        .with_state(state)
}

/// Plain-text liveness line, kept from the first deployment.
async fn root() -> &'static str {
    "cartrescue API is running"
}

/// Readiness: confirms the database still answers.
async fn health(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    sqlx::query("SELECT 1").execute(&state.pool).await?;
    Ok(Json(json!({ "status": "ok" })))
}
