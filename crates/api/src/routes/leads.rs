//! Lead management endpoints
//!
//! The agent-facing surface: list recovery leads newest-first and move
//! them through their lifecycle as follow-up calls happen. Authentication
//! is deliberately absent here; this API deploys behind the store
//! operator's own gateway.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cartrescue_recovery::{LeadRecord, LeadStatus};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct ListLeadsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct LeadListResponse {
    pub leads: Vec<LeadRecord>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

fn clamp_paging(query: &ListLeadsQuery) -> (i64, i64) {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    (page, limit)
}

/// GET /api/leads - newest first, paged.
pub async fn list_leads(
    State(state): State<AppState>,
    Query(query): Query<ListLeadsQuery>,
) -> ApiResult<Json<LeadListResponse>> {
    let (page, limit) = clamp_paging(&query);
    let leads = state.recovery.leads.list(page, limit).await?;
    let total = state.recovery.leads.count().await?;
    Ok(Json(LeadListResponse {
        leads,
        total,
        page,
        limit,
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateLeadStatusRequest {
    pub status: String,
}

/// PATCH /api/leads/{lead_id}/status - validated lifecycle transition.
pub async fn update_lead_status(
    State(state): State<AppState>,
    Path(lead_id): Path<Uuid>,
    Json(request): Json<UpdateLeadStatusRequest>,
) -> ApiResult<Json<LeadRecord>> {
    let status = LeadStatus::parse(&request.status)
        .ok_or_else(|| ApiError::Validation(format!("invalid status: {}", request.status)))?;

    let updated = state
        .recovery
        .leads
        .update_status(lead_id, status)
        .await?
        .ok_or(ApiError::NotFound)?;

    tracing::info!(lead_id = %lead_id, status = %status, "Lead status updated");
    Ok(Json(updated))
}
