//! Webhook ingestion endpoint
//!
//! `POST /webhook/{platform}/{store_id}` is the producer half of the
//! pipeline. Classification is pure; this handler owns the side effect,
//! which is strictly one of: paid-flag write, verification enqueue, or
//! nothing. Status codes tell the platform what happened: `200` handled
//! synchronously, `202` verification deferred, `4xx` fix the payload,
//! `5xx` retry later.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use cartrescue_recovery::{classify, Action, Enqueue, JobQueue};

use crate::error::ApiResult;
use crate::state::AppState;

/// Success envelope, matching the original API's `{"message": ...}` shape.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

pub async fn receive_webhook(
    State(state): State<AppState>,
    Path((platform, store_id)): Path<(String, String)>,
    Json(raw): Json<Value>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let action = classify(&state.recovery.parsers, &platform, &store_id, &raw)?;

    match action {
        Action::RecordPaid { transaction_id } => {
            state.recovery.paid_flags.mark_paid(&transaction_id).await?;
            tracing::info!(
                platform = %platform,
                store_id = %store_id,
                transaction_id = %transaction_id,
                "Payment approval recorded"
            );
            Ok((
                StatusCode::OK,
                Json(MessageResponse {
                    message: "payment recorded",
                }),
            ))
        }
        Action::ScheduleVerification { job } => {
            let transaction_id = job.transaction_id.clone();
            match state.recovery.queue.enqueue(job).await? {
                Enqueue::Scheduled => {
                    tracing::info!(
                        platform = %platform,
                        store_id = %store_id,
                        transaction_id = %transaction_id,
                        "Pending order scheduled for verification"
                    );
                }
                Enqueue::Duplicate => {
                    // Platforms redeliver webhooks; an outstanding job for
                    // this transaction already covers the order.
                    tracing::debug!(
                        transaction_id = %transaction_id,
                        "Verification already outstanding, enqueue suppressed"
                    );
                }
            }
            Ok((
                StatusCode::ACCEPTED,
                Json(MessageResponse {
                    message: "scheduled for verification",
                }),
            ))
        }
        Action::NoAction => {
            tracing::debug!(
                platform = %platform,
                store_id = %store_id,
                event = ?raw.get("event"),
                "Webhook acknowledged without action"
            );
            Ok((
                StatusCode::OK,
                Json(MessageResponse {
                    message: "event ignored",
                }),
            ))
        }
    }
}
