//! Webhook event classification.
//!
//! Pure decision logic: given a platform name and a raw payload, decide
//! which of the three pipeline actions applies. No I/O happens here; the
//! HTTP handler owns the side effects, which keeps every rule in this file
//! testable without Redis or Postgres.

use serde_json::Value;

use crate::error::{RecoveryError, RecoveryResult};
use crate::model::VerificationJob;
use crate::parsers::ParserRegistry;

/// Approved payment: record the paid flag so any scheduled verification
/// for the same transaction resolves to a skip.
pub const EVENT_ORDER_APPROVED: &str = "order.approved";

/// Order created: candidate for deferred verification when still pending.
pub const EVENT_ORDER_CREATED: &str = "order.created";

const STATUS_PENDING: &str = "pending";

/// What the receiver must do with a classified webhook.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Write the paid flag for this transaction.
    RecordPaid { transaction_id: String },
    /// Enqueue a delayed verification job.
    ScheduleVerification { job: VerificationJob },
    /// Acknowledge and drop the event.
    NoAction,
}

/// Classifies a webhook into exactly one [`Action`].
///
/// The transaction id is extracted before anything else: an event that
/// cannot name its transaction is rejected outright, whatever its type,
/// because nothing downstream can deduplicate or reconcile it.
pub fn classify(
    registry: &ParserRegistry,
    platform: &str,
    store_id: &str,
    raw: &Value,
) -> RecoveryResult<Action> {
    let transaction_id = extract_transaction_id(raw)?;

    match raw.get("event").and_then(Value::as_str) {
        Some(EVENT_ORDER_APPROVED) => Ok(Action::RecordPaid {
            transaction_id: transaction_id.to_string(),
        }),
        Some(EVENT_ORDER_CREATED) if resource_status_is_pending(raw) => {
            // Parser lookup comes before any side effect so an unsupported
            // platform rejects the event without touching the queue.
            let parsed_data = registry.normalize(platform, raw)?;
            Ok(Action::ScheduleVerification {
                job: VerificationJob {
                    transaction_id: transaction_id.to_string(),
                    store_id: store_id.to_string(),
                    raw_data: raw.clone(),
                    parsed_data,
                },
            })
        }
        _ => Ok(Action::NoAction),
    }
}

/// `resource.gateway_transaction_id`, falling back to the top level for
/// platforms that post a flat payload. Empty strings count as missing.
fn extract_transaction_id(raw: &Value) -> RecoveryResult<&str> {
    raw.pointer("/resource/gateway_transaction_id")
        .or_else(|| raw.get("gateway_transaction_id"))
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or(RecoveryError::MissingTransactionId)
}

fn resource_status_is_pending(raw: &Value) -> bool {
    raw.pointer("/resource/status").and_then(Value::as_str) == Some(STATUS_PENDING)
}
