//! Shared payload types for the recovery pipeline.
//!
//! `VerificationJob` is the wire format queued between the API and the
//! worker. Its JSON keys are camelCase because that is the envelope the
//! webhook receiver has always emitted; the worker and any external tooling
//! that inspects the queue rely on those exact names.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Customer and order fields extracted from a platform payload.
///
/// Every field is optional: parsers map whatever the platform provided and
/// leave the rest unset. Serialized snake_case into the lead row's
/// `parsed_data` column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedLead {
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub product_name: Option<String>,
    pub total_value: Option<f64>,
    pub currency: Option<String>,
    pub payment_method: Option<String>,
    pub status: Option<String>,
}

/// A deferred verification request produced by the classifier.
///
/// Carries everything the worker needs so that it never has to re-fetch or
/// re-parse the original webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationJob {
    /// Gateway transaction id, also the dedup key while the job is queued.
    pub transaction_id: String,
    /// Store the webhook was addressed to.
    pub store_id: String,
    /// Original payload exactly as received.
    pub raw_data: Value,
    /// Platform-normalized customer and order fields.
    pub parsed_data: NormalizedLead,
}

/// The persisted form of a [`VerificationJob`], stamped at enqueue time.
///
/// `enqueuedAtMs` makes each accepted job a distinct instance: a transaction
/// that is re-verified after its first job completed produces a different
/// lead dedup key than the first round did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredJob {
    #[serde(flatten)]
    pub payload: VerificationJob,
    pub enqueued_at_ms: i64,
}

impl StoredJob {
    /// Lead dedup key for this job instance.
    pub fn dedup_key(&self) -> String {
        format!("{}:{}", self.payload.transaction_id, self.enqueued_at_ms)
    }
}

/// Lifecycle states a recovery lead moves through as operators work it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    New,
    Contacted,
    Recovered,
    Lost,
}

impl LeadStatus {
    /// Database representation, matching the `status` TEXT column.
    pub fn as_str(self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Recovered => "recovered",
            LeadStatus::Lost => "lost",
        }
    }

    /// Parses a client-supplied status, rejecting anything outside the
    /// known lifecycle.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "new" => Some(LeadStatus::New),
            "contacted" => Some(LeadStatus::Contacted),
            "recovered" => Some(LeadStatus::Recovered),
            "lost" => Some(LeadStatus::Lost),
            _ => None,
        }
    }
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
