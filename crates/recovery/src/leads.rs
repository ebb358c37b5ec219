//! Recovery lead storage.
//!
//! One Postgres table, written by the worker when a verification confirms
//! an order unpaid and read by the agent-facing endpoints. The insert is
//! idempotent per job instance via the unique `dedup_key`, which is what
//! lets the queue redeliver a crashed job without minting a second lead.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{RecoveryError, RecoveryResult};
use crate::model::{LeadStatus, NormalizedLead, StoredJob};

/// Write seam for the reconciliation worker.
#[async_trait]
pub trait LeadSink: Send + Sync {
    /// Inserts a lead, returning its id. Re-inserting the same `dedup_key`
    /// returns the existing row's id instead of failing.
    async fn insert(&self, lead: NewLead) -> RecoveryResult<Uuid>;
}

#[async_trait]
impl<T: LeadSink + ?Sized> LeadSink for std::sync::Arc<T> {
    async fn insert(&self, lead: NewLead) -> RecoveryResult<Uuid> {
        (**self).insert(lead).await
    }
}

/// A lead about to be written, assembled from a claimed job.
#[derive(Debug, Clone)]
pub struct NewLead {
    pub store_id: String,
    pub transaction_id: String,
    pub dedup_key: String,
    pub raw_data: Value,
    pub parsed_data: NormalizedLead,
}

impl NewLead {
    pub fn from_job(job: &StoredJob) -> Self {
        Self {
            store_id: job.payload.store_id.clone(),
            transaction_id: job.payload.transaction_id.clone(),
            dedup_key: job.dedup_key(),
            raw_data: job.payload.raw_data.clone(),
            parsed_data: job.payload.parsed_data.clone(),
        }
    }
}

/// A stored lead row as served to the agent endpoints.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LeadRecord {
    pub id: Uuid,
    pub store_id: String,
    pub transaction_id: String,
    pub dedup_key: String,
    pub raw_data: Value,
    pub parsed_data: Value,
    pub status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub received_at: OffsetDateTime,
}

const LEAD_COLUMNS: &str =
    "id, store_id, transaction_id, dedup_key, raw_data, parsed_data, status, received_at";

/// Postgres-backed lead store.
#[derive(Clone)]
pub struct LeadStore {
    pool: PgPool,
}

impl LeadStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Newest-first page of leads. `page` is 1-based; pages past the end
    /// come back empty.
    pub async fn list(&self, page: i64, limit: i64) -> Result<Vec<LeadRecord>, sqlx::Error> {
        let offset = list_offset(page, limit);
        sqlx::query_as::<_, LeadRecord>(&format!(
            "SELECT {LEAD_COLUMNS} FROM recovery_leads \
             ORDER BY received_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    /// Total lead count, for the listing envelope.
    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recovery_leads")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    /// Moves a lead through its lifecycle. `None` means no such lead.
    pub async fn update_status(
        &self,
        lead_id: Uuid,
        status: LeadStatus,
    ) -> Result<Option<LeadRecord>, sqlx::Error> {
        sqlx::query_as::<_, LeadRecord>(&format!(
            "UPDATE recovery_leads SET status = $1 WHERE id = $2 RETURNING {LEAD_COLUMNS}"
        ))
        .bind(status.as_str())
        .bind(lead_id)
        .fetch_optional(&self.pool)
        .await
    }
}

/// OFFSET for a 1-based page. Saturating, so an absurd page number asks
/// Postgres for an empty page instead of a negative or overflowed offset.
fn list_offset(page: i64, limit: i64) -> i64 {
    page.saturating_sub(1).saturating_mul(limit).max(0)
}

#[async_trait]
impl LeadSink for LeadStore {
    async fn insert(&self, lead: NewLead) -> RecoveryResult<Uuid> {
        let inserted: Option<(Uuid,)> = sqlx::query_as(
            "INSERT INTO recovery_leads \
                 (store_id, transaction_id, dedup_key, raw_data, parsed_data, status) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (dedup_key) DO NOTHING \
             RETURNING id",
        )
        .bind(&lead.store_id)
        .bind(&lead.transaction_id)
        .bind(&lead.dedup_key)
        .bind(&lead.raw_data)
        .bind(Json(&lead.parsed_data))
        .bind(LeadStatus::New.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(RecoveryError::LeadInsertFailed)?;

        if let Some((id,)) = inserted {
            tracing::info!(
                lead_id = %id,
                store_id = %lead.store_id,
                transaction_id = %lead.transaction_id,
                "Recovery lead created"
            );
            return Ok(id);
        }

        // The queue redelivered a job whose first run inserted before
        // crashing; hand back the row that run created.
        let (id,): (Uuid,) = sqlx::query_as("SELECT id FROM recovery_leads WHERE dedup_key = $1")
            .bind(&lead.dedup_key)
            .fetch_one(&self.pool)
            .await
            .map_err(RecoveryError::LeadInsertFailed)?;
        tracing::debug!(
            lead_id = %id,
            dedup_key = %lead.dedup_key,
            "Lead already existed for this job instance"
        );
        Ok(id)
    }
}
