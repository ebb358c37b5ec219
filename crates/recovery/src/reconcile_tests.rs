// Test file - these are expected patterns in test code
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

//! Reconciliation Worker Tests
//!
//! Drives [`ReconciliationWorker`] against in-memory flag and lead stores:
//! the paid/unpaid decision, the outage-is-not-absence rule, and insert
//! idempotence per job instance.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{RecoveryError, RecoveryResult};
use crate::leads::{LeadSink, NewLead};
use crate::model::{NormalizedLead, StoredJob, VerificationJob};
use crate::paid_flag::PaidFlagCheck;
use crate::reconcile::{ReconcileOutcome, ReconciliationWorker};

fn simulated_redis_outage() -> redis::RedisError {
    redis::RedisError::from((redis::ErrorKind::IoError, "simulated flag store outage"))
}

/// In-memory paid-flag store with a switchable outage mode.
#[derive(Default)]
pub(crate) struct InMemoryFlags {
    paid: Mutex<HashSet<String>>,
    unavailable: AtomicBool,
}

impl InMemoryFlags {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn mark_paid(&self, transaction_id: &str) {
        self.paid.lock().unwrap().insert(transaction_id.to_string());
    }

    pub(crate) fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl PaidFlagCheck for InMemoryFlags {
    async fn is_paid(&self, transaction_id: &str) -> RecoveryResult<bool> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RecoveryError::FastFlagUnavailable(simulated_redis_outage()));
        }
        Ok(self.paid.lock().unwrap().contains(transaction_id))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedLead {
    pub(crate) id: Uuid,
    pub(crate) transaction_id: String,
    pub(crate) dedup_key: String,
    pub(crate) status: String,
}

/// In-memory lead sink honoring the unique-dedup-key contract.
#[derive(Default)]
pub(crate) struct InMemoryLeads {
    rows: Mutex<Vec<RecordedLead>>,
    unavailable: AtomicBool,
}

impl InMemoryLeads {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub(crate) fn recorded(&self) -> Vec<RecordedLead> {
        self.rows.lock().unwrap().clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.rows.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl LeadSink for InMemoryLeads {
    async fn insert(&self, lead: NewLead) -> RecoveryResult<Uuid> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RecoveryError::LeadInsertFailed(sqlx::Error::PoolTimedOut));
        }
        let mut rows = self.rows.lock().unwrap();
        if let Some(existing) = rows.iter().find(|row| row.dedup_key == lead.dedup_key) {
            return Ok(existing.id);
        }
        let id = Uuid::new_v4();
        rows.push(RecordedLead {
            id,
            transaction_id: lead.transaction_id,
            dedup_key: lead.dedup_key,
            status: "new".to_string(),
        });
        Ok(id)
    }
}

fn stored_job(transaction_id: &str, enqueued_at_ms: i64) -> StoredJob {
    StoredJob {
        payload: VerificationJob {
            transaction_id: transaction_id.to_string(),
            store_id: "store-1".to_string(),
            raw_data: serde_json::json!({
                "event": "order.created",
                "resource": {"status": "pending", "gateway_transaction_id": transaction_id}
            }),
            parsed_data: NormalizedLead {
                customer_email: Some("ana@example.com".to_string()),
                ..NormalizedLead::default()
            },
        },
        enqueued_at_ms,
    }
}

fn worker(
    flags: &Arc<InMemoryFlags>,
    leads: &Arc<InMemoryLeads>,
) -> ReconciliationWorker<Arc<InMemoryFlags>, Arc<InMemoryLeads>> {
    ReconciliationWorker::new(Arc::clone(flags), Arc::clone(leads))
}

#[cfg(test)]
mod verification_decision {
    use super::*;

    #[tokio::test]
    async fn paid_flag_present_skips_the_lead() {
        let flags = Arc::new(InMemoryFlags::new());
        let leads = Arc::new(InMemoryLeads::new());
        flags.mark_paid("tx1");

        let outcome = worker(&flags, &leads)
            .process(&stored_job("tx1", 1))
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::PaidAndSkipped);
        assert!(leads.is_empty());
    }

    #[tokio::test]
    async fn absent_flag_creates_a_lead_with_status_new() {
        let flags = Arc::new(InMemoryFlags::new());
        let leads = Arc::new(InMemoryLeads::new());

        let outcome = worker(&flags, &leads)
            .process(&stored_job("tx2", 1))
            .await
            .unwrap();

        let ReconcileOutcome::LeadCreated(lead_id) = outcome else {
            panic!("expected LeadCreated, got {outcome:?}");
        };
        let rows = leads.recorded();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, lead_id);
        assert_eq!(rows[0].transaction_id, "tx2");
        assert_eq!(rows[0].status, "new");
    }

    #[tokio::test]
    async fn late_approval_leaves_the_lead_in_place() {
        let flags = Arc::new(InMemoryFlags::new());
        let leads = Arc::new(InMemoryLeads::new());
        let recon = worker(&flags, &leads);

        recon.process(&stored_job("tx3", 1)).await.unwrap();
        assert_eq!(leads.len(), 1);

        // The approval arrives after the lead exists: the flag is recorded
        // but nothing revisits the lead. Only a *future* job instance sees
        // the flag.
        flags.mark_paid("tx3");
        assert_eq!(leads.len(), 1);

        let outcome = recon.process(&stored_job("tx3", 2)).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::PaidAndSkipped);
        assert_eq!(leads.len(), 1);
    }
}

#[cfg(test)]
mod failure_handling {
    use super::*;

    #[tokio::test]
    async fn flag_store_outage_is_an_error_not_an_absent_flag() {
        let flags = Arc::new(InMemoryFlags::new());
        let leads = Arc::new(InMemoryLeads::new());
        flags.set_unavailable(true);

        let err = worker(&flags, &leads)
            .process(&stored_job("tx4", 1))
            .await
            .unwrap_err();

        assert!(matches!(err, RecoveryError::FastFlagUnavailable(_)));
        assert!(
            leads.is_empty(),
            "an unreachable flag store must never be read as unpaid"
        );
    }

    #[tokio::test]
    async fn lead_store_failure_propagates_for_queue_retry() {
        let flags = Arc::new(InMemoryFlags::new());
        let leads = Arc::new(InMemoryLeads::new());
        leads.set_unavailable(true);

        let err = worker(&flags, &leads)
            .process(&stored_job("tx5", 1))
            .await
            .unwrap_err();

        assert!(matches!(err, RecoveryError::LeadInsertFailed(_)));
    }
}

#[cfg(test)]
mod idempotence {
    use super::*;

    #[tokio::test]
    async fn redelivered_job_instance_yields_the_same_lead() {
        let flags = Arc::new(InMemoryFlags::new());
        let leads = Arc::new(InMemoryLeads::new());
        let recon = worker(&flags, &leads);
        let job = stored_job("tx6", 1_700_000_000_000);

        let first = recon.process(&job).await.unwrap();
        let second = recon.process(&job).await.unwrap();

        let ReconcileOutcome::LeadCreated(first_id) = first else {
            panic!("expected LeadCreated, got {first:?}");
        };
        assert_eq!(second, ReconcileOutcome::LeadCreated(first_id));
        assert_eq!(leads.len(), 1);
    }

    #[tokio::test]
    async fn distinct_job_instances_may_create_distinct_leads() {
        let flags = Arc::new(InMemoryFlags::new());
        let leads = Arc::new(InMemoryLeads::new());
        let recon = worker(&flags, &leads);

        // Same transaction verified twice (first job completed, then a new
        // pending event) is the documented duplicate-lead path.
        recon.process(&stored_job("tx7", 1)).await.unwrap();
        recon.process(&stored_job("tx7", 2)).await.unwrap();

        let rows = leads.recorded();
        assert_eq!(rows.len(), 2);
        assert_ne!(rows[0].dedup_key, rows[1].dedup_key);
    }
}
