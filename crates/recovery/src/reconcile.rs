//! Deferred verification of pending orders.
//!
//! Runs once per claimed job, after the grace window: consult the paid
//! flag, and only when it is absent write a recovery lead. The two-step
//! decision is the entire reason this service exists; everything else in
//! the crate feeds it or stores its output.

use crate::error::RecoveryResult;
use crate::leads::{LeadSink, NewLead};
use crate::model::StoredJob;
use crate::paid_flag::PaidFlagCheck;
use uuid::Uuid;

/// Terminal result of verifying one claimed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The order was paid inside the grace window; no lead.
    PaidAndSkipped,
    /// The order was still unpaid; a lead exists under this id.
    LeadCreated(Uuid),
}

/// Verification logic, generic over its two seams so tests can run it
/// against in-memory stores.
pub struct ReconciliationWorker<F, S> {
    flags: F,
    leads: S,
}

impl<F: PaidFlagCheck, S: LeadSink> ReconciliationWorker<F, S> {
    pub fn new(flags: F, leads: S) -> Self {
        Self { flags, leads }
    }

    /// Decides one job.
    ///
    /// Errors propagate to the caller, which reports them to the queue;
    /// there is no in-process retry here. In particular a flag store that
    /// cannot answer is an error, never "not paid": guessing would
    /// create leads for customers who already bought.
    pub async fn process(&self, job: &StoredJob) -> RecoveryResult<ReconcileOutcome> {
        let transaction_id = &job.payload.transaction_id;

        if self.flags.is_paid(transaction_id).await? {
            tracing::info!(
                transaction_id = %transaction_id,
                store_id = %job.payload.store_id,
                "Order paid within the grace window, skipping lead"
            );
            return Ok(ReconcileOutcome::PaidAndSkipped);
        }

        let lead_id = self.leads.insert(NewLead::from_job(job)).await?;
        Ok(ReconcileOutcome::LeadCreated(lead_id))
    }
}
