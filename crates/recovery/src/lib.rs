// Recovery crate clippy configuration
// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cartrescue Recovery Pipeline
//!
//! Everything between "a platform posted a webhook" and "an agent sees a
//! recovery lead":
//!
//! - **Classification**: map each event to flag-write, deferred
//!   verification, or nothing
//! - **Parsers**: per-platform payload normalization behind a registry
//! - **Paid flags**: short-lived Redis markers written by approved events
//! - **Delayed queue**: Redis-backed verification scheduling with dedup,
//!   leases, retry backoff and reaping
//! - **Reconciliation**: the after-grace-window paid check that decides
//!   whether a lead is written
//! - **Lead store**: idempotent inserts plus the agent-facing listing and
//!   status updates
//!
//! The API crate drives the producer half, the worker binary the consumer
//! half; both build their stores from one [`RecoveryService`].

pub mod classifier;
pub mod error;
pub mod leads;
pub mod model;
pub mod paid_flag;
pub mod parsers;
pub mod queue;
pub mod reconcile;

#[cfg(test)]
mod reconcile_tests;

// Classification
pub use classifier::{classify, Action, EVENT_ORDER_APPROVED, EVENT_ORDER_CREATED};

// Errors
pub use error::{RecoveryError, RecoveryResult};

// Leads
pub use leads::{LeadRecord, LeadSink, LeadStore, NewLead};

// Models
pub use model::{LeadStatus, NormalizedLead, StoredJob, VerificationJob};

// Paid flags
pub use paid_flag::{PaidFlagCheck, PaidFlagStore, PAID_FLAG_TTL_SECS};

// Parsers
pub use parsers::{ParserRegistry, PlatformParser};

// Queue
pub use queue::{Enqueue, FailOutcome, JobQueue, RedisQueue, QUEUE_NAME, VERIFICATION_DELAY_MS};

// Reconciliation
pub use reconcile::{ReconcileOutcome, ReconciliationWorker};

use redis::aio::ConnectionManager;
use sqlx::PgPool;

/// The assembled production pipeline: registry plus the three stores, all
/// over the shared Redis and Postgres handles.
pub struct RecoveryService {
    pub parsers: ParserRegistry,
    pub paid_flags: PaidFlagStore,
    pub queue: RedisQueue,
    pub leads: LeadStore,
}

impl RecoveryService {
    pub fn new(redis: ConnectionManager, pool: PgPool) -> Self {
        let parsers = ParserRegistry::with_default_platforms();
        tracing::info!(
            platforms = ?parsers.platforms(),
            "Recovery pipeline initialized"
        );
        Self {
            parsers,
            paid_flags: PaidFlagStore::new(redis.clone()),
            queue: RedisQueue::new(redis),
            leads: LeadStore::new(pool),
        }
    }
}
