// Worker clippy configuration
// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! cartrescue Reconciliation Worker
//!
//! The consumer half of the recovery pipeline:
//! - Claims verification jobs as their grace window elapses (every second)
//! - Checks the paid flag and writes a lead for each still-unpaid order
//! - Reports failures back to the queue so its backoff policy governs retry
//! - Reaps jobs whose claimer died mid-lease (every 30 seconds)
//!
//! The worker keeps no state of its own; killing and restarting it loses
//! nothing because claims, attempts and payloads all live in Redis.

use std::time::Duration;

use tokio::time::interval;
use tracing::{debug, error, info, warn};

use cartrescue_recovery::{
    FailOutcome, JobQueue, LeadStore, PaidFlagStore, ReconcileOutcome, ReconciliationWorker,
    RedisQueue, StoredJob, QUEUE_NAME,
};
use cartrescue_shared::{create_pool, create_redis, Config};

/// Jobs pulled per poll; a larger burst just takes extra polls.
const CLAIM_BATCH: usize = 20;

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const REAP_INTERVAL: Duration = Duration::from_secs(30);
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Default)]
struct Counters {
    claimed: u64,
    skipped_paid: u64,
    leads_created: u64,
    failed: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    info!("Starting cartrescue worker");

    let config = Config::from_env()?;
    let pool = create_pool(&config.database_url).await?;
    info!("Database pool created");

    let redis = create_redis(&config.redis_url).await?;
    info!("Redis connection established");

    let queue = RedisQueue::new(redis.clone());
    let reconciler = ReconciliationWorker::new(PaidFlagStore::new(redis), LeadStore::new(pool));

    info!(
        queue = QUEUE_NAME,
        batch = CLAIM_BATCH,
        "Worker ready, waiting for due verification jobs"
    );
    run(&queue, &reconciler).await;

    info!("Worker stopped");
    Ok(())
}

/// Consumer loop: poll for due jobs, reap stalled leases, report liveness.
/// Exits on ctrl-c; in-flight jobs finish their current batch first.
async fn run(queue: &RedisQueue, reconciler: &ReconciliationWorker<PaidFlagStore, LeadStore>) {
    let mut poll = interval(POLL_INTERVAL);
    let mut reap = interval(REAP_INTERVAL);
    let mut heartbeat = interval(HEARTBEAT_INTERVAL);
    let mut counters = Counters::default();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            _ = poll.tick() => {
                drain_due(queue, reconciler, &mut counters).await;
            }
            _ = reap.tick() => {
                match queue.reap_stalled().await {
                    Ok(0) => {}
                    Ok(reaped) => warn!(reaped = reaped, "Requeued jobs with expired leases"),
                    Err(e) => error!(error = %e, "Failed to reap stalled jobs"),
                }
            }
            _ = heartbeat.tick() => {
                info!(
                    claimed = counters.claimed,
                    skipped_paid = counters.skipped_paid,
                    leads_created = counters.leads_created,
                    failed = counters.failed,
                    "Worker heartbeat"
                );
            }
        }
    }
}

/// Claims one batch of due jobs and processes each to a terminal report.
async fn drain_due(
    queue: &RedisQueue,
    reconciler: &ReconciliationWorker<PaidFlagStore, LeadStore>,
    counters: &mut Counters,
) {
    let jobs = match queue.claim_due(CLAIM_BATCH).await {
        Ok(jobs) => jobs,
        Err(e) => {
            error!(error = %e, "Failed to claim due jobs");
            return;
        }
    };

    for job in jobs {
        counters.claimed += 1;
        process_one(queue, reconciler, &job, counters).await;
    }
}

async fn process_one(
    queue: &RedisQueue,
    reconciler: &ReconciliationWorker<PaidFlagStore, LeadStore>,
    job: &StoredJob,
    counters: &mut Counters,
) {
    let transaction_id = job.payload.transaction_id.as_str();

    match reconciler.process(job).await {
        Ok(outcome) => {
            match outcome {
                ReconcileOutcome::PaidAndSkipped => counters.skipped_paid += 1,
                ReconcileOutcome::LeadCreated(_) => counters.leads_created += 1,
            }
            if let Err(e) = queue.complete(transaction_id).await {
                // The lease expires and the job redelivers; the lead insert
                // is idempotent per instance, so redelivery cannot double
                // anything.
                error!(
                    transaction_id = %transaction_id,
                    error = %e,
                    "Failed to complete job after processing"
                );
            }
        }
        Err(e) => {
            counters.failed += 1;
            error!(transaction_id = %transaction_id, error = %e, "Verification failed");
            match queue.fail(transaction_id).await {
                Ok(FailOutcome::Rescheduled { attempt }) => {
                    warn!(
                        transaction_id = %transaction_id,
                        attempt = attempt,
                        "Job rescheduled with backoff"
                    );
                }
                Ok(FailOutcome::Dropped) => {
                    error!(
                        transaction_id = %transaction_id,
                        "Job dropped after exhausting retries"
                    );
                }
                Ok(FailOutcome::Unknown) => {
                    debug!(
                        transaction_id = %transaction_id,
                        "Failed job no longer in queue state"
                    );
                }
                Err(report_err) => {
                    error!(
                        transaction_id = %transaction_id,
                        error = %report_err,
                        "Failed to report job failure"
                    );
                }
            }
        }
    }
}
