//! Redis-backed delayed verification queue.
//!
//! State lives entirely in Redis so producer and consumer restarts lose
//! nothing:
//!
//! - `recovery-queue:jobs`      HASH  transaction id → stored job JSON
//! - `recovery-queue:scheduled` ZSET  transaction id scored by ready-at (ms)
//! - `recovery-queue:active`    ZSET  transaction id scored by lease expiry (ms)
//! - `recovery-queue:attempts`  HASH  transaction id → failure count
//!
//! Every multi-key transition runs as a Lua script so concurrent producers
//! and the consumer never observe a half-moved job. The transaction id is
//! the job key, which is what makes a second pending-event for an
//! outstanding transaction a silent duplicate instead of a second job.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;
use time::OffsetDateTime;

use crate::error::{RecoveryError, RecoveryResult};
use crate::model::{StoredJob, VerificationJob};

/// Queue name shared with the worker and any external tooling.
pub const QUEUE_NAME: &str = "recovery-queue";

/// Grace window between accepting a pending order and verifying it.
pub const VERIFICATION_DELAY_MS: i64 = 600_000;

/// How long a claimed job stays invisible before the reaper may hand it
/// back to the scheduled set.
pub const CLAIM_LEASE_MS: i64 = 60_000;

/// Failures after which a job is dropped instead of rescheduled.
pub const MAX_ATTEMPTS: i64 = 5;

/// First retry delay; doubles on every further failure.
pub const RETRY_BASE_BACKOFF_MS: i64 = 30_000;

/// Outcome of an enqueue attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueue {
    /// A new job instance was stored and scheduled.
    Scheduled,
    /// A job for this transaction is already outstanding; nothing changed.
    Duplicate,
}

/// Outcome of reporting a job failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// Rescheduled with backoff; `attempt` counts this failure.
    Rescheduled { attempt: u32 },
    /// Attempt cap reached; the job was removed from queue state.
    Dropped,
    /// No stored job under this id (already completed or dropped).
    Unknown,
}

/// Operations the verification pipeline needs from a delayed queue.
///
/// The Redis implementation below is production; tests drive the same
/// contract through an in-memory queue with a movable clock.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Stores the job and schedules it one grace window out, unless a job
    /// for the same transaction is already outstanding.
    async fn enqueue(&self, job: VerificationJob) -> RecoveryResult<Enqueue>;

    /// Claims up to `limit` due jobs, moving them onto a lease. A claimed
    /// job is invisible to other claimers until completed, failed, or
    /// reaped.
    async fn claim_due(&self, limit: usize) -> RecoveryResult<Vec<StoredJob>>;

    /// Terminally removes a job, successful or given up. No history is
    /// retained.
    async fn complete(&self, transaction_id: &str) -> RecoveryResult<()>;

    /// Records a failure: reschedules with exponential backoff until the
    /// attempt cap, then drops the job.
    async fn fail(&self, transaction_id: &str) -> RecoveryResult<FailOutcome>;

    /// Returns jobs whose lease expired to the scheduled set, due
    /// immediately. At-least-once redelivery after a consumer crash.
    async fn reap_stalled(&self) -> RecoveryResult<u64>;
}

// KEYS: jobs, scheduled  ARGV: id, payload, ready_at_ms
const ENQUEUE_SCRIPT: &str = r"
if redis.call('HEXISTS', KEYS[1], ARGV[1]) == 1 then
  return 0
end
redis.call('HSET', KEYS[1], ARGV[1], ARGV[2])
redis.call('ZADD', KEYS[2], ARGV[3], ARGV[1])
return 1
";

// KEYS: jobs, scheduled, active  ARGV: now_ms, limit, lease_expiry_ms
const CLAIM_SCRIPT: &str = r"
local due = redis.call('ZRANGEBYSCORE', KEYS[2], '-inf', ARGV[1], 'LIMIT', 0, tonumber(ARGV[2]))
local claimed = {}
for _, id in ipairs(due) do
  redis.call('ZREM', KEYS[2], id)
  redis.call('ZADD', KEYS[3], ARGV[3], id)
  local payload = redis.call('HGET', KEYS[1], id)
  if payload then
    claimed[#claimed + 1] = {id, payload}
  else
    redis.call('ZREM', KEYS[3], id)
  end
end
return claimed
";

// KEYS: jobs, scheduled, active, attempts  ARGV: id
const COMPLETE_SCRIPT: &str = r"
redis.call('ZREM', KEYS[2], ARGV[1])
redis.call('ZREM', KEYS[3], ARGV[1])
redis.call('HDEL', KEYS[4], ARGV[1])
return redis.call('HDEL', KEYS[1], ARGV[1])
";

// KEYS: jobs, scheduled, active, attempts
// ARGV: id, max_attempts, now_ms, base_backoff_ms
const FAIL_SCRIPT: &str = r"
redis.call('ZREM', KEYS[3], ARGV[1])
if redis.call('HEXISTS', KEYS[1], ARGV[1]) == 0 then
  return -1
end
local attempts = redis.call('HINCRBY', KEYS[4], ARGV[1], 1)
if attempts >= tonumber(ARGV[2]) then
  redis.call('HDEL', KEYS[1], ARGV[1])
  redis.call('HDEL', KEYS[4], ARGV[1])
  return 0
end
redis.call('ZADD', KEYS[2], tonumber(ARGV[3]) + tonumber(ARGV[4]) * 2 ^ (attempts - 1), ARGV[1])
return attempts
";

// KEYS: scheduled, active  ARGV: now_ms
const REAP_SCRIPT: &str = r"
local expired = redis.call('ZRANGEBYSCORE', KEYS[2], '-inf', ARGV[1])
for _, id in ipairs(expired) do
  redis.call('ZREM', KEYS[2], id)
  redis.call('ZADD', KEYS[1], ARGV[1], id)
end
return #expired
";

#[derive(Debug, Clone, PartialEq, Eq)]
struct QueueKeys {
    jobs: String,
    scheduled: String,
    active: String,
    attempts: String,
}

impl QueueKeys {
    fn new(queue_name: &str) -> Self {
        Self {
            jobs: format!("{queue_name}:jobs"),
            scheduled: format!("{queue_name}:scheduled"),
            active: format!("{queue_name}:active"),
            attempts: format!("{queue_name}:attempts"),
        }
    }
}

/// Production queue over the shared Redis connection manager.
pub struct RedisQueue {
    conn: ConnectionManager,
    keys: QueueKeys,
    enqueue_script: Script,
    claim_script: Script,
    complete_script: Script,
    fail_script: Script,
    reap_script: Script,
}

impl RedisQueue {
    pub fn new(conn: ConnectionManager) -> Self {
        Self::with_queue_name(conn, QUEUE_NAME)
    }

    /// Same queue under a different name; integration tests use this to
    /// isolate runs on a shared Redis.
    pub fn with_queue_name(conn: ConnectionManager, queue_name: &str) -> Self {
        Self {
            conn,
            keys: QueueKeys::new(queue_name),
            enqueue_script: Script::new(ENQUEUE_SCRIPT),
            claim_script: Script::new(CLAIM_SCRIPT),
            complete_script: Script::new(COMPLETE_SCRIPT),
            fail_script: Script::new(FAIL_SCRIPT),
            reap_script: Script::new(REAP_SCRIPT),
        }
    }
}

#[async_trait]
impl JobQueue for RedisQueue {
    async fn enqueue(&self, job: VerificationJob) -> RecoveryResult<Enqueue> {
        let stored = StoredJob {
            payload: job,
            enqueued_at_ms: now_ms(),
        };
        let payload = serde_json::to_string(&stored).map_err(|error| {
            RecoveryError::SchedulingUnavailable(redis::RedisError::from((
                redis::ErrorKind::TypeError,
                "job payload did not serialize",
                error.to_string(),
            )))
        })?;
        let ready_at = stored.enqueued_at_ms + VERIFICATION_DELAY_MS;

        let mut conn = self.conn.clone();
        let accepted: i64 = self
            .enqueue_script
            .key(&self.keys.jobs)
            .key(&self.keys.scheduled)
            .arg(&stored.payload.transaction_id)
            .arg(payload)
            .arg(ready_at)
            .invoke_async(&mut conn)
            .await
            .map_err(RecoveryError::SchedulingUnavailable)?;

        if accepted == 1 {
            tracing::debug!(
                transaction_id = %stored.payload.transaction_id,
                ready_at_ms = ready_at,
                "Verification job scheduled"
            );
            Ok(Enqueue::Scheduled)
        } else {
            Ok(Enqueue::Duplicate)
        }
    }

    async fn claim_due(&self, limit: usize) -> RecoveryResult<Vec<StoredJob>> {
        let now = now_ms();
        let mut conn = self.conn.clone();
        let rows: Vec<(String, String)> = self
            .claim_script
            .key(&self.keys.jobs)
            .key(&self.keys.scheduled)
            .key(&self.keys.active)
            .arg(now)
            .arg(limit)
            .arg(now + CLAIM_LEASE_MS)
            .invoke_async(&mut conn)
            .await
            .map_err(RecoveryError::SchedulingUnavailable)?;

        let mut jobs = Vec::with_capacity(rows.len());
        for (id, payload) in rows {
            match serde_json::from_str::<StoredJob>(&payload) {
                Ok(job) => jobs.push(job),
                Err(error) => {
                    // Operator surgery or version skew; keeping it would
                    // redeliver the same garbage forever.
                    tracing::error!(
                        transaction_id = %id,
                        error = %error,
                        "Discarding claimed job with undecodable payload"
                    );
                    self.complete(&id).await?;
                }
            }
        }
        Ok(jobs)
    }

    async fn complete(&self, transaction_id: &str) -> RecoveryResult<()> {
        let mut conn = self.conn.clone();
        let _removed: i64 = self
            .complete_script
            .key(&self.keys.jobs)
            .key(&self.keys.scheduled)
            .key(&self.keys.active)
            .key(&self.keys.attempts)
            .arg(transaction_id)
            .invoke_async(&mut conn)
            .await
            .map_err(RecoveryError::SchedulingUnavailable)?;
        Ok(())
    }

    async fn fail(&self, transaction_id: &str) -> RecoveryResult<FailOutcome> {
        let mut conn = self.conn.clone();
        let verdict: i64 = self
            .fail_script
            .key(&self.keys.jobs)
            .key(&self.keys.scheduled)
            .key(&self.keys.active)
            .key(&self.keys.attempts)
            .arg(transaction_id)
            .arg(MAX_ATTEMPTS)
            .arg(now_ms())
            .arg(RETRY_BASE_BACKOFF_MS)
            .invoke_async(&mut conn)
            .await
            .map_err(RecoveryError::SchedulingUnavailable)?;

        Ok(match verdict {
            -1 => FailOutcome::Unknown,
            0 => FailOutcome::Dropped,
            attempt => {
                let attempt = u32::try_from(attempt).unwrap_or(u32::MAX);
                tracing::debug!(
                    transaction_id = %transaction_id,
                    attempt = attempt,
                    backoff_ms = retry_backoff_ms(attempt),
                    "Verification job rescheduled"
                );
                FailOutcome::Rescheduled { attempt }
            }
        })
    }

    async fn reap_stalled(&self) -> RecoveryResult<u64> {
        let mut conn = self.conn.clone();
        let reaped: u64 = self
            .reap_script
            .key(&self.keys.scheduled)
            .key(&self.keys.active)
            .arg(now_ms())
            .invoke_async(&mut conn)
            .await
            .map_err(RecoveryError::SchedulingUnavailable)?;
        Ok(reaped)
    }
}

/// Backoff before retry `attempt` (first failure is attempt 1).
///
/// Must stay in step with the formula inside `FAIL_SCRIPT`.
pub(crate) fn retry_backoff_ms(attempt: u32) -> i64 {
    RETRY_BASE_BACKOFF_MS << attempt.saturating_sub(1).min(31)
}

fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
