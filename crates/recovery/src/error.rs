//! Error taxonomy for the recovery pipeline.
//!
//! Every failure is classified by which dependency broke and whether the
//! caller (webhook sender or queue consumer) can do anything about it.
//! Redis being down is never reported the same way as "flag absent": an
//! unreachable flag store fails the job so the queue retries it, while an
//! absent flag is an ordinary business outcome.

use thiserror::Error;

/// Errors produced by webhook classification and verification processing.
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// The payload carried no usable gateway transaction id. Without it the
    /// event cannot be deduplicated or reconciled, so it is rejected.
    #[error("payload has no extractable transaction id")]
    MissingTransactionId,

    /// A pending order arrived for a platform with no registered parser.
    #[error("unsupported webhook platform: {0}")]
    UnsupportedPlatform(String),

    /// The verification queue could not accept or serve a job.
    #[error("verification queue unavailable: {0}")]
    SchedulingUnavailable(#[source] redis::RedisError),

    /// The paid-flag store could not be consulted or written. Distinct from
    /// the flag simply being absent.
    #[error("paid-flag store unavailable: {0}")]
    FastFlagUnavailable(#[source] redis::RedisError),

    /// The lead row could not be written to Postgres.
    #[error("lead insert failed: {0}")]
    LeadInsertFailed(#[source] sqlx::Error),
}

/// Result type for recovery operations.
pub type RecoveryResult<T> = Result<T, RecoveryError>;
