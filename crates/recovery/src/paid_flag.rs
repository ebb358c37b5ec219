//! Paid-flag store.
//!
//! An approved payment writes a short-lived Redis key so that the deferred
//! verification of the same transaction can see it without touching the
//! platform's API. The flag outlives the verification delay by five
//! minutes, which keeps it visible to the worker even when the approval
//! lands at the very end of the grace window.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::{RecoveryError, RecoveryResult};

/// Flag lifetime. Must stay longer than the verification delay.
pub const PAID_FLAG_TTL_SECS: u64 = 900;

/// Read seam for the reconciliation worker.
#[async_trait]
pub trait PaidFlagCheck: Send + Sync {
    /// Whether a paid flag currently exists for `transaction_id`.
    ///
    /// `Ok(false)` means the flag is genuinely absent. A store that cannot
    /// answer returns `FastFlagUnavailable` instead; absence and outage
    /// are never conflated.
    async fn is_paid(&self, transaction_id: &str) -> RecoveryResult<bool>;
}

#[async_trait]
impl<T: PaidFlagCheck + ?Sized> PaidFlagCheck for std::sync::Arc<T> {
    async fn is_paid(&self, transaction_id: &str) -> RecoveryResult<bool> {
        (**self).is_paid(transaction_id).await
    }
}

/// Redis-backed flag store shared by the API and the worker.
#[derive(Clone)]
pub struct PaidFlagStore {
    conn: ConnectionManager,
}

impl PaidFlagStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Records an approved payment: `SET paid:{id} "true" EX 900`.
    ///
    /// Write-once by usage; a second approval just refreshes the TTL.
    pub async fn mark_paid(&self, transaction_id: &str) -> RecoveryResult<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(flag_key(transaction_id), "true", PAID_FLAG_TTL_SECS)
            .await
            .map_err(RecoveryError::FastFlagUnavailable)?;
        tracing::debug!(transaction_id = %transaction_id, "Paid flag recorded");
        Ok(())
    }
}

#[async_trait]
impl PaidFlagCheck for PaidFlagStore {
    async fn is_paid(&self, transaction_id: &str) -> RecoveryResult<bool> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn
            .get(flag_key(transaction_id))
            .await
            .map_err(RecoveryError::FastFlagUnavailable)?;
        Ok(value.is_some())
    }
}

fn flag_key(transaction_id: &str) -> String {
    format!("paid:{transaction_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::VERIFICATION_DELAY_MS;

    #[test]
    fn flag_key_uses_the_documented_prefix() {
        assert_eq!(flag_key("tx1"), "paid:tx1");
    }

    #[test]
    fn flag_ttl_outlives_the_verification_delay() {
        let ttl_ms = i64::try_from(PAID_FLAG_TTL_SECS).unwrap() * 1000;
        assert!(ttl_ms > VERIFICATION_DELAY_MS);
    }
}
