//! Application state

use std::sync::Arc;

use redis::aio::ConnectionManager;
use sqlx::PgPool;

use cartrescue_recovery::RecoveryService;
use cartrescue_shared::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    /// The assembled recovery pipeline (parsers, paid flags, queue, leads).
    pub recovery: Arc<RecoveryService>,
}

impl AppState {
    pub fn new(pool: PgPool, redis: ConnectionManager, config: Config) -> Self {
        let recovery = Arc::new(RecoveryService::new(redis, pool.clone()));
        Self {
            pool,
            config,
            recovery,
        }
    }
}
