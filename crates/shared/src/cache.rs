//! Redis connection management
//!
//! One `ConnectionManager` per process, cloned into every component that
//! talks to Redis (paid-flag store and verification queue). The manager
//! reconnects on its own after transient failures; individual commands still
//! surface errors to their callers.

use redis::aio::ConnectionManager;

/// Open a Redis connection manager for the given URL.
pub async fn create_redis(redis_url: &str) -> Result<ConnectionManager, redis::RedisError> {
    let client = redis::Client::open(redis_url)?;
    ConnectionManager::new(client).await
}
