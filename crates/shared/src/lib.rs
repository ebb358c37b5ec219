// Test code patterns:
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Shared infrastructure for the cartrescue workspace.
//!
//! Holds the pieces both binaries need: environment configuration, the
//! Postgres pool (plus migrations), and the Redis connection manager.
//! Domain logic lives in `cartrescue-recovery`.

pub mod cache;
pub mod config;
pub mod db;

pub use cache::create_redis;
pub use config::{Config, ConfigError};
pub use db::{create_pool, run_migrations};
