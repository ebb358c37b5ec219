//! Application configuration
//!
//! Both binaries read the same environment variables. `.env` loading is the
//! caller's job (`dotenvy::dotenv().ok()` before `Config::from_env`), so that
//! tests and containerized deployments stay in control of the environment.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),
}

/// Runtime configuration shared by the API server and the worker.
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string (lead storage).
    pub database_url: String,
    /// Redis connection string (paid flags + verification queue).
    pub redis_url: String,
    /// Listen address for the API server.
    pub bind_address: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: require("DATABASE_URL")?,
            redis_url: require("REDIS_URL")?,
            bind_address: std::env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(name)),
    }
}
