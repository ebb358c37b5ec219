// API server clippy configuration
// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! cartrescue API Server
//!
//! Receives sales-platform webhooks, records paid flags for approved
//! orders, schedules deferred verification for pending ones, and serves
//! the agent-facing lead endpoints.

mod error;
mod routes;
mod state;

use std::net::SocketAddr;

use axum::http::{header, Method};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cartrescue_shared::{create_pool, create_redis, run_migrations, Config};

use crate::routes::create_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,cartrescue_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting cartrescue API server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Create database pool
    tracing::info!("Connecting to database...");
    let pool = create_pool(&config.database_url).await?;
    tracing::info!("Database connection established");

    // The worker assumes the schema exists; the API owns migrations.
    run_migrations(&pool).await?;

    // Redis backs both the paid flags and the verification queue
    let redis = create_redis(&config.redis_url).await?;
    tracing::info!("Redis connection established");

    // Create application state
    let state = AppState::new(pool, redis, config);

    // Webhooks are server-to-server; CORS exists for the browser dashboard
    // reading the lead endpoints.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    // Parse bind address
    let addr: SocketAddr = state.config.bind_address.parse()?;

    // Build the router
    let app = create_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    );

    tracing::info!("Starting server on {}", addr);

    // Start the server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
