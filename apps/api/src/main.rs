//! Fieldops webhook delivery API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod api_services;
mod dev_seed;
mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

use fieldops_core::AppError;
use tracing::info;

use crate::api_config::{ApiConfig, init_tracing};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;
    let store = api_services::build_webhook_store(&config).await?;

    if config.migrate_only {
        info!("database migrations applied successfully");
        return Ok(());
    }

    if let Some(seed_file) = config.seed_file.as_deref() {
        let seeded = dev_seed::run(&store, seed_file).await?;
        info!(seeded, seed_file, "webhook subscriptions seeded");
    }

    let app_state = api_services::build_app_state(&config, &store)?;
    let app = api_router::build_router(app_state);

    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind {address}: {error}")))?;

    info!(
        %address,
        store = config.store.label(),
        disable_threshold = config.disable_threshold,
        backoff_base_ms = config.backoff_base_ms,
        "fieldops api listening"
    );

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("server error: {error}")))
}
