//! Application setup and initialization

pub mod routes;
pub mod server;
pub mod services;
pub mod storage;

use crate::state::AppState;
use anyhow::{Context, Result};
use std::sync::Arc;
use vidcast_core::Config;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Validate configuration first - fail fast on misconfiguration
    config.validate().context("Configuration validation failed")?;

    crate::telemetry::init_telemetry();

    tracing::info!(
        environment = %config.environment(),
        credentials_configured = config.credentials_configured(),
        "Configuration loaded and validated successfully"
    );

    let store = storage::setup_storage(&config).await?;
    let state = services::initialize_services(&config, store).await?;
    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
