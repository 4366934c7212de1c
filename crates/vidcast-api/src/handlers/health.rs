//! Health check handler.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

const STORAGE_CHECK_TIMEOUT: Duration = Duration::from_secs(5);
const HEALTH_CHECK_CONTAINER: &str = "health-check";

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `ok`, `degraded` (credentials missing) or `unhealthy` (storage unreachable)
    pub status: String,
    pub storage: String,
    pub credentials: String,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse),
        (status = 503, description = "Storage unreachable", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let storage = match tokio::time::timeout(
        STORAGE_CHECK_TIMEOUT,
        state.store.container_exists(HEALTH_CHECK_CONTAINER),
    )
    .await
    {
        Ok(Ok(_)) => "healthy".to_string(),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Storage health check failed");
            format!("unhealthy: {}", e)
        }
        Err(_) => {
            tracing::error!("Storage health check timed out");
            "timeout".to_string()
        }
    };
    let storage_ok = storage == "healthy";
    let credentials_ok = state.config.credentials_configured();

    let (code, status) = match (storage_ok, credentials_ok) {
        (true, true) => (StatusCode::OK, "ok"),
        (true, false) => (StatusCode::OK, "degraded"),
        (false, _) => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy"),
    };

    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            storage,
            credentials: if credentials_ok { "configured" } else { "missing" }.to_string(),
        }),
    )
}
