//! Route configuration and setup.

use crate::api_doc;
use crate::constants::{API_PREFIX, BLOB_PREFIX, MAX_BLOB_BODY_BYTES, MAX_JSON_BODY_BYTES};
use crate::handlers;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use vidcast_core::Config;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;

    let app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(&format!("{}/openapi.json", API_PREFIX), get(openapi_json))
        .merge(asset_routes())
        .merge(blob_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

fn asset_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/asset", API_PREFIX),
            post(handlers::asset::create_asset),
        )
        .route(
            &format!("{}/asset/publish", API_PREFIX),
            post(handlers::asset::publish_asset),
        )
        .layer(DefaultBodyLimit::max(MAX_JSON_BODY_BYTES))
}

fn blob_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/{{container}}/{{object}}", BLOB_PREFIX),
            put(handlers::blob::put_blob).get(handlers::blob::get_blob),
        )
        .layer(RequestBodyLimitLayer::new(MAX_BLOB_BODY_BYTES))
        .layer(DefaultBodyLimit::disable())
}

async fn openapi_json() -> impl IntoResponse {
    Json(api_doc::get_openapi_spec())
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [Method::GET, Method::POST, Method::PUT, Method::OPTIONS];
    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}
