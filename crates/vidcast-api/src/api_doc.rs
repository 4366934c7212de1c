//! OpenAPI documentation, served at `/api/openapi.json`.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use vidcast_core::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Vidcast API",
        version = "0.1.0",
        description = "Chunked video upload and publish. Register an upload to get a signed container URL, write the file in blocks, then publish to encode it and receive streaming locators."
    ),
    paths(
        handlers::asset::create_asset,
        handlers::asset::publish_asset,
        handlers::health::health_check,
    ),
    components(schemas(
        models::CreateAssetRequest,
        models::CreateAssetResponse,
        models::PublishRequest,
        models::PublishResponse,
        models::ErrorBody,
        handlers::health::HealthResponse,
        error::ErrorResponse,
    )),
    tags(
        (name = "assets", description = "Upload registration and publishing"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
