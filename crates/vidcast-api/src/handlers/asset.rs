//! Asset endpoints: register an upload and publish it.

use crate::error::{AssetApiError, AssetJson};
use crate::state::AppState;
use axum::{extract::State, Json};
use std::sync::Arc;
use validator::Validate;
use vidcast_core::models::{
    AssetId, CreateAssetRequest, CreateAssetResponse, ErrorBody, PublishRequest, PublishResponse,
};
use vidcast_processing::encode_for_client;

/// Create an asset and a signed upload URL for one video file
#[utoipa::path(
    post,
    path = "/api/asset",
    tag = "assets",
    request_body = CreateAssetRequest,
    responses(
        (status = 200, description = "Upload registered", body = CreateAssetResponse),
        (status = 400, description = "Rejected", body = ErrorBody)
    )
)]
#[tracing::instrument(
    skip(state, request),
    fields(file_name = %request.file_name, operation = "create_asset")
)]
pub async fn create_asset(
    State(state): State<Arc<AppState>>,
    AssetJson(request): AssetJson<CreateAssetRequest>,
) -> Result<Json<CreateAssetResponse>, AssetApiError> {
    request.validate()?;

    let target = state.registry.begin_upload(&request.file_name).await?;

    Ok(Json(CreateAssetResponse {
        asset_id: target.asset_id.to_string(),
        file_name: target.file_name,
        upload_url: target.upload_url,
    }))
}

/// Validate a committed upload, encode it and return streaming locators
#[utoipa::path(
    post,
    path = "/api/asset/publish",
    tag = "assets",
    request_body = PublishRequest,
    responses(
        (status = 200, description = "Asset published", body = PublishResponse),
        (status = 400, description = "Publish failed", body = ErrorBody)
    )
)]
#[tracing::instrument(
    skip(state, request),
    fields(asset_id = %request.asset_id, file_name = %request.file_name, operation = "publish_asset")
)]
pub async fn publish_asset(
    State(state): State<Arc<AppState>>,
    AssetJson(request): AssetJson<PublishRequest>,
) -> Result<Json<PublishResponse>, AssetApiError> {
    request.validate()?;

    let asset_id = AssetId::from(request.asset_id);
    let cancel = state.shutdown.child_token();
    let result = state
        .pipeline
        .publish(&asset_id, &request.file_name, &cancel)
        .await?;

    let locators = result
        .iter()
        .map(|(key, locator)| (key.to_string(), encode_for_client(locator)))
        .collect();
    Ok(Json(PublishResponse { locators }))
}
