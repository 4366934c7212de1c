use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use validator::Validate;

/// Request to start an upload
#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssetRequest {
    /// Original file name, including its extension
    #[validate(length(
        min = 1,
        max = 255,
        message = "File name must be between 1 and 255 characters"
    ))]
    pub file_name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssetResponse {
    pub asset_id: String,
    /// Sanitized file name; blocks are committed and published under it
    pub file_name: String,
    /// Signed container URL the client writes blocks to
    pub upload_url: String,
}

/// Request to publish a committed upload
#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    #[validate(length(min = 1, message = "Asset id is required"))]
    pub asset_id: String,
    #[validate(length(
        min = 1,
        max = 255,
        message = "File name must be between 1 and 255 characters"
    ))]
    pub file_name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PublishResponse {
    /// Percent-encoded URLs keyed by output name (`original`, `renditionA`, ...)
    pub locators: BTreeMap<String, String>,
}

/// Error body of the asset endpoints
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error_message: String,
}
