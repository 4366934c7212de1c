//! Domain methods for the Vidcast API client.
//!
//! Request and response types are shared with the server through
//! `vidcast_core::models`.

use crate::upload::{ChunkUploader, UploadReceipt};
use crate::ApiClient;
use anyhow::{Context, Result};
use std::path::Path;
use vidcast_core::models::{
    CreateAssetRequest, CreateAssetResponse, PublishRequest, PublishResponse,
};

/// Outcome of a full upload: the registered asset, what was written and the
/// published locators.
#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    pub asset_id: String,
    pub bytes_uploaded: u64,
    pub block_count: usize,
    pub locators: std::collections::BTreeMap<String, String>,
}

impl ApiClient {
    /// Register an upload and obtain its signed upload URL.
    pub async fn create_asset(&self, file_name: &str) -> Result<CreateAssetResponse> {
        self.post_json(
            "/asset",
            &CreateAssetRequest {
                file_name: file_name.to_string(),
            },
        )
        .await
    }

    /// Publish a committed upload. Blocks until the encode job has finished.
    pub async fn publish(&self, asset_id: &str, file_name: &str) -> Result<PublishResponse> {
        self.post_json_with_timeout(
            "/asset/publish",
            &PublishRequest {
                asset_id: asset_id.to_string(),
                file_name: file_name.to_string(),
            },
            self.publish_timeout(),
        )
        .await
    }

    /// Register, upload in blocks and publish a local video file.
    pub async fn upload_video(&self, path: &Path, uploader: &ChunkUploader) -> Result<UploadOutcome> {
        let (local_name, _) = uploader
            .inspect(path)
            .await
            .with_context(|| format!("Cannot upload {}", path.display()))?;

        let created = self.create_asset(&local_name).await?;
        tracing::info!(
            asset_id = %created.asset_id,
            file_name = %created.file_name,
            "Upload registered"
        );

        let session = uploader
            .begin_session_as(path, &created.file_name, &created.upload_url)
            .await
            .with_context(|| format!("Failed to start upload of {}", path.display()))?;
        let UploadReceipt {
            file_name,
            bytes_uploaded,
            block_count,
        } = uploader
            .upload(session)
            .await
            .with_context(|| format!("Failed to upload {}", path.display()))?;

        let published = self.publish(&created.asset_id, &file_name).await?;
        Ok(UploadOutcome {
            asset_id: created.asset_id,
            bytes_uploaded,
            block_count,
            locators: published.locators,
        })
    }
}
