//! Upload registration: one asset, one container and one short-lived write
//! capability per incoming file.

use chrono::{Duration, Utc};
use std::sync::Arc;
use vidcast_core::constants::{
    ORIGINAL_ASSET_PREFIX, UPLOAD_LOCATOR_BACKDATE_MINUTES, UPLOAD_LOCATOR_NAME,
    UPLOAD_POLICY_NAME,
};
use vidcast_core::models::{AssetId, Permissions};
use vidcast_core::AppError;
use vidcast_storage::{BlobStore, MediaCatalog};

use crate::locator::LocatorService;
use crate::policy_cache::PolicyCache;
use crate::validator::VideoValidator;

/// Where the client should upload its blocks.
#[derive(Debug, Clone)]
pub struct UploadTarget {
    pub asset_id: AssetId,
    /// Sanitized file name; the object name the client must commit.
    pub file_name: String,
    /// Signed container URL with write permission.
    pub upload_url: String,
}

pub struct AssetRegistry {
    validator: VideoValidator,
    catalog: Arc<dyn MediaCatalog>,
    store: Arc<dyn BlobStore>,
    policies: PolicyCache,
    locators: Arc<LocatorService>,
    upload_valid_for_hours: i64,
}

impl AssetRegistry {
    pub fn new(
        validator: VideoValidator,
        catalog: Arc<dyn MediaCatalog>,
        store: Arc<dyn BlobStore>,
        locators: Arc<LocatorService>,
        upload_valid_for_hours: i64,
    ) -> Self {
        Self {
            validator,
            policies: PolicyCache::new(catalog.clone()),
            catalog,
            store,
            locators,
            upload_valid_for_hours,
        }
    }

    /// Create an asset for `file_name` and a write capability scoped to its
    /// container. Nothing is created when the file type is rejected.
    #[tracing::instrument(skip(self))]
    pub async fn begin_upload(&self, file_name: &str) -> Result<UploadTarget, AppError> {
        let file_name = self.validator.validate_file_name(file_name)?;

        let asset = self
            .catalog
            .create_asset(&format!("{} - {}", ORIGINAL_ASSET_PREFIX, file_name))
            .await?;
        self.store.create_container(&asset.container).await?;
        let asset = self.catalog.add_file(&asset.id, &file_name).await?;

        let policy = self
            .policies
            .get_or_create(
                UPLOAD_POLICY_NAME,
                self.upload_valid_for_hours * 60,
                Permissions::WRITE,
            )
            .await?;
        let starts_at = Utc::now() - Duration::minutes(UPLOAD_LOCATOR_BACKDATE_MINUTES);
        let locator = self
            .locators
            .issue(&asset, &policy, UPLOAD_LOCATOR_NAME, starts_at)
            .await?;

        tracing::info!(
            asset_id = %asset.id,
            container = %asset.container,
            file_name = %file_name,
            expires_at = %locator.expires_at,
            "Upload registered"
        );

        Ok(UploadTarget {
            asset_id: asset.id,
            file_name,
            upload_url: locator.path,
        })
    }
}
