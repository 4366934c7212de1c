//! Publish coordinator.
//!
//! Runs the post-upload steps for one asset in order and stops at the first
//! failure: file-name check, asset lookup, size guard, primary file, upload
//! locator revocation, encode job, then one read locator per output.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use vidcast_core::constants::{ORIGINAL_OUTPUT_KEY, UPLOAD_LOCATOR_NAME};
use vidcast_core::models::{Asset, AssetId, PublishResult};
use vidcast_core::AppError;
use vidcast_storage::{BlobStore, MediaCatalog};

use crate::locator::{find_rendition_object, LocatorService};
use crate::size_guard::SizeGuard;
use crate::validator::VideoValidator;
use crate::video::TranscodeOrchestrator;

pub struct PublishPipeline {
    validator: VideoValidator,
    catalog: Arc<dyn MediaCatalog>,
    store: Arc<dyn BlobStore>,
    size_guard: SizeGuard,
    locators: Arc<LocatorService>,
    orchestrator: TranscodeOrchestrator,
    video_available_for_days: i64,
}

impl PublishPipeline {
    pub fn new(
        validator: VideoValidator,
        catalog: Arc<dyn MediaCatalog>,
        store: Arc<dyn BlobStore>,
        locators: Arc<LocatorService>,
        orchestrator: TranscodeOrchestrator,
        video_available_for_days: i64,
    ) -> Self {
        let size_guard = SizeGuard::new(store.clone(), catalog.clone(), validator.max_file_size());
        Self {
            validator,
            catalog,
            store,
            size_guard,
            locators,
            orchestrator,
            video_available_for_days,
        }
    }

    #[tracing::instrument(skip(self, cancel), fields(asset_id = %asset_id))]
    pub async fn publish(
        &self,
        asset_id: &AssetId,
        file_name: &str,
        cancel: &CancellationToken,
    ) -> Result<PublishResult, AppError> {
        let start = std::time::Instant::now();
        let file_name = self.validator.validate_file_name(file_name)?;

        let asset = self.load_asset(asset_id).await?;
        let size = self.size_guard.enforce(&asset, &file_name).await?;
        let asset = self.catalog.set_primary_file(&asset.id, &file_name).await?;
        self.locators.revoke(&asset, UPLOAD_LOCATOR_NAME).await?;

        let outputs = self.orchestrator.transcode(&asset, &file_name, cancel).await?;

        let mut result = PublishResult::new();
        result.insert(
            ORIGINAL_OUTPUT_KEY,
            self.locators
                .build_locator(&asset, &file_name, self.video_available_for_days)
                .await?,
        );
        for (key, output_id) in outputs {
            let output = self.load_asset(&output_id).await?;
            let objects = self.store.list_objects(&output.container).await?;
            let object = find_rendition_object(&objects).ok_or_else(|| {
                AppError::Transcode(format!(
                    "Output asset {} for '{}' has no video object",
                    output.id, key
                ))
            })?;
            let locator = self
                .locators
                .build_locator(&output, &object.name, self.video_available_for_days)
                .await?;
            result.insert(key, locator);
        }

        tracing::info!(
            size_bytes = size,
            locators = result.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Asset published"
        );
        Ok(result)
    }

    async fn load_asset(&self, asset_id: &AssetId) -> Result<Asset, AppError> {
        self.catalog
            .get_asset(asset_id)
            .await?
            .filter(|asset| !asset.is_destroyed())
            .ok_or_else(|| AppError::AssetNotFound(asset_id.to_string()))
    }
}
