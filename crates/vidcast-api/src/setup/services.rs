//! Service initialization and application state setup

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use vidcast_core::models::MediaProcessor;
use vidcast_core::Config;
use vidcast_processing::video::{FfmpegEncoder, TranscodeService};
use vidcast_processing::{
    AssetRegistry, LocalTranscodeService, LocatorService, OrchestratorConfig, PublishPipeline,
    TranscodeOrchestrator, VideoValidator,
};
use vidcast_storage::{BlobStore, InMemoryCatalog, MediaCatalog, SasSigner};

use crate::state::AppState;

/// Reported when `ffmpeg -version` cannot be read; jobs still run and fail
/// individually if the binary is really missing.
const UNKNOWN_ENCODER_VERSION: &str = "0.0.0";

/// Build the transcode service backed by the local ffmpeg binary.
pub async fn setup_transcoder(
    config: &Config,
    store: Arc<dyn BlobStore>,
    catalog: Arc<dyn MediaCatalog>,
) -> Arc<dyn TranscodeService> {
    let encoder = FfmpegEncoder::new(config.ffmpeg_path());
    let version = match encoder.detect_version().await {
        Ok(version) => version,
        Err(e) => {
            tracing::warn!(
                error = %e,
                ffmpeg_path = %config.ffmpeg_path(),
                "Could not determine ffmpeg version"
            );
            UNKNOWN_ENCODER_VERSION.to_string()
        }
    };
    let processor = MediaProcessor {
        id: format!("nb:mpid:UUID:{}", Uuid::new_v4()),
        name: config.encoder_processor_name().to_string(),
        version,
    };
    tracing::info!(
        processor = %processor.name,
        version = %processor.version,
        max_concurrent_jobs = config.max_concurrent_jobs(),
        "Transcode service initialized"
    );

    Arc::new(LocalTranscodeService::new(
        processor,
        Arc::new(encoder),
        store,
        catalog,
        config.max_concurrent_jobs(),
    ))
}

/// Wire the pipeline services around an existing blob store and transcoder.
pub fn build_state(
    config: &Config,
    store: Arc<dyn BlobStore>,
    catalog: Arc<dyn MediaCatalog>,
    transcoder: Arc<dyn TranscodeService>,
) -> Arc<AppState> {
    let signer = SasSigner::new(config.storage_account_name(), config.storage_account_key());
    let validator = VideoValidator::from_config(config);
    let locators = Arc::new(LocatorService::new(
        catalog.clone(),
        signer.clone(),
        config.public_base_url().to_string(),
    ));

    let registry = AssetRegistry::new(
        validator.clone(),
        catalog.clone(),
        store.clone(),
        locators.clone(),
        config.upload_locator_valid_for_hours(),
    );
    let orchestrator = TranscodeOrchestrator::new(
        transcoder,
        catalog.clone(),
        OrchestratorConfig::from_config(config),
    );
    let pipeline = PublishPipeline::new(
        validator,
        catalog.clone(),
        store.clone(),
        locators,
        orchestrator,
        config.video_available_for_days(),
    );

    Arc::new(AppState {
        config: config.clone(),
        catalog,
        store,
        signer,
        registry,
        pipeline,
        shutdown: CancellationToken::new(),
    })
}

pub async fn initialize_services(
    config: &Config,
    store: Arc<dyn BlobStore>,
) -> anyhow::Result<Arc<AppState>> {
    let catalog: Arc<dyn MediaCatalog> = Arc::new(InMemoryCatalog::new());
    let transcoder = setup_transcoder(config, store.clone(), catalog.clone()).await;

    let renditions: Vec<&str> = config.renditions().iter().map(|r| r.key.as_str()).collect();
    anyhow::ensure!(!renditions.is_empty(), "At least one rendition must be configured");
    let state = build_state(config, store, catalog, transcoder);

    tracing::info!(
        renditions = %renditions.join(","),
        upload_locator_valid_for_hours = config.upload_locator_valid_for_hours(),
        video_available_for_days = config.video_available_for_days(),
        "Pipeline services initialized"
    );
    Ok(state)
}
