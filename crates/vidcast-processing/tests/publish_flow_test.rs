use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use vidcast_core::models::MediaProcessor;
use vidcast_core::AppError;
use vidcast_processing::video::{EncodeExecutor, EncodePreset};
use vidcast_processing::{
    encode_for_client, AssetRegistry, LocalTranscodeService, LocatorService, OrchestratorConfig,
    PublishPipeline, TranscodeError, TranscodeOrchestrator, VideoValidator,
};
use vidcast_storage::{BlobStore, InMemoryCatalog, LocalBlobStore, MediaCatalog, SasSigner};

const BLOCK: usize = 512 * 1024;

struct CopyEncoder;

#[async_trait]
impl EncodeExecutor for CopyEncoder {
    async fn encode(
        &self,
        input: &Path,
        output: &Path,
        _preset: &EncodePreset,
    ) -> Result<(), TranscodeError> {
        tokio::fs::copy(input, output).await?;
        Ok(())
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    catalog: Arc<InMemoryCatalog>,
    store: Arc<dyn BlobStore>,
    registry: AssetRegistry,
    pipeline: PublishPipeline,
}

async fn harness(max_file_size: u64) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Arc::new(InMemoryCatalog::new());
    let store: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(dir.path()).await.unwrap());
    let locators = Arc::new(LocatorService::new(
        catalog.clone(),
        SasSigner::new("devstoreaccount", "integration-key"),
        "http://localhost:4000".to_string(),
    ));
    let validator = VideoValidator::new(max_file_size, vec![".mp4".to_string(), ".mov".to_string()]);

    let processor = MediaProcessor {
        id: "mp-integration".to_string(),
        name: "Media Encoder".to_string(),
        version: "6.1".to_string(),
    };
    let service = LocalTranscodeService::new(
        processor,
        Arc::new(CopyEncoder),
        store.clone(),
        catalog.clone(),
        2,
    );
    let orchestrator = TranscodeOrchestrator::new(
        Arc::new(service),
        catalog.clone(),
        OrchestratorConfig {
            job_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(50),
            ..OrchestratorConfig::default()
        },
    );

    Harness {
        registry: AssetRegistry::new(
            validator.clone(),
            catalog.clone(),
            store.clone(),
            locators.clone(),
            1,
        ),
        pipeline: PublishPipeline::new(
            validator,
            catalog.clone(),
            store.clone(),
            locators,
            orchestrator,
            30,
        ),
        _dir: dir,
        catalog,
        store,
    }
}

fn query_params(url: &str) -> HashMap<String, String> {
    let (_, query) = url.split_once('?').unwrap();
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), urlencoding::decode(v).unwrap().into_owned()))
        .collect()
}

fn container_of(url: &str) -> String {
    let (path, _) = url.split_once('?').unwrap();
    path.rsplit('/').next().unwrap().to_string()
}

/// Stage `data` in 512 KiB blocks and commit them, the way the upload client does.
async fn upload_in_blocks(store: &dyn BlobStore, container: &str, object: &str, data: &[u8]) -> usize {
    let mut ids = Vec::new();
    for (index, chunk) in data.chunks(BLOCK).enumerate() {
        let id = format!("block-{:010}", index);
        store
            .put_block(container, object, &id, Bytes::copy_from_slice(chunk))
            .await
            .unwrap();
        ids.push(id);
    }
    let committed = store.commit_block_list(container, object, &ids).await.unwrap();
    assert_eq!(committed, data.len() as u64);
    ids.len()
}

#[tokio::test]
async fn test_upload_then_publish_yields_three_distinct_locators() {
    let h = harness(1024 * 1024 * 1024).await;
    let target = h.registry.begin_upload("clip.mp4").await.unwrap();
    let container = container_of(&target.upload_url);

    let data: Vec<u8> = (0..5 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
    let blocks = upload_in_blocks(h.store.as_ref(), &container, &target.file_name, &data).await;
    assert_eq!(blocks, 10);

    let result = h
        .pipeline
        .publish(&target.asset_id, "clip.mp4", &CancellationToken::new())
        .await
        .unwrap();

    let urls: Vec<String> = result.iter().map(|(_, l)| encode_for_client(l)).collect();
    assert_eq!(
        result.keys().collect::<Vec<_>>(),
        vec!["original", "renditionA", "renditionB"]
    );
    assert_eq!(urls.len(), 3);
    assert_ne!(urls[0], urls[1]);
    assert_ne!(urls[1], urls[2]);
    assert_ne!(urls[0], urls[2]);

    let original = result.get("original").unwrap();
    assert_eq!(original.path, format!("/blob/{}/clip.mp4", container));
    assert!(original.query.starts_with("?sv="));

    let upload_si: Uuid = query_params(&target.upload_url)["si"].parse().unwrap();
    assert!(h.catalog.get_locator(upload_si).await.unwrap().is_none());
}

#[tokio::test]
async fn test_committed_object_over_limit_is_deleted() {
    let h = harness(BLOCK as u64).await;
    let target = h.registry.begin_upload("clip.mov").await.unwrap();
    let container = container_of(&target.upload_url);

    let data = vec![7u8; BLOCK + 1];
    upload_in_blocks(h.store.as_ref(), &container, &target.file_name, &data).await;

    let err = h
        .pipeline
        .publish(&target.asset_id, "clip.mov", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::FileTooBig { .. }));
    assert!(h.store.object_size(&container, "clip.mov").await.is_err());
    assert!(!h.store.container_exists(&container).await.unwrap());
}

#[tokio::test]
async fn test_rejected_file_type_creates_nothing() {
    let h = harness(1024).await;
    let err = h.registry.begin_upload("clip.exe").await.unwrap_err();
    assert!(matches!(err, AppError::UnsupportedFileType(_)));
    assert_eq!(h.catalog.policy_count("Video Upload Access Policy").await, 0);
}
