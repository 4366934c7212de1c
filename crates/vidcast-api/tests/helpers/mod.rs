//! Test helpers: build AppState and router for integration tests.
//!
//! Everything runs in memory; the encoder copies its input so no ffmpeg
//! binary is needed.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use axum_test::TestServer;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use vidcast_api::setup::{routes, services};
use vidcast_api::AppState;
use vidcast_core::models::MediaProcessor;
use vidcast_core::{Config, PipelineConfig};
use vidcast_processing::video::{EncodeExecutor, EncodePreset};
use vidcast_processing::{LocalTranscodeService, TranscodeError};
use vidcast_storage::{BlobStore, InMemoryCatalog, MediaCatalog, ObjectBlobStore};

pub const BASE_URL: &str = "http://localhost:4000";

pub struct CopyEncoder;

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

pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
}

pub use vidcast_api_client::upload::{block_id, block_list_xml};

pub fn test_config(max_file_size_bytes: u64) -> Config {
    config_for(BASE_URL, max_file_size_bytes)
}

fn config_for(public_base_url: &str, max_file_size_bytes: u64) -> Config {
    Config::from(PipelineConfig {
        public_base_url: public_base_url.to_string(),
        max_file_size_bytes,
        job_timeout_secs: 10,
        job_poll_interval_ms: 20,
        ..PipelineConfig::default()
    })
}

fn build_app(config: &Config) -> (Router, Arc<AppState>) {
    let store: Arc<dyn BlobStore> = Arc::new(ObjectBlobStore::in_memory());
    let catalog: Arc<dyn MediaCatalog> = Arc::new(InMemoryCatalog::new());
    let processor = MediaProcessor {
        id: "mp-test".to_string(),
        name: config.encoder_processor_name().to_string(),
        version: "6.1".to_string(),
    };
    let transcoder = Arc::new(LocalTranscodeService::new(
        processor,
        Arc::new(CopyEncoder),
        store.clone(),
        catalog.clone(),
        2,
    ));
    let state = services::build_state(config, store, catalog, transcoder);
    let router = routes::setup_routes(config, state.clone()).expect("routes");
    (router, state)
}

pub fn setup_test_app(config: Config) -> TestApp {
    let (router, state) = build_app(&config);
    TestApp {
        server: TestServer::new(router).expect("test server"),
        state,
    }
}

/// The API served over a real socket. Stops serving when dropped.
pub struct LiveApp {
    pub base_url: String,
    pub state: Arc<AppState>,
    shutdown: CancellationToken,
}

impl Drop for LiveApp {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Bind an ephemeral port and serve the router on it. Signed URLs handed
/// out by the API point at that port.
pub async fn spawn_app(max_file_size_bytes: u64) -> LiveApp {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let base_url = format!("http://{}", listener.local_addr().expect("local addr"));
    let (router, state) = build_app(&config_for(&base_url, max_file_size_bytes));

    let shutdown = CancellationToken::new();
    let stop = shutdown.clone();
    tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { stop.cancelled().await })
            .await
    });

    LiveApp {
        base_url,
        state,
        shutdown,
    }
}

/// Split an absolute URL into a server-relative path and its decoded query pairs.
pub fn split_url(url: &str) -> (String, Vec<(String, String)>) {
    let relative = url.strip_prefix(BASE_URL).expect("URL under the test base");
    let (path, query) = relative.split_once('?').unwrap_or((relative, ""));
    let params = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), urlencoding::decode(v).unwrap().into_owned()))
        .collect();
    (path.to_string(), params)
}

/// Register `file_name` and upload `data` in `block_size` blocks through the gateway.
/// Returns the asset id.
pub async fn upload(server: &TestServer, file_name: &str, data: &[u8], block_size: usize) -> String {
    let response = server
        .post("/api/asset")
        .json(&serde_json::json!({ "fileName": file_name }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let asset_id = body["assetId"].as_str().unwrap().to_string();
    let (container_path, params) = split_url(body["uploadUrl"].as_str().unwrap());
    let object_path = format!("{}/{}", container_path, file_name);

    let mut ids = Vec::new();
    for (index, chunk) in data.chunks(block_size).enumerate() {
        let id = block_id(index);
        let mut query = params.clone();
        query.push(("comp".to_string(), "block".to_string()));
        query.push(("blockid".to_string(), id.clone()));
        server
            .put(&object_path)
            .add_query_params(&query)
            .add_header("x-ms-blob-type", "BlockBlob")
            .bytes(chunk.to_vec().into())
            .await
            .assert_status(axum::http::StatusCode::CREATED);
        ids.push(id);
    }

    let mut query = params.clone();
    query.push(("comp".to_string(), "blocklist".to_string()));
    server
        .put(&object_path)
        .add_query_params(&query)
        .add_header("x-ms-blob-content-type", "video/mp4")
        .text(block_list_xml(&ids))
        .await
        .assert_status(axum::http::StatusCode::CREATED);

    asset_id
}
