use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use vidcast_api_client::upload::{block_id, block_list_xml};
use vidcast_api_client::{ApiClient, ChunkUploader, UploadError, UploaderConfig};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn write_file(dir: &TempDir, name: &str, data: &[u8]) -> PathBuf {
    let file = dir.path().join(name);
    std::fs::write(&file, data).unwrap();
    file
}

fn uploader(block_size: u64, max_file_size_bytes: u64) -> ChunkUploader {
    ChunkUploader::new(
        reqwest::Client::new(),
        UploaderConfig {
            block_size,
            max_file_size_bytes,
            ..UploaderConfig::default()
        },
    )
}

fn upload_url(server: &MockServer) -> String {
    format!(
        "{}/blob/asset-1?sv=2024-01-01&sr=c&si=loc-1&sp=w&sig=abc",
        server.uri()
    )
}

fn query_value(request: &wiremock::Request, key: &str) -> Option<String> {
    request
        .url
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

#[tokio::test]
async fn test_uploads_blocks_in_order_then_commits_once() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/blob/asset-1/clip.mp4"))
        .and(query_param("comp", "block"))
        .and(query_param("sig", "abc"))
        .and(header("x-ms-blob-type", "BlockBlob"))
        .respond_with(ResponseTemplate::new(201))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/blob/asset-1/clip.mp4"))
        .and(query_param("comp", "blocklist"))
        .and(header("x-ms-blob-content-type", "video/mp4"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let file = write_file(&dir, "clip.mp4", b"0123456789");
    let progress = Arc::new(Mutex::new(Vec::new()));
    let seen = progress.clone();
    let uploader = uploader(4, 1024).with_progress(move |done, total| {
        seen.lock().unwrap().push((done, total));
    });

    let session = uploader
        .begin_session(&file, &upload_url(&server))
        .await
        .unwrap();
    let receipt = uploader.upload(session).await.unwrap();

    assert_eq!(receipt.bytes_uploaded, 10);
    assert_eq!(receipt.block_count, 3);
    assert_eq!(*progress.lock().unwrap(), vec![(4, 10), (8, 10), (10, 10)]);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 4);
    let bodies: Vec<&[u8]> = requests[..3].iter().map(|r| r.body.as_slice()).collect();
    assert_eq!(bodies, vec![&b"0123"[..], &b"4567"[..], &b"89"[..]]);
    let ids: Vec<String> = requests[..3]
        .iter()
        .map(|r| query_value(r, "blockid").unwrap())
        .collect();
    assert_eq!(ids, vec![block_id(0), block_id(1), block_id(2)]);

    let commit = &requests[3];
    assert_eq!(query_value(commit, "comp").as_deref(), Some("blocklist"));
    assert_eq!(String::from_utf8_lossy(&commit.body), block_list_xml(&ids));
}

#[tokio::test]
async fn test_file_smaller_than_one_block_is_a_single_block() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let file = write_file(&dir, "clip.mov", b"tiny");
    let uploader = uploader(512 * 1024, 1024);

    let session = uploader
        .begin_session(&file, &upload_url(&server))
        .await
        .unwrap();
    assert!(session.submit_url().contains("/blob/asset-1/clip.mov?sv="));
    let receipt = uploader.upload(session).await.unwrap();

    assert_eq!(receipt.block_count, 1);
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].body, b"tiny");
}

#[tokio::test]
async fn test_oversized_file_is_refused_before_any_request() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let file = write_file(&dir, "clip.mp4", &[7u8; 16]);

    let err = uploader(4, 16)
        .begin_session(&file, &upload_url(&server))
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::FileTooLarge { size: 16, max: 16 }));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_file_is_refused() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let file = write_file(&dir, "clip.mp4", b"");

    let err = uploader(4, 16)
        .begin_session(&file, &upload_url(&server))
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::EmptyFile(_)));
}

#[tokio::test]
async fn test_failed_block_aborts_without_retry_or_commit() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(query_param("comp", "block"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Signature has been revoked"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(query_param("comp", "blocklist"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let file = write_file(&dir, "clip.mp4", b"0123456789");
    let uploader = uploader(4, 1024);
    let session = uploader
        .begin_session(&file, &upload_url(&server))
        .await
        .unwrap();

    let err = uploader.upload(session).await.unwrap_err();
    match err {
        UploadError::Status { status, body } => {
            assert_eq!(status, 403);
            assert_eq!(body, "Signature has been revoked");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_api_client_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/asset"))
        .and(body_json(serde_json::json!({ "fileName": "clip.mp4" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "assetId": "nb:cid:UUID:1",
            "fileName": "clip.mp4",
            "uploadUrl": upload_url(&server),
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/asset/publish"))
        .and(body_json(serde_json::json!({
            "assetId": "nb:cid:UUID:1",
            "fileName": "clip.mp4",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "locators": {
                "original": "http://localhost:4000/blob/asset-1/clip.mp4?sv=2024-01-01&sig=a",
                "renditionA": "http://localhost:4000/blob/asset-2/clip_1280x720_3400.mp4?sv=2024-01-01&sig=b",
                "renditionB": "http://localhost:4000/blob/asset-3/clip_1280x720_3400_640x360_1500.mp4?sv=2024-01-01&sig=c",
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let file = write_file(&dir, "clip.mp4", b"0123456789");
    let client = ApiClient::new(format!("{}/", server.uri())).unwrap();

    let outcome = client
        .upload_video(&file, &uploader(4, 1024))
        .await
        .unwrap();

    assert_eq!(outcome.asset_id, "nb:cid:UUID:1");
    assert_eq!(outcome.block_count, 3);
    assert_eq!(
        outcome.locators.keys().collect::<Vec<_>>(),
        vec!["original", "renditionA", "renditionB"]
    );
}

#[tokio::test]
async fn test_api_error_surfaces_status_and_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/asset"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "errorMessage": "Unsupported file type: .exe"
        })))
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri()).unwrap();
    let err = client.create_asset("clip.exe").await.unwrap_err();

    let message = err.to_string();
    assert!(message.contains("status 400"));
    assert!(message.contains("Unsupported file type"));
}

#[tokio::test]
async fn test_upload_video_checks_size_before_registering() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let file = write_file(&dir, "clip.mp4", &[1u8; 32]);
    let client = ApiClient::new(server.uri()).unwrap();

    let err = client
        .upload_video(&file, &uploader(4, 8))
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<UploadError>(),
        Some(UploadError::FileTooLarge { size: 32, max: 8 })
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_publish_may_outlast_the_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/asset"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({
                    "assetId": "nb:cid:UUID:1",
                    "fileName": "clip.mp4",
                    "uploadUrl": upload_url(&server),
                }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/asset/publish"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "locators": {} }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri())
        .unwrap()
        .with_request_timeout(Duration::from_millis(100))
        .with_publish_timeout(Duration::from_secs(10));

    assert!(client.create_asset("clip.mp4").await.is_err());
    let published = client.publish("nb:cid:UUID:1", "clip.mp4").await.unwrap();
    assert!(published.locators.is_empty());
}

#[tokio::test]
async fn test_upload_video_commits_under_the_registered_name() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/asset"))
        .and(body_json(serde_json::json!({ "fileName": "my<clip>.mp4" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "assetId": "nb:cid:UUID:1",
            "fileName": "myclip.mp4",
            "uploadUrl": upload_url(&server),
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/blob/asset-1/myclip.mp4"))
        .respond_with(ResponseTemplate::new(201))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/asset/publish"))
        .and(body_json(serde_json::json!({
            "assetId": "nb:cid:UUID:1",
            "fileName": "myclip.mp4",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "locators": {} })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let file = write_file(&dir, "my<clip>.mp4", b"0123");
    let client = ApiClient::new(server.uri()).unwrap();

    let outcome = client
        .upload_video(&file, &uploader(4, 1024))
        .await
        .unwrap();

    assert_eq!(outcome.block_count, 1);
    let puts: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.as_str() == "PUT")
        .map(|r| r.url.path().to_string())
        .collect();
    assert_eq!(puts, vec!["/blob/asset-1/myclip.mp4"; 2]);
}
