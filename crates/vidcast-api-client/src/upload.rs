//! Chunked upload of one local file to a signed container URL.
//!
//! The file is written as a sequence of blocks (`comp=block`) followed by a
//! single block list commit (`comp=blocklist`). Blocks go out strictly one
//! after another and only one block is held in memory at a time. Any failed
//! request ends the upload; nothing is retried.

use base64::Engine;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use vidcast_core::constants::DEFAULT_BLOCK_SIZE_BYTES;

const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 1024 * 1024 * 1024;
const DEFAULT_BLOCK_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("File too large: {size} bytes (maximum: {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("File is empty: {0}")]
    EmptyFile(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to send request: {0}")]
    Request(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct UploaderConfig {
    pub block_size: u64,
    /// Files of this size or larger are refused before any request is made.
    pub max_file_size_bytes: u64,
    /// Overall timeout of one block write or the commit.
    pub block_timeout: Duration,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE_BYTES,
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            block_timeout: Duration::from_secs(DEFAULT_BLOCK_TIMEOUT_SECS),
        }
    }
}

impl UploaderConfig {
    /// Read `UPLOAD_BLOCK_SIZE_BYTES`, `MAX_FILE_SIZE_BYTES` and
    /// `UPLOAD_BLOCK_TIMEOUT_SECS`, keeping defaults for unset values.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var("UPLOAD_BLOCK_SIZE_BYTES") {
            config.block_size = raw
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid UPLOAD_BLOCK_SIZE_BYTES '{}': {}", raw, e))?;
        }
        if let Ok(raw) = std::env::var("MAX_FILE_SIZE_BYTES") {
            config.max_file_size_bytes = raw
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid MAX_FILE_SIZE_BYTES '{}': {}", raw, e))?;
        }
        if let Ok(raw) = std::env::var("UPLOAD_BLOCK_TIMEOUT_SECS") {
            let secs: u64 = raw
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid UPLOAD_BLOCK_TIMEOUT_SECS '{}': {}", raw, e))?;
            config.block_timeout = Duration::from_secs(secs);
        }
        if config.block_size == 0 {
            anyhow::bail!("UPLOAD_BLOCK_SIZE_BYTES must be greater than 0");
        }
        Ok(config)
    }
}

/// Client-held state of one upload. Consumed by [`ChunkUploader::upload`].
#[derive(Debug)]
pub struct UploadSession {
    path: PathBuf,
    file_name: String,
    file_size: u64,
    submit_url: String,
    block_ids: Vec<String>,
    bytes_uploaded: u64,
}

impl UploadSession {
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Upload URL with the object name inserted before the signature.
    pub fn submit_url(&self) -> &str {
        &self.submit_url
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub file_name: String,
    pub bytes_uploaded: u64,
    pub block_count: usize,
}

type ProgressFn = Box<dyn Fn(u64, u64) + Send + Sync>;

pub struct ChunkUploader {
    client: Client,
    config: UploaderConfig,
    progress: Option<ProgressFn>,
}

/// Block id of the block at `index`: base64 of `block-` and the zero-padded position.
pub fn block_id(index: usize) -> String {
    base64::engine::general_purpose::STANDARD.encode(format!("block-{:010}", index))
}

pub fn block_list_xml(block_ids: &[String]) -> String {
    let mut xml = String::from("<?xml version='1.0' encoding='utf-8'?><BlockList>");
    for id in block_ids {
        xml.push_str("<Latest>");
        xml.push_str(id);
        xml.push_str("</Latest>");
    }
    xml.push_str("</BlockList>");
    xml
}

/// Insert `/{file_name}` between the container path and the query of `upload_url`.
pub fn submit_url(upload_url: &str, file_name: &str) -> Result<String, UploadError> {
    let (base, query) = upload_url.split_once('?').ok_or_else(|| {
        UploadError::InvalidInput("Upload URL carries no signature".to_string())
    })?;
    Ok(format!(
        "{}/{}?{}",
        base.trim_end_matches('/'),
        urlencoding::encode(file_name),
        query
    ))
}

fn content_type_for(file_name: &str) -> &'static str {
    match file_name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "mp4" => "video/mp4",
        Some(ext) if ext == "mov" => "video/quicktime",
        Some(ext) if ext == "wmv" => "video/x-ms-wmv",
        Some(ext) if ext == "avi" => "video/x-msvideo",
        Some(ext) if ext == "mkv" => "video/x-matroska",
        _ => "application/octet-stream",
    }
}

async fn check_status(response: reqwest::Response) -> Result<(), UploadError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(UploadError::Status {
        status: status.as_u16(),
        body,
    })
}

impl ChunkUploader {
    pub fn new(client: Client, config: UploaderConfig) -> Self {
        Self {
            client,
            config,
            progress: None,
        }
    }

    /// Report `(bytes_uploaded, total_bytes)` after every acknowledged block.
    pub fn with_progress(mut self, progress: impl Fn(u64, u64) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Name and size of a local file that may be uploaded.
    ///
    /// Fails with `FileTooLarge` or `EmptyFile` without touching the network.
    pub async fn inspect(&self, path: &Path) -> Result<(String, u64), UploadError> {
        if path
            .components()
            .any(|c| c == std::path::Component::ParentDir)
        {
            return Err(UploadError::InvalidInput(path.display().to_string()));
        }
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| UploadError::InvalidInput(path.display().to_string()))?
            .to_string();

        let file_size = tokio::fs::metadata(path).await?.len();
        if file_size >= self.config.max_file_size_bytes {
            return Err(UploadError::FileTooLarge {
                size: file_size,
                max: self.config.max_file_size_bytes,
            });
        }
        if file_size == 0 {
            return Err(UploadError::EmptyFile(file_name));
        }
        Ok((file_name, file_size))
    }

    /// Check the local file and prepare a session against `upload_url`,
    /// committing under the local file name.
    pub async fn begin_session(
        &self,
        path: &Path,
        upload_url: &str,
    ) -> Result<UploadSession, UploadError> {
        let (file_name, file_size) = self.inspect(path).await?;
        self.session(path, file_name, file_size, upload_url)
    }

    /// Like `begin_session` but commits under `file_name`, the name the
    /// server registered the upload with.
    pub async fn begin_session_as(
        &self,
        path: &Path,
        file_name: &str,
        upload_url: &str,
    ) -> Result<UploadSession, UploadError> {
        let (_, file_size) = self.inspect(path).await?;
        self.session(path, file_name.to_string(), file_size, upload_url)
    }

    fn session(
        &self,
        path: &Path,
        file_name: String,
        file_size: u64,
        upload_url: &str,
    ) -> Result<UploadSession, UploadError> {
        Ok(UploadSession {
            path: path.to_path_buf(),
            submit_url: submit_url(upload_url, &file_name)?,
            file_name,
            file_size,
            block_ids: Vec::new(),
            bytes_uploaded: 0,
        })
    }

    /// Write every block of the session's file, then commit the block list.
    #[tracing::instrument(skip(self, session), fields(file_name = %session.file_name, size_bytes = session.file_size))]
    pub async fn upload(&self, mut session: UploadSession) -> Result<UploadReceipt, UploadError> {
        let mut file = tokio::fs::File::open(&session.path).await?;

        while session.bytes_uploaded < session.file_size {
            let remaining = session.file_size - session.bytes_uploaded;
            let len = self.config.block_size.min(remaining) as usize;
            let mut block = vec![0u8; len];
            file.read_exact(&mut block).await?;

            let id = block_id(session.block_ids.len());
            let url = format!(
                "{}&comp=block&blockid={}",
                session.submit_url,
                urlencoding::encode(&id)
            );
            let response = self
                .client
                .put(&url)
                .timeout(self.config.block_timeout)
                .header("x-ms-blob-type", "BlockBlob")
                .body(block)
                .send()
                .await?;
            check_status(response).await?;

            session.block_ids.push(id);
            session.bytes_uploaded += len as u64;
            tracing::debug!(
                block = session.block_ids.len(),
                bytes_uploaded = session.bytes_uploaded,
                "Block written"
            );
            if let Some(progress) = &self.progress {
                progress(session.bytes_uploaded, session.file_size);
            }
        }

        let response = self
            .client
            .put(format!("{}&comp=blocklist", session.submit_url))
            .timeout(self.config.block_timeout)
            .header("x-ms-blob-content-type", content_type_for(&session.file_name))
            .body(block_list_xml(&session.block_ids))
            .send()
            .await?;
        check_status(response).await?;

        tracing::info!(blocks = session.block_ids.len(), "Upload committed");
        Ok(UploadReceipt {
            file_name: session.file_name,
            bytes_uploaded: session.bytes_uploaded,
            block_count: session.block_ids.len(),
        })
    }
}
