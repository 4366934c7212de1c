//! Blob storage abstraction
//!
//! This module defines the `BlobStore` trait that every storage backend
//! implements, modelled on block-blob semantics: blocks are staged under a
//! client-chosen id and become an object only when a block list is committed.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use vidcast_core::AppError;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Invalid block list: {0}")]
    InvalidBlockList(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidKey(msg) | StorageError::InvalidBlockList(msg) => {
                AppError::InvalidInput(msg)
            }
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// A committed object inside a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub name: String,
    pub size_bytes: u64,
}

/// Blob storage abstraction trait
///
/// Container and object names are validated by every backend: containers are
/// lowercase alphanumerics and dashes, objects are single path segments that
/// do not start with `.`.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Create a container. Creating an existing container is a no-op.
    async fn create_container(&self, container: &str) -> StorageResult<()>;

    /// Delete a container with every object and staged block in it.
    /// Deleting a missing container is a no-op.
    async fn delete_container(&self, container: &str) -> StorageResult<()>;

    async fn container_exists(&self, container: &str) -> StorageResult<bool>;

    /// Stage one block of `object`. Re-staging the same id replaces it.
    async fn put_block(
        &self,
        container: &str,
        object: &str,
        block_id: &str,
        data: Bytes,
    ) -> StorageResult<()>;

    /// Assemble `object` from staged blocks in the given order and drop the
    /// staged blocks. Returns the committed size in bytes.
    async fn commit_block_list(
        &self,
        container: &str,
        object: &str,
        block_ids: &[String],
    ) -> StorageResult<u64>;

    /// Write a whole object in one call.
    async fn put_object(&self, container: &str, object: &str, data: Bytes) -> StorageResult<()>;

    async fn get_object(&self, container: &str, object: &str) -> StorageResult<Bytes>;

    /// Live size of a committed object. `NotFound` if it was never committed.
    async fn object_size(&self, container: &str, object: &str) -> StorageResult<u64>;

    /// Committed objects of a container, sorted by name.
    async fn list_objects(&self, container: &str) -> StorageResult<Vec<ObjectInfo>>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
