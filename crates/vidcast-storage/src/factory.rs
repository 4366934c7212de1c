#[cfg(feature = "storage-local")]
use crate::LocalBlobStore;
#[cfg(feature = "storage-object")]
use crate::ObjectBlobStore;
use crate::{BlobStore, StorageBackend, StorageError, StorageResult};
use std::sync::Arc;
use vidcast_core::Config;

/// Create a blob store based on configuration
pub async fn create_blob_store(config: &Config) -> StorageResult<Arc<dyn BlobStore>> {
    match config.storage_backend() {
        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let base_path = config.local_storage_path().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
            })?;
            let store = LocalBlobStore::new(base_path).await?;
            Ok(Arc::new(store))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-object")]
        StorageBackend::Memory => Ok(Arc::new(ObjectBlobStore::in_memory())),

        #[cfg(feature = "storage-object")]
        StorageBackend::S3 => {
            let bucket = config
                .s3_bucket()
                .ok_or_else(|| StorageError::ConfigError("S3_BUCKET not configured".to_string()))?;
            let region = config.s3_region().ok_or_else(|| {
                StorageError::ConfigError("S3_REGION or AWS_REGION not configured".to_string())
            })?;
            Ok(Arc::new(ObjectBlobStore::s3(bucket, region)?))
        }

        #[cfg(not(feature = "storage-object"))]
        StorageBackend::Memory | StorageBackend::S3 => Err(StorageError::ConfigError(
            "Object storage backends not available (storage-object feature not enabled)"
                .to_string(),
        )),
    }
}
