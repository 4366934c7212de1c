//! Post-upload size enforcement.
//!
//! The client checks the size before uploading, but the committed object is
//! the only thing that can be trusted. Oversized uploads are destroyed:
//! detect, delete the whole container, then report.

use std::sync::Arc;
use vidcast_core::models::Asset;
use vidcast_core::AppError;
use vidcast_storage::{BlobStore, MediaCatalog, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeVerdict {
    Allowed { size: u64 },
    /// The container has been deleted and the asset marked destroyed.
    Rejected { size: u64 },
}

pub struct SizeGuard {
    store: Arc<dyn BlobStore>,
    catalog: Arc<dyn MediaCatalog>,
    max_file_size: u64,
}

impl SizeGuard {
    pub fn new(store: Arc<dyn BlobStore>, catalog: Arc<dyn MediaCatalog>, max_file_size: u64) -> Self {
        Self {
            store,
            catalog,
            max_file_size,
        }
    }

    #[tracing::instrument(skip(self, asset), fields(asset_id = %asset.id, container = %asset.container))]
    pub async fn check(&self, asset: &Asset, file_name: &str) -> Result<SizeVerdict, AppError> {
        let size = match self.store.object_size(&asset.container, file_name).await {
            Ok(size) => size,
            Err(StorageError::NotFound(_)) | Err(StorageError::ContainerNotFound(_)) => {
                return Err(AppError::EmptyBlob(format!("{}/{}", asset.container, file_name)));
            }
            Err(e) => return Err(e.into()),
        };

        if size < self.max_file_size {
            tracing::debug!(size_bytes = size, max_bytes = self.max_file_size, "Upload size accepted");
            return Ok(SizeVerdict::Allowed { size });
        }

        tracing::warn!(
            size_bytes = size,
            max_bytes = self.max_file_size,
            "Upload exceeds maximum size, deleting container"
        );
        self.store.delete_container(&asset.container).await?;
        self.catalog.mark_destroyed(&asset.id).await?;
        Ok(SizeVerdict::Rejected { size })
    }

    /// `true` when the committed object is below the maximum. On `false`
    /// the container is already gone.
    pub async fn validate_size(&self, asset: &Asset, file_name: &str) -> Result<bool, AppError> {
        Ok(matches!(
            self.check(asset, file_name).await?,
            SizeVerdict::Allowed { .. }
        ))
    }

    /// Like `validate_size` but reports a rejection as `FileTooBig`.
    pub async fn enforce(&self, asset: &Asset, file_name: &str) -> Result<u64, AppError> {
        match self.check(asset, file_name).await? {
            SizeVerdict::Allowed { size } => Ok(size),
            SizeVerdict::Rejected { size } => Err(AppError::FileTooBig {
                size,
                max: self.max_file_size,
            }),
        }
    }
}
