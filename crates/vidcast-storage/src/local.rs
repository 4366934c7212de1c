use crate::keys::{self, BLOCKS_DIR};
use crate::traits::{BlobStore, ObjectInfo, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem blob store
///
/// Containers are directories under `base_path`; staged blocks are files under
/// `{container}/.blocks/{hex(object)}/`.
#[derive(Clone)]
pub struct LocalBlobStore {
    base_path: PathBuf,
}

impl LocalBlobStore {
    /// Create a new LocalBlobStore rooted at `base_path`, creating it if needed.
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalBlobStore { base_path })
    }

    fn container_path(&self, container: &str) -> StorageResult<PathBuf> {
        keys::validate_container(container)?;
        Ok(self.base_path.join(container))
    }

    fn object_path(&self, container: &str, object: &str) -> StorageResult<PathBuf> {
        keys::validate_object(object)?;
        Ok(self.container_path(container)?.join(object))
    }

    fn staging_dir(&self, container: &str, object: &str) -> StorageResult<PathBuf> {
        keys::validate_object(object)?;
        Ok(self
            .container_path(container)?
            .join(BLOCKS_DIR)
            .join(hex::encode(object.as_bytes())))
    }

    async fn require_container(&self, container: &str) -> StorageResult<PathBuf> {
        let path = self.container_path(container)?;
        if !fs::try_exists(&path).await? {
            return Err(StorageError::ContainerNotFound(container.to_string()));
        }
        Ok(path)
    }
}

fn not_found_as(err: std::io::Error, key: &str) -> StorageError {
    if err.kind() == ErrorKind::NotFound {
        StorageError::NotFound(key.to_string())
    } else {
        StorageError::IoError(err)
    }
}

/// Concatenate the staged blocks into `partial`, returning its size.
async fn assemble(
    partial: &Path,
    staging: &Path,
    object: &str,
    block_ids: &[String],
) -> StorageResult<u64> {
    let mut out = fs::File::create(partial).await?;
    let mut size: u64 = 0;
    for block_id in block_ids {
        let block_path = staging.join(keys::block_file_name(block_id));
        let data = match fs::read(&block_path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::InvalidBlockList(format!(
                    "Block '{}' was not staged for {}",
                    block_id, object
                )));
            }
            Err(e) => return Err(e.into()),
        };
        out.write_all(&data).await?;
        size += data.len() as u64;
    }
    out.sync_all().await?;
    Ok(size)
}

async fn write_file(path: &Path, data: &[u8]) -> StorageResult<()> {
    let mut file = fs::File::create(path).await.map_err(|e| {
        StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
    })?;
    file.write_all(data).await.map_err(|e| {
        StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
    })?;
    file.sync_all().await.map_err(|e| {
        StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
    })?;
    Ok(())
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn create_container(&self, container: &str) -> StorageResult<()> {
        let path = self.container_path(container)?;
        fs::create_dir_all(&path).await?;
        tracing::debug!(container = %container, "Local container created");
        Ok(())
    }

    async fn delete_container(&self, container: &str) -> StorageResult<()> {
        let path = self.container_path(container)?;
        let start = std::time::Instant::now();
        match fs::remove_dir_all(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    container = %container,
                    "Local container delete failed"
                );
                return Err(StorageError::DeleteFailed(e.to_string()));
            }
        }
        tracing::info!(
            container = %container,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local container deleted"
        );
        Ok(())
    }

    async fn container_exists(&self, container: &str) -> StorageResult<bool> {
        let path = self.container_path(container)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn put_block(
        &self,
        container: &str,
        object: &str,
        block_id: &str,
        data: Bytes,
    ) -> StorageResult<()> {
        keys::validate_block_id(block_id)?;
        self.require_container(container).await?;
        let dir = self.staging_dir(container, object)?;
        fs::create_dir_all(&dir).await?;
        write_file(&dir.join(keys::block_file_name(block_id)), &data).await?;
        tracing::debug!(
            container = %container,
            object = %object,
            block_id = %block_id,
            size_bytes = data.len(),
            "Block staged"
        );
        Ok(())
    }

    async fn commit_block_list(
        &self,
        container: &str,
        object: &str,
        block_ids: &[String],
    ) -> StorageResult<u64> {
        let container_path = self.require_container(container).await?;
        let dir = self.staging_dir(container, object)?;
        let target = self.object_path(container, object)?;
        let start = std::time::Instant::now();

        for block_id in block_ids {
            keys::validate_block_id(block_id)?;
        }

        // Assemble next to the target so the final rename stays on one filesystem.
        let partial = container_path.join(format!(".{}.partial", hex::encode(object.as_bytes())));
        let assembled = match assemble(&partial, &dir, object, block_ids).await {
            Ok(size) => fs::rename(&partial, &target)
                .await
                .map(|()| size)
                .map_err(StorageError::from),
            Err(e) => Err(e),
        };
        let size = match assembled {
            Ok(size) => size,
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&partial).await {
                    if cleanup.kind() != ErrorKind::NotFound {
                        tracing::warn!(error = %cleanup, object = %object, "Failed to remove partial object");
                    }
                }
                return Err(e);
            }
        };

        if let Err(e) = fs::remove_dir_all(&dir).await {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(error = %e, object = %object, "Failed to drop staged blocks");
            }
        }

        tracing::info!(
            container = %container,
            object = %object,
            blocks = block_ids.len(),
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Block list committed"
        );
        Ok(size)
    }

    async fn put_object(&self, container: &str, object: &str, data: Bytes) -> StorageResult<()> {
        self.require_container(container).await?;
        let path = self.object_path(container, object)?;
        write_file(&path, &data).await?;
        tracing::info!(
            container = %container,
            object = %object,
            size_bytes = data.len(),
            "Local object written"
        );
        Ok(())
    }

    async fn get_object(&self, container: &str, object: &str) -> StorageResult<Bytes> {
        let path = self.object_path(container, object)?;
        let data = fs::read(&path)
            .await
            .map_err(|e| not_found_as(e, &keys::object_key(container, object)))?;
        Ok(Bytes::from(data))
    }

    async fn object_size(&self, container: &str, object: &str) -> StorageResult<u64> {
        let path = self.object_path(container, object)?;
        let meta = fs::metadata(&path)
            .await
            .map_err(|e| not_found_as(e, &keys::object_key(container, object)))?;
        Ok(meta.len())
    }

    async fn list_objects(&self, container: &str) -> StorageResult<Vec<ObjectInfo>> {
        let path = self.require_container(container).await?;
        let mut entries = fs::read_dir(&path).await?;
        let mut objects = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let meta = entry.metadata().await?;
            if meta.is_file() {
                objects.push(ObjectInfo {
                    name,
                    size_bytes: meta.len(),
                });
            }
        }
        objects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(objects)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
