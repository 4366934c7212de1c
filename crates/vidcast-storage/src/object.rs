use crate::keys::{self, BLOCKS_DIR, CONTAINER_MARKER};
use crate::traits::{BlobStore, ObjectInfo, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStore, ObjectStoreExt, PutPayload, WriteMultipart};
use std::sync::Arc;

/// Blob store over any `object_store` backend.
///
/// Containers are key prefixes marked by a `.container` object. Committing a
/// block list streams the staged blocks into a multipart upload.
#[derive(Clone)]
pub struct ObjectBlobStore {
    store: Arc<dyn ObjectStore>,
    backend: StorageBackend,
}

impl ObjectBlobStore {
    pub fn in_memory() -> Self {
        ObjectBlobStore {
            store: Arc::new(InMemory::new()),
            backend: StorageBackend::Memory,
        }
    }

    pub fn s3(bucket: &str, region: &str) -> StorageResult<Self> {
        let store = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket)
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;
        Ok(ObjectBlobStore {
            store: Arc::new(store),
            backend: StorageBackend::S3,
        })
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self.store.head(&Path::from(key)).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn require_container(&self, container: &str) -> StorageResult<()> {
        keys::validate_container(container)?;
        if !self.exists(&keys::marker_key(container)).await? {
            return Err(StorageError::ContainerNotFound(container.to_string()));
        }
        Ok(())
    }

    async fn list_prefix(&self, prefix: &str) -> StorageResult<Vec<object_store::ObjectMeta>> {
        let prefix = Path::from(prefix);
        self.store
            .list(Some(&prefix))
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))
    }

    async fn read(&self, key: &str) -> StorageResult<Bytes> {
        let result = self
            .store
            .get(&Path::from(key))
            .await
            .map_err(|e| match e {
                ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
                other => StorageError::DownloadFailed(other.to_string()),
            })?;
        result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))
    }
}

#[async_trait]
impl BlobStore for ObjectBlobStore {
    async fn create_container(&self, container: &str) -> StorageResult<()> {
        keys::validate_container(container)?;
        self.store
            .put(
                &Path::from(keys::marker_key(container)),
                PutPayload::from(Bytes::new()),
            )
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        tracing::debug!(container = %container, backend = %self.backend, "Container created");
        Ok(())
    }

    async fn delete_container(&self, container: &str) -> StorageResult<()> {
        keys::validate_container(container)?;
        let start = std::time::Instant::now();
        let entries = self.list_prefix(container).await?;
        let count = entries.len();
        for meta in entries {
            match self.store.delete(&meta.location).await {
                Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {}
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        container = %container,
                        key = %meta.location,
                        "Container delete failed"
                    );
                    return Err(StorageError::DeleteFailed(e.to_string()));
                }
            }
        }
        tracing::info!(
            container = %container,
            backend = %self.backend,
            keys_deleted = count,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Container deleted"
        );
        Ok(())
    }

    async fn container_exists(&self, container: &str) -> StorageResult<bool> {
        keys::validate_container(container)?;
        self.exists(&keys::marker_key(container)).await
    }

    async fn put_block(
        &self,
        container: &str,
        object: &str,
        block_id: &str,
        data: Bytes,
    ) -> StorageResult<()> {
        keys::validate_object(object)?;
        keys::validate_block_id(block_id)?;
        self.require_container(container).await?;
        let key = keys::staged_block_key(container, object, block_id);
        let size = data.len();
        self.store
            .put(&Path::from(key), PutPayload::from(data))
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        tracing::debug!(
            container = %container,
            object = %object,
            block_id = %block_id,
            size_bytes = size,
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
        keys::validate_object(object)?;
        self.require_container(container).await?;
        let start = std::time::Instant::now();

        // Fail before opening the upload if any block is missing.
        for block_id in block_ids {
            keys::validate_block_id(block_id)?;
            if !self
                .exists(&keys::staged_block_key(container, object, block_id))
                .await?
            {
                return Err(StorageError::InvalidBlockList(format!(
                    "Block '{}' was not staged for {}",
                    block_id, object
                )));
            }
        }

        let target = Path::from(keys::object_key(container, object));
        let upload = self
            .store
            .put_multipart(&target)
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        let mut writer = WriteMultipart::new(upload);
        let mut size: u64 = 0;
        for block_id in block_ids {
            let data = self
                .read(&keys::staged_block_key(container, object, block_id))
                .await?;
            writer
                .wait_for_capacity(1)
                .await
                .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
            size += data.len() as u64;
            writer.write(&data);
        }
        writer
            .finish()
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        for meta in self.list_prefix(&keys::staged_prefix(container, object)).await? {
            if let Err(e) = self.store.delete(&meta.location).await {
                tracing::warn!(error = %e, key = %meta.location, "Failed to drop staged block");
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
        keys::validate_object(object)?;
        self.require_container(container).await?;
        let key = keys::object_key(container, object);
        let size = data.len();
        self.store
            .put(&Path::from(key.clone()), PutPayload::from(data))
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        tracing::info!(key = %key, size_bytes = size, "Object written");
        Ok(())
    }

    async fn get_object(&self, container: &str, object: &str) -> StorageResult<Bytes> {
        keys::validate_container(container)?;
        keys::validate_object(object)?;
        self.read(&keys::object_key(container, object)).await
    }

    async fn object_size(&self, container: &str, object: &str) -> StorageResult<u64> {
        keys::validate_container(container)?;
        keys::validate_object(object)?;
        let key = keys::object_key(container, object);
        match self.store.head(&Path::from(key.clone())).await {
            Ok(meta) => Ok(meta.size as u64),
            Err(ObjectStoreError::NotFound { .. }) => Err(StorageError::NotFound(key)),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn list_objects(&self, container: &str) -> StorageResult<Vec<ObjectInfo>> {
        self.require_container(container).await?;
        let mut objects: Vec<ObjectInfo> = self
            .list_prefix(container)
            .await?
            .into_iter()
            .filter_map(|meta| {
                let mut parts = meta.location.parts();
                let _container = parts.next()?;
                let name = parts.next()?.as_ref().to_string();
                // Only direct children; staged blocks and the marker are reserved.
                if parts.next().is_some()
                    || name.starts_with('.')
                    || name == BLOCKS_DIR
                    || name == CONTAINER_MARKER
                {
                    return None;
                }
                Some(ObjectInfo {
                    name,
                    size_bytes: meta.size as u64,
                })
            })
            .collect();
        objects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(objects)
    }

    fn backend_type(&self) -> StorageBackend {
        self.backend
    }
}
