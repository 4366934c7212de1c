//! Storage setup and initialization

use anyhow::Result;
use std::sync::Arc;
use vidcast_core::Config;
use vidcast_storage::{create_blob_store, BlobStore};

pub async fn setup_storage(config: &Config) -> Result<Arc<dyn BlobStore>> {
    tracing::info!("Initializing blob storage...");
    let store = create_blob_store(config).await?;
    tracing::info!(
        backend = %store.backend_type(),
        "Blob storage initialized successfully"
    );
    Ok(store)
}
