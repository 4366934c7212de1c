//! Media catalog
//!
//! Records assets, access policies and locators. Assets are created here and
//! get a fresh container name; the container itself is created in the blob
//! store by the caller.

use crate::traits::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;
use vidcast_core::models::{
    AccessPolicy, Asset, AssetFile, AssetId, AssetState, Locator, Permissions,
};

#[async_trait]
pub trait MediaCatalog: Send + Sync {
    /// Create an empty asset with a new container name.
    async fn create_asset(&self, name: &str) -> StorageResult<Asset>;

    async fn get_asset(&self, id: &AssetId) -> StorageResult<Option<Asset>>;

    /// Register a file on an asset. Registering an existing name is a no-op.
    async fn add_file(&self, id: &AssetId, file_name: &str) -> StorageResult<Asset>;

    /// Mark `file_name` as the asset's primary file. The primary object name
    /// is set at most once; marking the same name again is a no-op and
    /// marking a different one is a conflict.
    async fn set_primary_file(&self, id: &AssetId, file_name: &str) -> StorageResult<Asset>;

    async fn mark_destroyed(&self, id: &AssetId) -> StorageResult<()>;

    /// Newest policy with the given name.
    async fn find_policy(&self, name: &str) -> StorageResult<Option<AccessPolicy>>;

    async fn create_policy(
        &self,
        name: &str,
        duration_minutes: i64,
        permissions: Permissions,
    ) -> StorageResult<AccessPolicy>;

    async fn insert_locator(&self, locator: Locator) -> StorageResult<()>;

    async fn get_locator(&self, locator_id: Uuid) -> StorageResult<Option<Locator>>;

    async fn locators_for_asset(&self, id: &AssetId) -> StorageResult<Vec<Locator>>;

    async fn delete_locator(&self, locator_id: Uuid) -> StorageResult<()>;
}

#[derive(Default)]
struct CatalogState {
    assets: HashMap<AssetId, Asset>,
    policies: Vec<AccessPolicy>,
    locators: HashMap<Uuid, Locator>,
}

/// In-process catalog. State lives as long as the process.
#[derive(Default)]
pub struct InMemoryCatalog {
    state: RwLock<CatalogState>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of policies with the given name, for diagnostics.
    pub async fn policy_count(&self, name: &str) -> usize {
        self.state
            .read()
            .await
            .policies
            .iter()
            .filter(|p| p.name == name)
            .count()
    }

    /// Assets with the given name, for diagnostics.
    pub async fn assets_named(&self, name: &str) -> Vec<Asset> {
        self.state
            .read()
            .await
            .assets
            .values()
            .filter(|a| a.name == name)
            .cloned()
            .collect()
    }
}

fn asset_not_found(id: &AssetId) -> StorageError {
    StorageError::NotFound(format!("asset {}", id))
}

#[async_trait]
impl MediaCatalog for InMemoryCatalog {
    async fn create_asset(&self, name: &str) -> StorageResult<Asset> {
        let uuid = Uuid::new_v4();
        let asset = Asset {
            id: AssetId::new(format!("nb:cid:UUID:{}", uuid)),
            name: name.to_string(),
            container: format!("asset-{}", uuid),
            files: Vec::new(),
            primary_object_name: None,
            state: AssetState::Active,
            created_at: Utc::now(),
        };
        self.state
            .write()
            .await
            .assets
            .insert(asset.id.clone(), asset.clone());
        tracing::debug!(asset_id = %asset.id, name = %name, "Asset created");
        Ok(asset)
    }

    async fn get_asset(&self, id: &AssetId) -> StorageResult<Option<Asset>> {
        Ok(self.state.read().await.assets.get(id).cloned())
    }

    async fn add_file(&self, id: &AssetId, file_name: &str) -> StorageResult<Asset> {
        let mut state = self.state.write().await;
        let asset = state.assets.get_mut(id).ok_or_else(|| asset_not_found(id))?;
        if !asset.files.iter().any(|f| f.name == file_name) {
            asset.files.push(AssetFile {
                name: file_name.to_string(),
                is_primary: false,
            });
        }
        Ok(asset.clone())
    }

    async fn set_primary_file(&self, id: &AssetId, file_name: &str) -> StorageResult<Asset> {
        let mut state = self.state.write().await;
        let asset = state.assets.get_mut(id).ok_or_else(|| asset_not_found(id))?;
        if asset.is_destroyed() {
            return Err(StorageError::Conflict(format!("asset {} is destroyed", id)));
        }
        match asset.primary_object_name.as_deref() {
            Some(existing) if existing == file_name => return Ok(asset.clone()),
            Some(existing) => {
                return Err(StorageError::Conflict(format!(
                    "asset {} already has primary file '{}'",
                    id, existing
                )))
            }
            None => {}
        }
        if !asset.files.iter().any(|f| f.name == file_name) {
            asset.files.push(AssetFile {
                name: file_name.to_string(),
                is_primary: false,
            });
        }
        for file in asset.files.iter_mut() {
            file.is_primary = file.name == file_name;
        }
        asset.primary_object_name = Some(file_name.to_string());
        Ok(asset.clone())
    }

    async fn mark_destroyed(&self, id: &AssetId) -> StorageResult<()> {
        let mut state = self.state.write().await;
        let asset = state.assets.get_mut(id).ok_or_else(|| asset_not_found(id))?;
        asset.state = AssetState::Destroyed;
        state.locators.retain(|_, l| &l.asset_id != id);
        Ok(())
    }

    async fn find_policy(&self, name: &str) -> StorageResult<Option<AccessPolicy>> {
        Ok(self
            .state
            .read()
            .await
            .policies
            .iter()
            .filter(|p| p.name == name)
            .max_by_key(|p| p.created_at)
            .cloned())
    }

    async fn create_policy(
        &self,
        name: &str,
        duration_minutes: i64,
        permissions: Permissions,
    ) -> StorageResult<AccessPolicy> {
        let policy = AccessPolicy {
            id: Uuid::new_v4(),
            name: name.to_string(),
            duration_minutes,
            permissions,
            created_at: Utc::now(),
        };
        self.state.write().await.policies.push(policy.clone());
        tracing::debug!(
            policy_id = %policy.id,
            name = %name,
            permissions = %permissions,
            duration_minutes,
            "Access policy created"
        );
        Ok(policy)
    }

    async fn insert_locator(&self, locator: Locator) -> StorageResult<()> {
        let mut state = self.state.write().await;
        if !state.assets.contains_key(&locator.asset_id) {
            return Err(asset_not_found(&locator.asset_id));
        }
        state.locators.insert(locator.id, locator);
        Ok(())
    }

    async fn get_locator(&self, locator_id: Uuid) -> StorageResult<Option<Locator>> {
        Ok(self.state.read().await.locators.get(&locator_id).cloned())
    }

    async fn locators_for_asset(&self, id: &AssetId) -> StorageResult<Vec<Locator>> {
        let mut locators: Vec<Locator> = self
            .state
            .read()
            .await
            .locators
            .values()
            .filter(|l| &l.asset_id == id)
            .cloned()
            .collect();
        locators.sort_by_key(|l| l.starts_at);
        Ok(locators)
    }

    async fn delete_locator(&self, locator_id: Uuid) -> StorageResult<()> {
        self.state
            .write()
            .await
            .locators
            .remove(&locator_id)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(format!("locator {}", locator_id)))
    }
}
