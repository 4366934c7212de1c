//! Single-flight cache of named access policies.
//!
//! The lock is held across lookup-or-create, so concurrent callers asking for
//! the same missing policy create it exactly once.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use vidcast_core::models::{AccessPolicy, Permissions};
use vidcast_core::AppError;
use vidcast_storage::MediaCatalog;

pub struct PolicyCache {
    catalog: Arc<dyn MediaCatalog>,
    entries: Mutex<HashMap<String, AccessPolicy>>,
}

impl PolicyCache {
    pub fn new(catalog: Arc<dyn MediaCatalog>) -> Self {
        Self {
            catalog,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return a policy named `name` that is still valid, creating one if the
    /// cached and stored copies are missing, expired or grant other permissions.
    pub async fn get_or_create(
        &self,
        name: &str,
        duration_minutes: i64,
        permissions: Permissions,
    ) -> Result<AccessPolicy, AppError> {
        let mut entries = self.entries.lock().await;
        let now = Utc::now();

        if let Some(policy) = entries.get(name) {
            if policy.is_valid_at(now) && policy.permissions == permissions {
                return Ok(policy.clone());
            }
        }

        let stored = self
            .catalog
            .find_policy(name)
            .await?
            .filter(|p| p.is_valid_at(now) && p.permissions == permissions);

        let policy = match stored {
            Some(policy) => policy,
            None => {
                tracing::info!(
                    policy_name = %name,
                    duration_minutes,
                    permissions = %permissions,
                    "Creating access policy"
                );
                self.catalog
                    .create_policy(name, duration_minutes, permissions)
                    .await?
            }
        };

        entries.insert(name.to_string(), policy.clone());
        Ok(policy)
    }
}
