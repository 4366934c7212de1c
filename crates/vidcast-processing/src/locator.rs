//! Locators: signed container URLs bound to an access policy, and their
//! resolution into consumable object URLs.

use chrono::{DateTime, Duration, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::sync::Arc;
use uuid::Uuid;
use vidcast_core::constants::RENDITION_OBJECT_SUFFIX;
use vidcast_core::models::{AccessPolicy, Asset, Locator, Permissions, ResolvedLocator};
use vidcast_core::AppError;
use vidcast_storage::sas::container_url;
use vidcast_storage::{MediaCatalog, ObjectInfo, SasSigner};

/// Characters escaped in the scheme/host/path part of a published URL.
const PATH_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b']')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// The query is already encoded when signed; `%` must survive untouched.
const QUERY_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Externally returned form of a locator. The two halves are escaped
/// separately so the signature in the query is never re-encoded.
pub fn encode_for_client(locator: &ResolvedLocator) -> String {
    format!(
        "{}{}",
        utf8_percent_encode(&locator.url_with_path(), PATH_ESCAPE),
        utf8_percent_encode(&locator.query, QUERY_ESCAPE)
    )
}

/// Split a signed container URL and append `object_name` to its path.
pub fn resolve(container_url: &str, object_name: &str) -> Result<ResolvedLocator, AppError> {
    let invalid = || AppError::Internal(format!("Malformed locator URL: {}", container_url));

    let scheme_end = container_url.find("://").ok_or_else(invalid)? + 3;
    let (without_query, query) = match container_url.find('?') {
        Some(idx) => container_url.split_at(idx),
        None => (container_url, ""),
    };
    let path_start = without_query[scheme_end..]
        .find('/')
        .map(|idx| idx + scheme_end)
        .ok_or_else(invalid)?;

    Ok(ResolvedLocator {
        url_base: without_query[..path_start].to_string(),
        path: format!(
            "{}/{}",
            without_query[path_start..].trim_end_matches('/'),
            object_name
        ),
        query: query.to_string(),
    })
}

/// First object whose name ends in `.mp4`, in listing order.
pub fn find_rendition_object(objects: &[ObjectInfo]) -> Option<&ObjectInfo> {
    objects
        .iter()
        .find(|o| o.name.ends_with(RENDITION_OBJECT_SUFFIX))
}

pub struct LocatorService {
    catalog: Arc<dyn MediaCatalog>,
    signer: SasSigner,
    public_base_url: String,
}

impl LocatorService {
    pub fn new(catalog: Arc<dyn MediaCatalog>, signer: SasSigner, public_base_url: String) -> Self {
        Self {
            catalog,
            signer,
            public_base_url,
        }
    }

    /// Mint and record a locator on `asset` under `policy`, valid from
    /// `starts_at` for the policy's duration.
    pub async fn issue(
        &self,
        asset: &Asset,
        policy: &AccessPolicy,
        name: &str,
        starts_at: DateTime<Utc>,
    ) -> Result<Locator, AppError> {
        let id = Uuid::new_v4();
        let expires_at = starts_at + Duration::minutes(policy.duration_minutes);
        let token = self.signer.sign(
            &asset.container,
            &id.to_string(),
            policy.permissions,
            starts_at,
            expires_at,
        );

        let locator = Locator {
            id,
            name: name.to_string(),
            asset_id: asset.id.clone(),
            policy_id: policy.id,
            starts_at: token.starts_at,
            expires_at: token.expires_at,
            path: container_url(&self.public_base_url, &token),
        };
        self.catalog.insert_locator(locator.clone()).await?;

        tracing::debug!(
            asset_id = %asset.id,
            locator_id = %locator.id,
            locator_name = %name,
            expires_at = %locator.expires_at,
            "Locator issued"
        );
        Ok(locator)
    }

    /// Delete every locator named `name` on `asset`. Returns how many were removed.
    pub async fn revoke(&self, asset: &Asset, name: &str) -> Result<usize, AppError> {
        let mut revoked = 0;
        for locator in self.catalog.locators_for_asset(&asset.id).await? {
            if locator.name == name {
                self.catalog.delete_locator(locator.id).await?;
                revoked += 1;
            }
        }
        if revoked > 0 {
            tracing::info!(asset_id = %asset.id, locator_name = %name, revoked, "Locators revoked");
        }
        Ok(revoked)
    }

    /// Issue a read+list locator on `asset` valid for `valid_for_days` and
    /// resolve it to `object_name`.
    pub async fn build_locator(
        &self,
        asset: &Asset,
        object_name: &str,
        valid_for_days: i64,
    ) -> Result<ResolvedLocator, AppError> {
        let policy = self
            .catalog
            .create_policy(
                &format!("Streaming policy for {}", asset.name),
                valid_for_days * 24 * 60,
                Permissions::READ_LIST,
            )
            .await?;
        let locator = self
            .issue(asset, &policy, &format!("Read Locator - {}", asset.name), Utc::now())
            .await?;
        resolve(&locator.path, object_name)
    }
}
