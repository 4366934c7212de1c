//! Shared-access signatures for containers.
//!
//! A signature grants `permissions` on one container between `st` and `se`.
//! It names the locator it was issued for in `si`, so deleting the locator
//! revokes the signature.
//! Canonical string: `account \n container \n si \n sp \n st \n se \n sv`, signed
//! with HMAC-SHA256 under the storage account key. The signature travels as
//! unpadded URL-safe base64 in the `sig` parameter.

use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;
use thiserror::Error;
use vidcast_core::models::Permissions;
use vidcast_core::AppError;

pub const SAS_VERSION: &str = "2024-01-01";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SasError {
    #[error("Missing signature parameter '{0}'")]
    Missing(&'static str),

    #[error("Malformed signature parameter: {0}")]
    Malformed(String),

    #[error("Signature does not match")]
    InvalidSignature,

    #[error("Signature is not valid yet")]
    NotYetValid,

    #[error("Signature has expired")]
    Expired,

    #[error("Signature grants '{granted}' but '{required}' is required")]
    InsufficientPermissions {
        required: Permissions,
        granted: Permissions,
    },
}

impl From<SasError> for AppError {
    fn from(err: SasError) -> Self {
        AppError::Forbidden(err.to_string())
    }
}

/// A parsed or freshly minted container signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SasToken {
    pub container: String,
    /// Id of the locator this signature belongs to.
    pub identifier: String,
    pub permissions: Permissions,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub signature: String,
}

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, SasError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| SasError::Malformed(format!("invalid timestamp '{}'", raw)))
}

/// Signatures carry whole seconds only.
fn truncate(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(ts.timestamp(), 0).unwrap_or(ts)
}

impl SasToken {
    /// Query string without the leading `?`.
    pub fn to_query(&self) -> String {
        format!(
            "sv={}&sr=c&si={}&sp={}&st={}&se={}&sig={}",
            SAS_VERSION,
            urlencoding::encode(&self.identifier),
            self.permissions,
            urlencoding::encode(&format_ts(&self.starts_at)),
            urlencoding::encode(&format_ts(&self.expires_at)),
            urlencoding::encode(&self.signature),
        )
    }

    /// Parse already-decoded query parameters.
    pub fn from_params(container: &str, params: &HashMap<String, String>) -> Result<Self, SasError> {
        let get = |key: &'static str| params.get(key).ok_or(SasError::Missing(key));

        let version = get("sv")?;
        if version != SAS_VERSION {
            return Err(SasError::Malformed(format!("unsupported version '{}'", version)));
        }
        let permissions = get("sp")?
            .parse::<Permissions>()
            .map_err(|e| SasError::Malformed(e.to_string()))?;

        Ok(SasToken {
            container: container.to_string(),
            identifier: get("si")?.clone(),
            permissions,
            starts_at: parse_ts(get("st")?)?,
            expires_at: parse_ts(get("se")?)?,
            signature: get("sig")?.clone(),
        })
    }
}

#[derive(Clone)]
pub struct SasSigner {
    account_name: String,
    key: Vec<u8>,
}

impl std::fmt::Debug for SasSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SasSigner")
            .field("account_name", &self.account_name)
            .field("key", &"<hidden>")
            .finish()
    }
}

impl SasSigner {
    pub fn new(account_name: impl Into<String>, account_key: &str) -> Self {
        SasSigner {
            account_name: account_name.into(),
            key: account_key.as_bytes().to_vec(),
        }
    }

    fn mac(
        &self,
        container: &str,
        identifier: &str,
        permissions: Permissions,
        st: &str,
        se: &str,
    ) -> Hmac<Sha256> {
        let canonical = format!(
            "{}\n{}\n{}\n{}\n{}\n{}\n{}",
            self.account_name, container, identifier, permissions, st, se, SAS_VERSION
        );
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.key).expect("HMAC accepts any key size");
        mac.update(canonical.as_bytes());
        mac
    }

    pub fn sign(
        &self,
        container: &str,
        identifier: &str,
        permissions: Permissions,
        starts_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> SasToken {
        let starts_at = truncate(starts_at);
        let expires_at = truncate(expires_at);
        let tag = self
            .mac(
                container,
                identifier,
                permissions,
                &format_ts(&starts_at),
                &format_ts(&expires_at),
            )
            .finalize()
            .into_bytes();

        SasToken {
            container: container.to_string(),
            identifier: identifier.to_string(),
            permissions,
            starts_at,
            expires_at,
            signature: base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(tag),
        }
    }

    /// Check the signature, the validity window and that `required` is granted.
    pub fn verify(
        &self,
        token: &SasToken,
        required: Permissions,
        now: DateTime<Utc>,
    ) -> Result<(), SasError> {
        let tag = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(&token.signature)
            .map_err(|_| SasError::InvalidSignature)?;
        self.mac(
            &token.container,
            &token.identifier,
            token.permissions,
            &format_ts(&token.starts_at),
            &format_ts(&token.expires_at),
        )
        .verify_slice(&tag)
        .map_err(|_| SasError::InvalidSignature)?;

        if now < token.starts_at {
            return Err(SasError::NotYetValid);
        }
        if now >= token.expires_at {
            return Err(SasError::Expired);
        }
        if !token.permissions.allows(required) {
            return Err(SasError::InsufficientPermissions {
                required,
                granted: token.permissions,
            });
        }
        Ok(())
    }
}

/// Signed container URL served by the blob gateway: `{base}/blob/{container}?{sas}`.
pub fn container_url(base_url: &str, token: &SasToken) -> String {
    format!(
        "{}/blob/{}?{}",
        base_url.trim_end_matches('/'),
        token.container,
        token.to_query()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn params_of(query: &str) -> HashMap<String, String> {
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| (k.to_string(), urlencoding::decode(v).unwrap().into_owned()))
            .collect()
    }

    #[test]
    fn test_signed_query_verifies_after_parsing() {
        let signer = SasSigner::new("acct", "secret");
        let now = Utc::now();
        let token = signer.sign(
            "asset-1",
            "loc-1",
            Permissions::WRITE,
            now - Duration::minutes(5),
            now + Duration::hours(1),
        );

        let parsed = SasToken::from_params("asset-1", &params_of(&token.to_query())).unwrap();
        assert_eq!(parsed, token);
        assert!(signer.verify(&parsed, Permissions::WRITE, now).is_ok());
    }

    #[test]
    fn test_signature_is_bound_to_container() {
        let signer = SasSigner::new("acct", "secret");
        let now = Utc::now();
        let token = signer.sign("asset-1", "loc-1", Permissions::READ_LIST, now, now + Duration::hours(1));
        let params = params_of(&token.to_query());
        let other = SasToken::from_params("asset-2", &params).unwrap();
        assert_eq!(
            signer.verify(&other, Permissions::READ_LIST, now),
            Err(SasError::InvalidSignature)
        );
    }

    #[test]
    fn test_tampered_permissions_fail() {
        let signer = SasSigner::new("acct", "secret");
        let now = Utc::now();
        let token = signer.sign("asset-1", "loc-1", Permissions::READ_LIST, now, now + Duration::hours(1));
        let mut params = params_of(&token.to_query());
        params.insert("sp".to_string(), "rwl".to_string());
        let forged = SasToken::from_params("asset-1", &params).unwrap();
        assert_eq!(
            signer.verify(&forged, Permissions::WRITE, now),
            Err(SasError::InvalidSignature)
        );
    }

    #[test]
    fn test_window_and_permission_checks() {
        let signer = SasSigner::new("acct", "secret");
        let now = Utc::now();
        let token = signer.sign(
            "asset-1",
            "loc-1",
            Permissions::WRITE,
            now + Duration::minutes(10),
            now + Duration::hours(1),
        );
        assert_eq!(
            signer.verify(&token, Permissions::WRITE, now),
            Err(SasError::NotYetValid)
        );
        assert_eq!(
            signer.verify(&token, Permissions::WRITE, now + Duration::hours(2)),
            Err(SasError::Expired)
        );
        assert!(matches!(
            signer.verify(&token, Permissions::READ_LIST, now + Duration::minutes(20)),
            Err(SasError::InsufficientPermissions { .. })
        ));
    }

    #[test]
    fn test_wrong_key_fails() {
        let now = Utc::now();
        let token =
            SasSigner::new("acct", "secret").sign("asset-1", "loc-1", Permissions::WRITE, now, now + Duration::hours(1));
        assert_eq!(
            SasSigner::new("acct", "other").verify(&token, Permissions::WRITE, now),
            Err(SasError::InvalidSignature)
        );
    }

    #[test]
    fn test_missing_parameter() {
        let mut params = HashMap::new();
        params.insert("sv".to_string(), SAS_VERSION.to_string());
        assert_eq!(
            SasToken::from_params("asset-1", &params),
            Err(SasError::Missing("sp"))
        );
    }

    #[test]
    fn test_container_url_layout() {
        let now = Utc::now();
        let token =
            SasSigner::new("acct", "k").sign("asset-1", "loc-1", Permissions::WRITE, now, now + Duration::hours(1));
        let url = container_url("http://localhost:4000/", &token);
        assert!(url.starts_with("http://localhost:4000/blob/asset-1?sv="));
        assert!(url.contains("&sig="));
    }
}
