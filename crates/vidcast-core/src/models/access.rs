use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use super::AssetId;

/// Operations granted by an access policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub read: bool,
    pub write: bool,
    pub list: bool,
}

impl Permissions {
    pub const WRITE: Permissions = Permissions {
        read: false,
        write: true,
        list: false,
    };

    pub const READ_LIST: Permissions = Permissions {
        read: true,
        write: false,
        list: true,
    };

    /// Covers every operation in `other`.
    pub fn allows(&self, other: Permissions) -> bool {
        (!other.read || self.read) && (!other.write || self.write) && (!other.list || self.list)
    }
}

impl Display for Permissions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if self.read {
            f.write_str("r")?;
        }
        if self.write {
            f.write_str("w")?;
        }
        if self.list {
            f.write_str("l")?;
        }
        Ok(())
    }
}

impl FromStr for Permissions {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut perms = Permissions::default();
        for c in s.chars() {
            match c {
                'r' => perms.read = true,
                'w' => perms.write = true,
                'l' => perms.list = true,
                _ => return Err(anyhow::anyhow!("Invalid permission flag: {}", c)),
            }
        }
        Ok(perms)
    }
}

/// Named access policy. The upload policy is shared; read policies are
/// created per publish.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessPolicy {
    pub id: Uuid,
    pub name: String,
    pub duration_minutes: i64,
    pub permissions: Permissions,
    pub created_at: DateTime<Utc>,
}

impl AccessPolicy {
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + chrono::Duration::minutes(self.duration_minutes)
    }

    /// A policy is usable while `now < expiry`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at()
    }
}

/// A capability instance: a signed container URL bound to a policy window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Locator {
    pub id: Uuid,
    pub name: String,
    pub asset_id: AssetId,
    pub policy_id: Uuid,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Signed container URL: `{base}/{container}?{sas}`.
    pub path: String,
}

/// A consumable URL split so the signature can be encoded on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLocator {
    /// `scheme://host[:port]`
    pub url_base: String,
    /// Absolute path including the object name, starting with `/`.
    pub path: String,
    /// Query string including the leading `?`.
    pub query: String,
}

impl ResolvedLocator {
    pub fn url_with_path(&self) -> String {
        format!("{}{}", self.url_base, self.path)
    }

    pub fn full_url(&self) -> String {
        format!("{}{}", self.url_with_path(), self.query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permissions_render_in_canonical_order() {
        assert_eq!(Permissions::WRITE.to_string(), "w");
        assert_eq!(Permissions::READ_LIST.to_string(), "rl");
        assert_eq!("lr".parse::<Permissions>().unwrap(), Permissions::READ_LIST);
        assert!("rx".parse::<Permissions>().is_err());
    }

    #[test]
    fn test_permissions_allows() {
        assert!(Permissions::READ_LIST.allows(Permissions {
            read: true,
            ..Default::default()
        }));
        assert!(!Permissions::READ_LIST.allows(Permissions::WRITE));
        assert!(!Permissions::WRITE.allows(Permissions::READ_LIST));
    }

    #[test]
    fn test_policy_expiry_is_strict() {
        let created_at = Utc::now();
        let policy = AccessPolicy {
            id: Uuid::new_v4(),
            name: "p".to_string(),
            duration_minutes: 60,
            permissions: Permissions::WRITE,
            created_at,
        };
        assert!(policy.is_valid_at(created_at));
        assert!(!policy.is_valid_at(created_at + chrono::Duration::minutes(60)));
    }

    #[test]
    fn test_resolved_locator_joins_parts() {
        let locator = ResolvedLocator {
            url_base: "http://localhost:4000".to_string(),
            path: "/blob/asset-1/clip.mp4".to_string(),
            query: "?sp=r&sig=abc".to_string(),
        };
        assert_eq!(
            locator.url_with_path(),
            "http://localhost:4000/blob/asset-1/clip.mp4"
        );
        assert_eq!(
            locator.full_url(),
            "http://localhost:4000/blob/asset-1/clip.mp4?sp=r&sig=abc"
        );
    }
}
