use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Opaque asset identifier assigned by the media catalog.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        AssetId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for AssetId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl From<String> for AssetId {
    fn from(id: String) -> Self {
        AssetId(id)
    }
}

impl From<&str> for AssetId {
    fn from(id: &str) -> Self {
        AssetId(id.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetState {
    Active,
    /// Terminal. Set when the backing container was removed.
    Destroyed,
}

/// A file registered on an asset. Registration is nominal: the object itself
/// lives in the asset's container and may not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetFile {
    pub name: String,
    pub is_primary: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub name: String,
    /// Storage container backing this asset.
    pub container: String,
    pub files: Vec<AssetFile>,
    pub primary_object_name: Option<String>,
    pub state: AssetState,
    pub created_at: DateTime<Utc>,
}

impl Asset {
    pub fn primary_file(&self) -> Option<&AssetFile> {
        self.files.iter().find(|f| f.is_primary)
    }

    pub fn is_destroyed(&self) -> bool {
        self.state == AssetState::Destroyed
    }
}
