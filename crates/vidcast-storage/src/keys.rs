//! Shared name validation and key layout for storage backends.
//!
//! Key format: objects at `{container}/{object}`, staged blocks at
//! `{container}/.blocks/{object}/{hex(block_id)}`, container marker at
//! `{container}/.container`.

use crate::traits::{StorageError, StorageResult};

pub const BLOCKS_DIR: &str = ".blocks";
pub const CONTAINER_MARKER: &str = ".container";

pub fn validate_container(container: &str) -> StorageResult<()> {
    let valid_chars = container
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if container.len() < 3 || container.len() > 63 || !valid_chars || container.starts_with('-')
    {
        return Err(StorageError::InvalidKey(format!(
            "Invalid container name '{}'",
            container
        )));
    }
    Ok(())
}

pub fn validate_object(object: &str) -> StorageResult<()> {
    if object.is_empty()
        || object.len() > 1024
        || object.starts_with('.')
        || object.contains('/')
        || object.contains('\\')
        || object.contains("..")
        || object.chars().any(|c| c.is_control())
    {
        return Err(StorageError::InvalidKey(format!(
            "Invalid object name '{}'",
            object
        )));
    }
    Ok(())
}

pub fn validate_block_id(block_id: &str) -> StorageResult<()> {
    if block_id.is_empty() || block_id.len() > 64 {
        return Err(StorageError::InvalidBlockList(format!(
            "Block id must be 1-64 characters, got {}",
            block_id.len()
        )));
    }
    Ok(())
}

/// Block ids are client-chosen base64; hex keeps them path-safe.
pub fn block_file_name(block_id: &str) -> String {
    hex::encode(block_id.as_bytes())
}

pub fn object_key(container: &str, object: &str) -> String {
    format!("{}/{}", container, object)
}

pub fn staged_prefix(container: &str, object: &str) -> String {
    format!("{}/{}/{}", container, BLOCKS_DIR, hex::encode(object.as_bytes()))
}

pub fn staged_block_key(container: &str, object: &str, block_id: &str) -> String {
    format!(
        "{}/{}",
        staged_prefix(container, object),
        block_file_name(block_id)
    )
}

pub fn marker_key(container: &str) -> String {
    format!("{}/{}", container, CONTAINER_MARKER)
}
