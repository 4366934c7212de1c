//! API constants

/// Prefix of the asset endpoints
pub const API_PREFIX: &str = "/api";

/// Prefix of the blob gateway; signed container URLs are `{base}{BLOB_PREFIX}/{container}`.
pub const BLOB_PREFIX: &str = "/blob";

/// Largest single block or whole-object body the gateway accepts.
pub const MAX_BLOB_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Largest JSON body on the asset endpoints.
pub const MAX_JSON_BODY_BYTES: usize = 64 * 1024;
