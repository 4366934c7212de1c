//! Well-known names and defaults of the pipeline.

/// Name of the shared write-only policy used by every upload locator.
pub const UPLOAD_POLICY_NAME: &str = "Video Upload Access Policy";

/// Name given to the short-lived write locator minted per upload.
pub const UPLOAD_LOCATOR_NAME: &str = "Upload Locator";

/// Upload locators start this many minutes in the past to absorb clock skew
/// between the API host and the storage endpoint.
pub const UPLOAD_LOCATOR_BACKDATE_MINUTES: i64 = 5;

/// Logical output key of the untouched source upload.
pub const ORIGINAL_OUTPUT_KEY: &str = "original";

/// Processor used for every encode task unless configured otherwise.
pub const DEFAULT_ENCODER_PROCESSOR: &str = "Media Encoder";

/// Nominal block size for chunked uploads.
pub const DEFAULT_BLOCK_SIZE_BYTES: u64 = 512 * 1024;

/// Encoded renditions are located by the first output object with this suffix.
pub const RENDITION_OBJECT_SUFFIX: &str = ".mp4";

/// Prefix of every original asset name.
pub const ORIGINAL_ASSET_PREFIX: &str = "videoOriginal";
