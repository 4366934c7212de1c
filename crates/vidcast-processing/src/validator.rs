use regex::Regex;
use std::sync::LazyLock;
use vidcast_core::{AppError, Config};
use vidcast_storage::validate_object;

/// Characters that are not allowed in file names on common filesystems.
static INVALID_FILE_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f\x7f]"#).expect("valid regex"));

/// Common validation errors for uploaded videos
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Invalid file extension: {extension} (allowed: {allowed:?})")]
    InvalidExtension {
        file_name: String,
        extension: String,
        allowed: Vec<String>,
    },

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Empty file")]
    EmptyFile,
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::FileTooLarge { size, max } => AppError::FileTooLarge { size, max },
            ValidationError::InvalidExtension { file_name, .. } => {
                AppError::UnsupportedFileType(file_name)
            }
            ValidationError::InvalidFilename(name) => AppError::UnsupportedFileType(name),
            ValidationError::EmptyFile => AppError::InvalidInput("File is empty".to_string()),
        }
    }
}

/// Video file validator
///
/// Extension matching is case-sensitive and includes the leading dot, so an
/// allow-list of `.mp4` accepts `clip.mp4` but not `clip.MP4`.
#[derive(Debug, Clone)]
pub struct VideoValidator {
    max_file_size: u64,
    allowed_extensions: Vec<String>,
}

impl VideoValidator {
    pub fn new(max_file_size: u64, allowed_extensions: Vec<String>) -> Self {
        Self {
            max_file_size,
            allowed_extensions,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.max_file_size_bytes(),
            config.allowed_video_file_extensions().to_vec(),
        )
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Strip characters that are invalid in file names, surrounding
    /// whitespace and leading dots.
    pub fn sanitize_file_name(&self, file_name: &str) -> Result<String, ValidationError> {
        let stripped = INVALID_FILE_NAME_CHARS.replace_all(file_name, "");
        let sanitized = stripped.trim().trim_start_matches('.').trim();
        if sanitized.is_empty() {
            return Err(ValidationError::InvalidFilename(file_name.to_string()));
        }
        Ok(sanitized.to_string())
    }

    /// Validate the extension of an already sanitized file name.
    pub fn validate_extension(&self, file_name: &str) -> Result<(), ValidationError> {
        let extension = file_name
            .rfind('.')
            .map(|idx| &file_name[idx..])
            .filter(|ext| ext.len() > 1)
            .ok_or_else(|| ValidationError::InvalidFilename(file_name.to_string()))?;

        if !self.allowed_extensions.iter().any(|e| e == extension) {
            return Err(ValidationError::InvalidExtension {
                file_name: file_name.to_string(),
                extension: extension.to_string(),
                allowed: self.allowed_extensions.clone(),
            });
        }

        Ok(())
    }

    /// Sanitize, check the extension and that the name is a valid object
    /// name in the blob store. Returns the sanitized name.
    pub fn validate_file_name(&self, file_name: &str) -> Result<String, ValidationError> {
        let sanitized = self.sanitize_file_name(file_name)?;
        validate_object(&sanitized)
            .map_err(|_| ValidationError::InvalidFilename(sanitized.clone()))?;
        self.validate_extension(&sanitized)?;
        Ok(sanitized)
    }

    /// Files must be non-empty and strictly smaller than the maximum.
    pub fn validate_file_size(&self, size: u64) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }

        if size >= self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }

        Ok(())
    }
}
