//! Error types module
//!
//! All pipeline failures are unified under `AppError`. Each variant describes
//! itself through `ErrorMetadata` so the HTTP layer can render it without
//! knowing where it came from.

use std::io;

use crate::models::JobState;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for rejected uploads and failed jobs
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "FILE_TOO_BIG")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// Client-side pre-check, raised before any bytes leave the client.
    #[error("File too large: {size} bytes, maximum is {max} bytes")]
    FileTooLarge { size: u64, max: u64 },

    /// Server-side check on the committed object. The container has already
    /// been deleted when this is returned.
    #[error("Uploaded file too big: {size} bytes, maximum is {max} bytes")]
    FileTooBig { size: u64, max: u64 },

    #[error("Uploaded object not found: {0}")]
    EmptyBlob(String),

    #[error("Unknown media processor: {0}")]
    UnknownProcessor(String),

    #[error("Encode job {job_id} ended in state {state}")]
    JobFailed { job_id: String, state: JobState },

    #[error("Encode job {job_id} did not finish within {waited_secs} seconds")]
    JobTimeout { job_id: String, waited_secs: u64 },

    #[error("Encode job {0} wait was canceled")]
    JobCanceled(String),

    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Transcode error: {0}")]
    Transcode(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(format!("Validation error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::UnsupportedFileType(_) => (
            400,
            "UNSUPPORTED_FILE_TYPE",
            false,
            Some("Upload a file with one of the allowed video extensions"),
            false,
            LogLevel::Debug,
        ),
        AppError::FileTooLarge { .. } => (
            400,
            "FILE_TOO_LARGE",
            false,
            Some("Reduce file size below the configured maximum"),
            false,
            LogLevel::Debug,
        ),
        AppError::FileTooBig { .. } => (
            400,
            "FILE_TOO_BIG",
            false,
            Some("Reduce file size and start a new upload"),
            false,
            LogLevel::Warn,
        ),
        AppError::EmptyBlob(_) => (
            400,
            "EMPTY_BLOB",
            false,
            Some("Commit the upload before publishing"),
            false,
            LogLevel::Warn,
        ),
        AppError::UnknownProcessor(_) => (
            500,
            "UNKNOWN_PROCESSOR",
            false,
            Some("Contact support if this error persists"),
            true,
            LogLevel::Error,
        ),
        AppError::JobFailed { .. } => (
            500,
            "JOB_FAILED",
            true,
            Some("Publish the asset again"),
            false,
            LogLevel::Warn,
        ),
        AppError::JobTimeout { .. } => (
            504,
            "JOB_TIMEOUT",
            true,
            Some("Retry after a short delay"),
            false,
            LogLevel::Warn,
        ),
        AppError::JobCanceled(_) => (
            503,
            "JOB_CANCELED",
            true,
            Some("Retry after a short delay"),
            false,
            LogLevel::Warn,
        ),
        AppError::AssetNotFound(_) => (
            404,
            "ASSET_NOT_FOUND",
            false,
            Some("Verify the asset ID exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::Storage(_) => (
            500,
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Transcode(_) => (
            500,
            "TRANSCODE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::Forbidden(_) => (
            403,
            "FORBIDDEN",
            false,
            Some("Request a new signed URL"),
            false,
            LogLevel::Debug,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::UnsupportedFileType(_) => "UnsupportedFileType",
            AppError::FileTooLarge { .. } => "FileTooLarge",
            AppError::FileTooBig { .. } => "FileTooBig",
            AppError::EmptyBlob(_) => "EmptyBlob",
            AppError::UnknownProcessor(_) => "UnknownProcessor",
            AppError::JobFailed { .. } => "JobFailed",
            AppError::JobTimeout { .. } => "JobTimeout",
            AppError::JobCanceled(_) => "JobCanceled",
            AppError::AssetNotFound(_) => "AssetNotFound",
            AppError::Storage(_) => "Storage",
            AppError::Transcode(_) => "Transcode",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::Forbidden(_) => "Forbidden",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::UnsupportedFileType(name) => {
                format!("File type of '{}' is not supported", name)
            }
            AppError::FileTooLarge { size, max } | AppError::FileTooBig { size, max } => format!(
                "The file is {} bytes; files must be smaller than {} bytes",
                size, max
            ),
            AppError::EmptyBlob(_) => "The uploaded file could not be found".to_string(),
            AppError::UnknownProcessor(_) => "No media encoder is available".to_string(),
            AppError::JobFailed { state, .. } => {
                format!("Encoding did not complete (job {})", state)
            }
            AppError::JobTimeout { waited_secs, .. } => format!(
                "Encoding did not complete within {} seconds",
                waited_secs
            ),
            AppError::JobCanceled(_) => "Encoding was interrupted".to_string(),
            AppError::AssetNotFound(id) => format!("Asset '{}' not found", id),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::Transcode(_) => "Failed to reach the transcode service".to_string(),
            AppError::InvalidInput(msg) => msg.clone(),
            AppError::Forbidden(msg) => msg.clone(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "An internal error occurred".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_unsupported_file_type() {
        let err = AppError::UnsupportedFileType("clip.exe".to_string());
        assert_eq!(err.http_status_code(), 400);
        assert_eq!(err.error_code(), "UNSUPPORTED_FILE_TYPE");
        assert!(!err.is_recoverable());
        assert!(err.client_message().contains("clip.exe"));
        assert!(!err.is_sensitive());
        assert_eq!(err.log_level(), LogLevel::Debug);
    }

    #[test]
    fn test_error_metadata_file_too_big() {
        let err = AppError::FileTooBig {
            size: 2048,
            max: 1024,
        };
        assert_eq!(err.error_code(), "FILE_TOO_BIG");
        assert!(err.client_message().contains("2048"));
        assert!(err.client_message().contains("1024"));
        assert_eq!(err.log_level(), LogLevel::Warn);
    }

    #[test]
    fn test_error_metadata_job_timeout() {
        let err = AppError::JobTimeout {
            job_id: "job-1".to_string(),
            waited_secs: 30,
        };
        assert_eq!(err.http_status_code(), 504);
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("job-1"));
        assert!(err.client_message().contains("30"));
    }

    #[test]
    fn test_error_metadata_job_failed_reports_state() {
        let err = AppError::JobFailed {
            job_id: "job-1".to_string(),
            state: JobState::Error,
        };
        assert_eq!(err.error_code(), "JOB_FAILED");
        assert!(err.client_message().contains("error"));
    }

    #[test]
    fn test_sensitive_errors_hide_details() {
        let err = AppError::Storage("connection reset by 10.0.0.3".to_string());
        assert!(err.is_sensitive());
        assert!(!err.client_message().contains("10.0.0.3"));
    }

    #[test]
    fn test_detailed_message_includes_source_chain() {
        let err = AppError::from(anyhow::anyhow!("disk full").context("writing block"));
        let details = err.detailed_message();
        assert!(details.contains("Internal error with source"));
        assert!(details.contains("writing block"));
    }

    #[test]
    fn test_error_type_names() {
        assert_eq!(
            AppError::EmptyBlob("x".to_string()).error_type(),
            "EmptyBlob"
        );
        assert_eq!(
            AppError::UnknownProcessor("x".to_string()).error_type(),
            "UnknownProcessor"
        );
    }
}
