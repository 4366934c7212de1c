//! HTTP error response conversion
//!
//! Two renderings of [`AppError`]:
//! - [`HttpAppError`] uses the error's own status code and a structured
//!   [`ErrorResponse`]; the blob gateway and health endpoints use it.
//! - [`AssetApiError`] always answers 400 with `{errorMessage}`; the asset
//!   endpoints use it so clients see a single failure shape.

use axum::{
    extract::rejection::JsonRejection,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use utoipa::ToSchema;
use vidcast_core::models::ErrorBody;
use vidcast_core::{AppError, ErrorMetadata, LogLevel};
use vidcast_storage::{SasError, StorageError};

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether this error is recoverable (can be retried)
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

/// [`AppError`] rendered with its own status code.
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

/// Missing blobs and containers are 404 at the gateway.
impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        let app = match err {
            StorageError::NotFound(msg) | StorageError::ContainerNotFound(msg) => {
                AppError::AssetNotFound(msg)
            }
            other => other.into(),
        };
        HttpAppError(app)
    }
}

impl From<SasError> for HttpAppError {
    fn from(err: SasError) -> Self {
        HttpAppError(err.into())
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Error occurred");
        }
    }
}

fn is_production_env() -> bool {
    std::env::var("ENVIRONMENT")
        .map(|env| env.to_lowercase() == "production" || env.to_lowercase() == "prod")
        .unwrap_or(false)
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;
        let is_production = is_production_env();

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        let (details, error_type) = if is_production || app_error.is_sensitive() {
            (None, None)
        } else {
            (
                Some(app_error.detailed_message()),
                Some(app_error.error_type().to_string()),
            )
        };
        let body = Json(ErrorResponse {
            error: app_error.client_message(),
            details,
            error_type,
            code: app_error.error_code().to_string(),
            recoverable: app_error.is_recoverable(),
            suggested_action: app_error.suggested_action().map(String::from),
        });

        (status, body).into_response()
    }
}

/// Error of the asset endpoints: always `400 {errorMessage}`.
#[derive(Debug)]
pub struct AssetApiError(pub AppError);

impl From<AppError> for AssetApiError {
    fn from(err: AppError) -> Self {
        AssetApiError(err)
    }
}

impl From<validator::ValidationErrors> for AssetApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        AssetApiError(err.into())
    }
}

impl IntoResponse for AssetApiError {
    fn into_response(self) -> Response {
        let app_error = &self.0;
        log_error(app_error);

        let error_message = if is_production_env() || app_error.is_sensitive() {
            app_error.client_message()
        } else {
            app_error.to_string()
        };
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody { error_message }),
        )
            .into_response()
    }
}

/// JSON body extractor whose rejection renders as `400 {errorMessage}`.
#[derive(Debug, Clone, Copy)]
pub struct AssetJson<T>(pub T);

impl<T, S> FromRequest<S> for AssetJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = AssetApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(inner) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| {
                AssetApiError(AppError::InvalidInput(format!(
                    "Invalid request body: {}",
                    rejection.body_text()
                )))
            })?;
        Ok(AssetJson(inner))
    }
}
