//! Vidcast API Library
//!
//! HTTP surface of the pipeline: the asset endpoints, the blob gateway that
//! signed URLs point at, health, and application setup.

mod api_doc;
pub mod constants;
mod handlers;
pub mod setup;
mod telemetry;

pub mod error;
pub mod state;

pub use error::{AssetApiError, ErrorResponse, HttpAppError};
pub use state::AppState;
