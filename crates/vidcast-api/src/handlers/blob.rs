//! Blob gateway.
//!
//! Serves the signed container URLs handed out by the asset endpoints.
//! Every request carries the container signature in its query string; the
//! signature names its locator in `si`, and a deleted locator revokes it.

use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::Utc;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use uuid::Uuid;
use vidcast_core::models::Permissions;
use vidcast_core::AppError;
use vidcast_storage::{SasError, SasToken};

static BLOCK_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(Latest|Committed|Uncommitted)>\s*([^<]*?)\s*</(Latest|Committed|Uncommitted)>")
        .expect("valid block list pattern")
});

const READ: Permissions = Permissions {
    read: true,
    write: false,
    list: false,
};

/// Block ids of a `BlockList` document, in document order.
pub fn parse_block_list(body: &str) -> Result<Vec<String>, AppError> {
    if !body.contains("<BlockList>") {
        return Err(AppError::InvalidInput(
            "Block list body must be a BlockList document".to_string(),
        ));
    }
    let mut ids = Vec::new();
    for entry in BLOCK_ENTRY.captures_iter(body) {
        if entry[1] != entry[3] {
            return Err(AppError::InvalidInput(format!(
                "Mismatched block list element <{}>",
                &entry[1]
            )));
        }
        ids.push(entry[2].to_string());
    }
    if ids.is_empty() {
        return Err(AppError::InvalidInput("Block list is empty".to_string()));
    }
    Ok(ids)
}

async fn authorize(
    state: &AppState,
    container: &str,
    params: &HashMap<String, String>,
    required: Permissions,
) -> Result<(), HttpAppError> {
    let token = SasToken::from_params(container, params)?;
    state.signer.verify(&token, required, Utc::now())?;

    let locator_id = Uuid::parse_str(&token.identifier)
        .map_err(|_| SasError::Malformed(format!("invalid identifier '{}'", token.identifier)))?;
    let locator = state
        .catalog
        .get_locator(locator_id)
        .await?
        .ok_or_else(|| AppError::Forbidden("Signature has been revoked".to_string()))?;
    let asset = state.catalog.get_asset(&locator.asset_id).await?;
    if asset.map(|a| a.container) != Some(container.to_string()) {
        return Err(AppError::Forbidden("Signature does not cover this container".to_string()).into());
    }
    Ok(())
}

fn content_type_for(object: &str) -> &'static str {
    match object.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "mp4" => "video/mp4",
        Some(ext) if ext == "mov" => "video/quicktime",
        Some(ext) if ext == "wmv" => "video/x-ms-wmv",
        Some(ext) if ext == "avi" => "video/x-msvideo",
        Some(ext) if ext == "mkv" => "video/x-matroska",
        _ => "application/octet-stream",
    }
}

/// Stage a block (`comp=block`), commit a block list (`comp=blocklist`) or
/// write a whole object (no `comp`).
#[tracing::instrument(skip(state, params, headers, body), fields(size_bytes = body.len()))]
pub async fn put_blob(
    State(state): State<Arc<AppState>>,
    Path((container, object)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, HttpAppError> {
    authorize(&state, &container, &params, Permissions::WRITE).await?;

    match params.get("comp").map(String::as_str) {
        Some("block") => {
            let block_id = params
                .get("blockid")
                .ok_or_else(|| AppError::InvalidInput("Missing blockid".to_string()))?;
            state
                .store
                .put_block(&container, &object, block_id, body)
                .await?;
        }
        Some("blocklist") => {
            let document = std::str::from_utf8(&body)
                .map_err(|_| AppError::InvalidInput("Block list is not UTF-8".to_string()))?;
            let ids = parse_block_list(document)?;
            let size = state
                .store
                .commit_block_list(&container, &object, &ids)
                .await?;
            tracing::info!(
                blocks = ids.len(),
                committed_bytes = size,
                content_type = headers
                    .get("x-ms-blob-content-type")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or(""),
                "Block list committed"
            );
        }
        None => {
            state.store.put_object(&container, &object, body).await?;
        }
        Some(other) => {
            return Err(AppError::InvalidInput(format!("Unsupported comp '{}'", other)).into());
        }
    }

    Ok(StatusCode::CREATED)
}

#[tracing::instrument(skip(state, params))]
pub async fn get_blob(
    State(state): State<Arc<AppState>>,
    Path((container, object)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, HttpAppError> {
    authorize(&state, &container, &params, READ).await?;

    let data = state.store.get_object(&container, &object).await?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type_for(&object))],
        data,
    ))
}
