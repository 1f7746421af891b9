//! JSON API handlers under `/api/v1`.

use super::{base_url, require_slug};
use crate::client::ClientAddr;
use crate::{error::HttpError, AppError, AppState, Area};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stashbin_core::models::paste::{ExpiryRequest, NewFile, NewPaste, Paste};
use stashbin_core::validation::KNOWN_LEXERS;
use std::collections::BTreeMap;

/// Body of `POST /api/v1/paste`.
#[derive(Debug, Deserialize)]
pub struct CreatePasteRequest {
    pub expiry: ExpiryRequest,
    #[serde(default)]
    pub files: Vec<NewFile>,
    /// Opt into fixed-width slugs.
    #[serde(default)]
    pub long: bool,
}

/// Links handed back after creation.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreatePasteResponse {
    pub link: String,
    pub removal: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FileView {
    pub slug: String,
    pub name: Option<String>,
    pub lexer: String,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PasteView {
    pub slug: String,
    pub expiry: Option<DateTime<Utc>>,
    pub files: Vec<FileView>,
}

impl From<Paste> for PasteView {
    fn from(paste: Paste) -> Self {
        Self {
            slug: paste.slug,
            expiry: paste.expires_at,
            files: paste
                .files
                .into_iter()
                .map(|file| FileView {
                    slug: file.slug,
                    name: file.filename,
                    lexer: file.lexer,
                    content: file.raw,
                })
                .collect(),
        }
    }
}

/// Create a paste from a JSON document.
///
/// # Returns
/// Absolute links to the paste and to its removal endpoint.
///
/// # Errors
/// 400 for malformed or rejected submissions, 429 when rate limited.
pub async fn create_paste(
    State(state): State<AppState>,
    ClientAddr(client): ClientAddr,
    headers: HeaderMap,
    payload: Result<Json<CreatePasteRequest>, JsonRejection>,
) -> Result<Json<CreatePasteResponse>, HttpError> {
    state.limiter.check(&client, Area::Create)?;

    let Json(request) = payload.map_err(|rejection| {
        AppError::Validation(format!("could not parse json body: {}", rejection.body_text()))
    })?;
    if request.files.is_empty() {
        return Err(AppError::Validation("no files provided".to_string()).into());
    }

    let receipt = state.service.create(NewPaste {
        files: request.files,
        expiry: request.expiry,
        long: request.long,
        source: "v1-api".to_string(),
    })?;

    let base = base_url(&headers);
    Ok(Json(CreatePasteResponse {
        link: format!("{}/{}", base, receipt.slug),
        removal: format!("{}/remove/{}", base, receipt.removal),
    }))
}

/// Fetch a paste and its files as JSON.
///
/// # Errors
/// 404 when the paste is absent or expired, 429 when rate limited.
pub async fn get_paste(
    State(state): State<AppState>,
    ClientAddr(client): ClientAddr,
    Path(slug): Path<String>,
) -> Result<Json<PasteView>, HttpError> {
    state.limiter.check(&client, Area::Read)?;
    let paste = state.service.paste(require_slug(&slug)?)?;
    Ok(Json(PasteView::from(paste)))
}

/// List accepted lexers as `name -> label`.
pub async fn list_lexers(
    State(state): State<AppState>,
    ClientAddr(client): ClientAddr,
) -> Result<Json<BTreeMap<&'static str, &'static str>>, HttpError> {
    state.limiter.check(&client, Area::Read)?;
    Ok(Json(
        KNOWN_LEXERS
            .iter()
            .map(|lexer| (lexer.name, lexer.label))
            .collect(),
    ))
}

/// List configured expiry choices as `name -> seconds`.
pub async fn list_expiries(
    State(state): State<AppState>,
    ClientAddr(client): ClientAddr,
) -> Result<Json<BTreeMap<String, u64>>, HttpError> {
    state.limiter.check(&client, Area::Read)?;
    Ok(Json(state.service.expiries().clone()))
}
