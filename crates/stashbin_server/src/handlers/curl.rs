//! `POST /curl`: form upload answering in plain text.

use super::base_url;
use crate::client::ClientAddr;
use crate::error::HttpError;
use crate::{AppError, AppState, Area};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Form,
};
use serde::Deserialize;
use stashbin_core::models::paste::{ExpiryRequest, NewFile, NewPaste};

/// Form fields accepted by `POST /curl`.
#[derive(Debug, Deserialize)]
pub struct CurlForm {
    pub raw: Option<String>,
    pub lexer: Option<String>,
    pub expiry: Option<String>,
}

const DEFAULT_EXPIRY: &str = "1day";

fn plain(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
}

fn error_text(err: AppError) -> Response {
    let (status, message) = HttpError(err).status_and_message();
    plain(status, format!("{}\n", message))
}

/// Create a single-file paste from form fields `raw`, `lexer` and `expiry`.
///
/// # Returns
/// Paste, raw and removal URLs, one per line.
pub async fn create_paste(
    State(state): State<AppState>,
    ClientAddr(client): ClientAddr,
    headers: HeaderMap,
    Form(form): Form<CurlForm>,
) -> Response {
    if let Err(err) = state.limiter.check(&client, Area::Create) {
        return error_text(err);
    }

    let Some(raw) = form.raw.filter(|raw| !raw.is_empty()) else {
        tracing::info!("curl submission without raw content");
        return plain(StatusCode::BAD_REQUEST, "Invalid `raw` supplied.\n".to_string());
    };
    let expiry = form.expiry.unwrap_or_else(|| DEFAULT_EXPIRY.to_string());

    let result = state.service.create(NewPaste {
        files: vec![NewFile {
            lexer: form.lexer,
            content: raw,
            filename: None,
        }],
        expiry: ExpiryRequest::Named(expiry),
        long: false,
        source: "curl".to_string(),
    });
    let receipt = match result {
        Ok(receipt) => receipt,
        Err(err) => return error_text(err),
    };

    let base = base_url(&headers);
    let raw_slug = receipt.file_slugs.first().unwrap_or(&receipt.slug);
    plain(
        StatusCode::OK,
        format!(
            "Paste URL:   {base}/{paste}\nRaw URL:     {base}/raw/{raw}\nRemoval URL: {base}/remove/{removal}\n",
            base = base,
            paste = receipt.slug,
            raw = raw_slug,
            removal = receipt.removal,
        ),
    )
}
