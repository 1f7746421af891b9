//! HTTP request handlers.

/// JSON API endpoints.
pub mod api;
/// Plain-text form endpoint for command-line uploads.
pub mod curl;
/// Human-facing pages and owner removal.
pub mod website;

use crate::AppError;
use axum::http::{header, HeaderMap};
use stashbin_core::slug::encoding::is_slug_shaped;

/// Scheme and authority used to build absolute links, from the `Host` header.
///
/// Falls back to an empty prefix so links stay usable as relative paths.
pub(crate) fn base_url(headers: &HeaderMap) -> String {
    let Some(host) = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .filter(|host| !host.trim().is_empty())
    else {
        return String::new();
    };
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .filter(|proto| matches!(*proto, "http" | "https"))
        .unwrap_or("http");
    format!("{}://{}", scheme, host.trim())
}

/// Reject path segments that cannot be a slug before touching storage.
pub(crate) fn require_slug(value: &str) -> Result<&str, AppError> {
    if is_slug_shaped(value) {
        Ok(value)
    } else {
        Err(AppError::NotFound)
    }
}
