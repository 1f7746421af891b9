//! Human-facing pages: creation form, rendered pastes, raw/hex/download views
//! and owner removal.

use super::require_slug;
use crate::client::ClientAddr;
use crate::{error::HttpError, AppState, Area};
use axum::{
    extract::{Path, State},
    http::header,
    response::{Html, IntoResponse, Response},
    Form,
};
use serde::Deserialize;
use stashbin_core::models::paste::{ExpiryRequest, NewFile, NewPaste, Paste, PasteReceipt};
use stashbin_core::render::escape_html;
use stashbin_core::validation::KNOWN_LEXERS;
use std::collections::BTreeMap;

const DEFAULT_EXPIRY: &str = "1day";
const HEX_ROW: usize = 16;

/// Fields posted by the creation form on `/`.
#[derive(Debug, Deserialize)]
pub struct WebForm {
    pub raw: Option<String>,
    pub lexer: Option<String>,
    pub expiry: Option<String>,
    pub filename: Option<String>,
    /// Present (as `on`) when the long-slug checkbox is ticked.
    pub long: Option<String>,
}

impl From<WebForm> for NewPaste {
    fn from(form: WebForm) -> Self {
        NewPaste {
            files: vec![NewFile {
                lexer: form.lexer,
                content: form.raw.unwrap_or_default(),
                filename: form.filename,
            }],
            expiry: ExpiryRequest::Named(form.expiry.unwrap_or_else(|| DEFAULT_EXPIRY.to_string())),
            long: form.long.is_some_and(|value| !value.is_empty()),
            source: "web".to_string(),
        }
    }
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{}</title></head><body>{}</body></html>",
        escape_html(title),
        body
    )
}

fn render_form(expiries: &BTreeMap<String, u64>, content: &str, selected_lexer: &str) -> String {
    let mut body = String::from("<form method=\"post\" action=\"/create\">");
    body.push_str("<select name=\"lexer\">");
    for lexer in KNOWN_LEXERS {
        let selected = if lexer.name == selected_lexer { " selected" } else { "" };
        body.push_str(&format!(
            "<option value=\"{}\"{}>{}</option>",
            lexer.name, selected, lexer.label
        ));
    }
    body.push_str("</select><select name=\"expiry\">");
    for name in expiries.keys() {
        let selected = if name == DEFAULT_EXPIRY { " selected" } else { "" };
        body.push_str(&format!(
            "<option value=\"{0}\"{1}>{0}</option>",
            escape_html(name),
            selected
        ));
    }
    body.push_str("</select>");
    body.push_str("<input type=\"text\" name=\"filename\" placeholder=\"filename\">");
    body.push_str("<label><input type=\"checkbox\" name=\"long\"> long slug</label>");
    body.push_str(&format!(
        "<textarea name=\"raw\" rows=\"20\" cols=\"80\">{}</textarea>",
        escape_html(content)
    ));
    body.push_str("<button type=\"submit\">Paste</button></form>");
    page("stashbin", &body)
}

fn render_paste(paste: &Paste) -> String {
    let mut body = String::new();
    for file in &paste.files {
        let title = file.filename.as_deref().unwrap_or(&file.slug);
        body.push_str(&format!(
            "<section id=\"{slug}\"><h2>{title}</h2><p class=\"meta\">{lexer} &middot; <a href=\"/raw/{slug}\">raw</a> &middot; <a href=\"/hex/{slug}\">hex</a> &middot; <a href=\"/download/{slug}\">download</a> &middot; <a href=\"/repaste/{slug}\">repaste</a></p>{rendered}</section>",
            slug = escape_html(&file.slug),
            title = escape_html(title),
            lexer = escape_html(&file.lexer),
            rendered = file.rendered,
        ));
    }
    match paste.expires_at {
        Some(expires_at) => body.push_str(&format!("<footer>Expires {}</footer>", expires_at.to_rfc3339())),
        None => body.push_str("<footer>Never expires</footer>"),
    }
    page(&paste.slug, &body)
}

fn render_created(receipt: &PasteReceipt) -> String {
    let body = format!(
        "<p>Paste: <a id=\"paste-link\" href=\"/{slug}\">/{slug}</a></p><p>Keep this link to remove the paste: <a id=\"removal-link\" href=\"/remove/{removal}\">/remove/{removal}</a></p>",
        slug = escape_html(&receipt.slug),
        removal = escape_html(&receipt.removal),
    );
    page("Paste created", &body)
}

/// Attachment name for a download: the file name with anything outside
/// `[A-Za-z0-9._-]` replaced, or the slug when nothing usable is left.
fn download_name(filename: Option<&str>, slug: &str) -> String {
    let cleaned: String = filename
        .unwrap_or_default()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches(|ch| ch == '.' || ch == '_').is_empty() {
        slug.to_string()
    } else {
        cleaned
    }
}

fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3 + 16);
    for (row, chunk) in bytes.chunks(HEX_ROW).enumerate() {
        out.push_str(&format!("{:08x}  {}\n", row * HEX_ROW, hex::encode(chunk)));
    }
    out
}

fn plain_text(body: String) -> Response {
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
}

/// Blank creation form.
pub async fn index(
    State(state): State<AppState>,
    ClientAddr(client): ClientAddr,
) -> Result<Html<String>, HttpError> {
    state.limiter.check(&client, Area::Read)?;
    Ok(Html(render_form(
        state.service.expiries(),
        "",
        &state.config.default_lexer,
    )))
}

/// Create a paste from the website form.
///
/// # Errors
/// 400 for rejected content, 429 when rate limited.
pub async fn create_paste(
    State(state): State<AppState>,
    ClientAddr(client): ClientAddr,
    Form(form): Form<WebForm>,
) -> Result<Html<String>, HttpError> {
    state.limiter.check(&client, Area::Create)?;
    let receipt = state.service.create(NewPaste::from(form))?;
    Ok(Html(render_created(&receipt)))
}

/// Creation form prefilled with an existing file's content and lexer.
///
/// # Errors
/// 404 when the file is unknown or its paste expired, 429 when rate limited.
pub async fn repaste(
    State(state): State<AppState>,
    ClientAddr(client): ClientAddr,
    Path(slug): Path<String>,
) -> Result<Html<String>, HttpError> {
    state.limiter.check(&client, Area::Read)?;
    let file = state.service.file(require_slug(&slug)?)?;
    Ok(Html(render_form(state.service.expiries(), &file.raw, &file.lexer)))
}

/// Show every file of the paste a slug belongs to.
///
/// # Errors
/// 404 when the slug is unknown or its paste expired, 429 when rate limited.
pub async fn show_paste(
    State(state): State<AppState>,
    ClientAddr(client): ClientAddr,
    Path(slug): Path<String>,
) -> Result<Html<String>, HttpError> {
    state.limiter.check(&client, Area::Read)?;
    let paste = state.service.lookup(require_slug(&slug)?)?;
    Ok(Html(render_paste(&paste)))
}

/// Serve one file's raw content. Mounted at `/raw/:slug` and `/:slug/raw`.
///
/// # Errors
/// 404 when the file is unknown or its paste expired, 429 when rate limited.
pub async fn raw_file(
    State(state): State<AppState>,
    ClientAddr(client): ClientAddr,
    Path(slug): Path<String>,
) -> Result<Response, HttpError> {
    state.limiter.check(&client, Area::Read)?;
    let file = state.service.file(require_slug(&slug)?)?;
    Ok(plain_text(file.raw))
}

/// Serve one file's bytes as a hex dump, sixteen bytes per row.
pub async fn hex_file(
    State(state): State<AppState>,
    ClientAddr(client): ClientAddr,
    Path(slug): Path<String>,
) -> Result<Response, HttpError> {
    state.limiter.check(&client, Area::Read)?;
    let file = state.service.file(require_slug(&slug)?)?;
    Ok(plain_text(hex_dump(file.raw.as_bytes())))
}

/// Serve one file as an attachment.
pub async fn download_file(
    State(state): State<AppState>,
    ClientAddr(client): ClientAddr,
    Path(slug): Path<String>,
) -> Result<Response, HttpError> {
    state.limiter.check(&client, Area::Read)?;
    let file = state.service.file(require_slug(&slug)?)?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        download_name(file.filename.as_deref(), &file.slug)
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.raw,
    )
        .into_response())
}

/// Remove the paste owning a removal token.
///
/// # Errors
/// 404 for unknown tokens and expired pastes, 429 when rate limited.
pub async fn remove_paste(
    State(state): State<AppState>,
    ClientAddr(client): ClientAddr,
    Path(token): Path<String>,
) -> Result<Response, HttpError> {
    state.limiter.check(&client, Area::Delete)?;
    let slug = state.service.remove(require_slug(&token)?)?;
    Ok(plain_text(format!("Paste {} has been removed.\n", slug)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stashbin_core::models::paste::File;

    #[test]
    fn page_escapes_metadata_but_keeps_rendered_html() {
        let paste = Paste {
            slug: "AB".to_string(),
            removal: "CD".to_string(),
            created_at: Utc::now(),
            expires_at: None,
            source: "test".to_string(),
            files: vec![File {
                slug: "AB".to_string(),
                paste_slug: "AB".to_string(),
                raw: "x".to_string(),
                rendered: "<table>x</table>".to_string(),
                lexer: "text".to_string(),
                filename: Some("<b>name</b>".to_string()),
                created_at: Utc::now(),
            }],
        };
        let page = render_paste(&paste);
        assert!(page.contains("&lt;b&gt;name&lt;/b&gt;"));
        assert!(page.contains("<table>x</table>"));
        assert!(page.contains("href=\"/download/AB\""));
        assert!(page.contains("Never expires"));
    }

    #[test]
    fn web_form_submissions_are_tagged_web() {
        let submission = NewPaste::from(WebForm {
            raw: Some("body".to_string()),
            lexer: Some("rust".to_string()),
            expiry: None,
            filename: Some("main.rs".to_string()),
            long: Some("on".to_string()),
        });
        assert_eq!(submission.source, "web");
        assert!(submission.long);
        assert!(matches!(submission.expiry, ExpiryRequest::Named(ref name) if name == "1day"));
        assert_eq!(submission.files[0].filename.as_deref(), Some("main.rs"));
    }

    #[test]
    fn form_preselects_lexer_and_escapes_content() {
        let mut expiries = BTreeMap::new();
        expiries.insert("1day".to_string(), 86_400);
        let form = render_form(&expiries, "</textarea><script>", "rust");
        assert!(form.contains("<option value=\"rust\" selected>"));
        assert!(form.contains("<option value=\"1day\" selected>"));
        assert!(form.contains("&lt;/textarea&gt;&lt;script&gt;"));
    }

    #[test]
    fn download_names_are_sanitised() {
        assert_eq!(download_name(Some("hello.py"), "AB"), "hello.py");
        assert_eq!(download_name(Some("a\"b;c.txt"), "AB"), "a_b_c.txt");
        assert_eq!(download_name(Some("\"\""), "AB"), "AB");
        assert_eq!(download_name(None, "AB"), "AB");
    }

    #[test]
    fn hex_dump_rows_carry_offsets() {
        let dump = hex_dump(&[0xAB; 17]);
        let rows: Vec<&str> = dump.lines().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], format!("00000000  {}", "ab".repeat(16)));
        assert_eq!(rows[1], "00000010  ab");
    }
}
