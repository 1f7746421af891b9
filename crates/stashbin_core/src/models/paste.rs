//! Paste and file models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored file. Owned by exactly one [`Paste`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct File {
    pub slug: String,
    pub paste_slug: String,
    pub raw: String,
    /// Rendered HTML, written once at creation time.
    pub rendered: String,
    pub lexer: String,
    pub filename: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A paste and its files, in creation order.
///
/// The paste slug equals the slug of its first file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Paste {
    pub slug: String,
    /// Secret used only for owner-initiated removal.
    pub removal: String,
    pub created_at: DateTime<Utc>,
    /// `None` means the paste never expires.
    pub expires_at: Option<DateTime<Utc>>,
    /// Entry point that created the paste (`v1-api`, `curl`, `cli`, ...).
    pub source: String,
    pub files: Vec<File>,
}

impl Paste {
    /// Whether the paste is past its expiry at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at < now)
    }

    /// Iterate every slug this paste occupies, paste slug first.
    ///
    /// The first file shares the paste slug, so it may appear twice.
    pub fn slugs(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.slug.as_str()).chain(self.files.iter().map(|file| file.slug.as_str()))
    }
}

/// One file of a submission, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct NewFile {
    #[serde(default)]
    pub lexer: Option<String>,
    pub content: String,
    #[serde(default, alias = "name")]
    pub filename: Option<String>,
}

/// Requested lifetime for a new paste.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ExpiryRequest {
    /// A key of the configured expiries table.
    Named(String),
    /// Explicit lifetime in seconds. Zero means "never expires".
    Seconds(u64),
}

/// A paste submission as handed to [`crate::PasteService::create`].
#[derive(Debug, Clone)]
pub struct NewPaste {
    pub files: Vec<NewFile>,
    pub expiry: ExpiryRequest,
    /// Opt into fixed-width, hard-to-guess slugs.
    pub long: bool,
    pub source: String,
}

/// Identifiers handed back to the submitter.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PasteReceipt {
    pub slug: String,
    pub removal: String,
    pub file_slugs: Vec<String>,
}

impl From<&Paste> for PasteReceipt {
    fn from(value: &Paste) -> Self {
        Self {
            slug: value.slug.clone(),
            removal: value.removal.clone(),
            file_slugs: value.files.iter().map(|file| file.slug.clone()).collect(),
        }
    }
}
