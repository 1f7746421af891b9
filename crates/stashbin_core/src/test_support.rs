//! Shared test-only helpers for stashbin_core.

use crate::db::{EntityKind, PasteStore};
use crate::error::AppError;
use crate::models::paste::{File, Paste};
use crate::Database;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;

/// Creates an isolated temporary database and returns it with the temp dir.
///
/// Keep the [`TempDir`] alive for the full test to preserve the backing files.
///
/// # Panics
/// Panics if temp-dir creation or database initialization fails.
pub(crate) fn setup_temp_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("temp dir");
    let db_path = temp_dir.path().join("db");
    let db = Database::new(db_path.to_str().expect("db path")).expect("db");
    (db, temp_dir)
}

/// Build a paste row with the given file slugs; the first file shares `slug`.
pub(crate) fn sample_paste(
    slug: &str,
    removal: &str,
    extra_file_slugs: &[&str],
    expires_at: Option<DateTime<Utc>>,
) -> Paste {
    let created_at = Utc::now() - Duration::seconds(10);
    let mut file_slugs = vec![slug];
    file_slugs.extend_from_slice(extra_file_slugs);
    let files = file_slugs
        .iter()
        .enumerate()
        .map(|(index, file_slug)| File {
            slug: (*file_slug).to_string(),
            paste_slug: slug.to_string(),
            raw: format!("content {}", index),
            rendered: format!("<pre>content {}</pre>", index),
            lexer: "text".to_string(),
            filename: Some(format!("file-{}.txt", index)),
            created_at,
        })
        .collect();
    Paste {
        slug: slug.to_string(),
        removal: removal.to_string(),
        created_at,
        expires_at,
        source: "test".to_string(),
        files,
    }
}

/// In-memory store with a fixed row count and a scripted set of taken slugs.
///
/// Only the calls made by slug allocation are meaningful; inserts record the
/// paste so tests can inspect what would have been persisted.
#[derive(Default)]
pub(crate) struct StubStore {
    pub(crate) pastes: u64,
    pub(crate) files: u64,
    pub(crate) taken: HashSet<String>,
    pub(crate) everything_taken: bool,
    pub(crate) exists_calls: AtomicUsize,
    pub(crate) inserted: Mutex<Vec<Paste>>,
}

impl StubStore {
    pub(crate) fn with_rows(pastes: u64, files: u64) -> Self {
        Self {
            pastes,
            files,
            ..Self::default()
        }
    }

    pub(crate) fn saturated() -> Self {
        Self {
            everything_taken: true,
            ..Self::default()
        }
    }
}

impl PasteStore for StubStore {
    fn count(&self, kind: EntityKind) -> Result<u64, AppError> {
        Ok(match kind {
            EntityKind::Paste => self.pastes,
            EntityKind::File => self.files,
        })
    }

    fn exists(&self, slug: &str) -> Result<bool, AppError> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.everything_taken || self.taken.contains(slug))
    }

    fn insert(&self, paste: &Paste) -> Result<(), AppError> {
        self.inserted
            .lock()
            .map_err(|_| AppError::Internal)?
            .push(paste.clone());
        Ok(())
    }

    fn delete(&self, _slug: &str) -> Result<bool, AppError> {
        Ok(false)
    }

    fn find_paste(&self, _slug: &str) -> Result<Option<Paste>, AppError> {
        Ok(None)
    }

    fn find_file(&self, _slug: &str) -> Result<Option<File>, AppError> {
        Ok(None)
    }

    fn find_by_removal_token(&self, _token: &str) -> Result<Option<Paste>, AppError> {
        Ok(None)
    }

    fn find_expired(&self, _now: DateTime<Utc>) -> Result<Vec<Paste>, AppError> {
        Ok(Vec::new())
    }
}
