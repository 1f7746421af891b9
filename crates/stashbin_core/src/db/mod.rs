//! Storage port and the redb-backed implementation used by the server.

/// Paste and file persistence on redb.
pub mod paste;
/// redb table definitions.
pub mod tables;

use crate::error::AppError;
use crate::models::paste::{File, Paste};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Persisted entity kinds sharing the slug namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Paste,
    File,
}

/// Result of resolving a slug without knowing which kind it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlugTarget {
    Paste(Paste),
    File(File),
}

/// Narrow persistence interface consumed by slug allocation and expiry.
///
/// Implementations must provide transactional inserts: a paste and all of its
/// files are written together or not at all, and a slug that is already taken
/// fails the insert with [`AppError::StorageConflict`].
pub trait PasteStore: Send + Sync {
    /// Number of stored rows of `kind`.
    fn count(&self, kind: EntityKind) -> Result<u64, AppError>;

    /// Whether `slug` is taken by a paste, a file, or a removal token.
    fn exists(&self, slug: &str) -> Result<bool, AppError>;

    /// Insert a paste with all its files in one transaction.
    ///
    /// # Errors
    /// [`AppError::StorageConflict`] names the first slug found to be taken;
    /// nothing is written in that case.
    fn insert(&self, paste: &Paste) -> Result<(), AppError>;

    /// Delete a paste and its files.
    ///
    /// # Returns
    /// `true` when a row was removed, `false` when it was already gone.
    fn delete(&self, slug: &str) -> Result<bool, AppError>;

    /// Fetch a paste with its files, in creation order.
    fn find_paste(&self, slug: &str) -> Result<Option<Paste>, AppError>;

    /// Fetch a single file row.
    fn find_file(&self, slug: &str) -> Result<Option<File>, AppError>;

    /// Fetch the paste owning `token`.
    fn find_by_removal_token(&self, token: &str) -> Result<Option<Paste>, AppError>;

    /// Every paste whose expiry lies strictly before `now`.
    fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<Paste>, AppError>;

    /// Resolve a slug from the shared namespace; pastes win over their first file.
    fn find_by_slug(&self, slug: &str) -> Result<Option<SlugTarget>, AppError> {
        if let Some(paste) = self.find_paste(slug)? {
            return Ok(Some(SlugTarget::Paste(paste)));
        }
        Ok(self.find_file(slug)?.map(SlugTarget::File))
    }
}

/// Database handle wrapping a shared redb instance.
pub struct Database {
    pub db: Arc<redb::Database>,
}

impl Database {
    /// Open (or create) the database inside directory `path`.
    ///
    /// # Returns
    /// A fully initialized [`Database`].
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created, the file is held
    /// by another process, or table initialization fails.
    pub fn new(path: &str) -> Result<Self, AppError> {
        let dir = std::path::Path::new(path);
        std::fs::create_dir_all(dir).map_err(|err| {
            AppError::StorageMessage(format!(
                "Failed to create database directory {}: {}",
                dir.display(),
                err
            ))
        })?;

        let file = dir.join(tables::REDB_FILE_NAME);
        let db = match redb::Database::create(&file) {
            Ok(db) => db,
            Err(redb::DatabaseError::DatabaseAlreadyOpen) => {
                return Err(AppError::StorageMessage(format!(
                    "Database at {} is already open in another process.\n\
                    Stop the other stashbin instance, or set STASHBIN_DB_PATH to a different location.",
                    file.display()
                )));
            }
            Err(err) => return Err(err.into()),
        };

        Self::from_shared(Arc::new(db))
    }

    /// Build a handle around an already-open redb instance, creating tables.
    ///
    /// # Errors
    /// Returns an error if the tables cannot be created.
    pub fn from_shared(db: Arc<redb::Database>) -> Result<Self, AppError> {
        paste::init_tables(&db)?;
        Ok(Self { db })
    }

    /// Clone this handle for another subsystem in the same process.
    pub fn share(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}
