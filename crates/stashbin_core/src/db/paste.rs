//! Paste and file persistence backed by redb.

use super::tables::{FILES, PASTES, PASTES_BY_EXPIRY, PASTES_BY_REMOVAL};
use super::{Database, EntityKind, PasteStore};
use crate::error::AppError;
use crate::models::paste::{File, Paste};
use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable, ReadableTableMetadata};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Canonical paste row. Files live in their own table, referenced in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PasteRow {
    slug: String,
    removal: String,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    source: String,
    file_slugs: Vec<String>,
}

impl From<&Paste> for PasteRow {
    fn from(value: &Paste) -> Self {
        Self {
            slug: value.slug.clone(),
            removal: value.removal.clone(),
            created_at: value.created_at,
            expires_at: value.expires_at,
            source: value.source.clone(),
            file_slugs: value.files.iter().map(|file| file.slug.clone()).collect(),
        }
    }
}

impl PasteRow {
    fn expiry_key(&self) -> Option<u64> {
        self.expires_at.map(expiry_millis)
    }

    fn into_paste(self, files: Vec<File>) -> Paste {
        Paste {
            slug: self.slug,
            removal: self.removal,
            created_at: self.created_at,
            expires_at: self.expires_at,
            source: self.source,
            files,
        }
    }
}

fn expiry_millis(at: DateTime<Utc>) -> u64 {
    u64::try_from(at.timestamp_millis()).unwrap_or(0)
}

pub(super) fn init_tables(db: &redb::Database) -> Result<(), AppError> {
    let write_txn = db.begin_write()?;
    write_txn.open_table(PASTES)?;
    write_txn.open_table(FILES)?;
    write_txn.open_table(PASTES_BY_REMOVAL)?;
    write_txn.open_table(PASTES_BY_EXPIRY)?;
    write_txn.commit()?;
    Ok(())
}

fn load_paste<P, F>(pastes: &P, files: &F, slug: &str) -> Result<Option<Paste>, AppError>
where
    P: ReadableTable<&'static str, &'static [u8]>,
    F: ReadableTable<&'static str, &'static [u8]>,
{
    let Some(guard) = pastes.get(slug)? else {
        return Ok(None);
    };
    let row: PasteRow = bincode::deserialize(guard.value())?;
    drop(guard);

    let mut loaded = Vec::with_capacity(row.file_slugs.len());
    for file_slug in &row.file_slugs {
        let Some(file_guard) = files.get(file_slug.as_str())? else {
            return Err(AppError::StorageMessage(format!(
                "Paste '{}' references missing file '{}'",
                row.slug, file_slug
            )));
        };
        loaded.push(bincode::deserialize(file_guard.value())?);
    }
    Ok(Some(row.into_paste(loaded)))
}

impl PasteStore for Database {
    fn count(&self, kind: EntityKind) -> Result<u64, AppError> {
        let read_txn = self.db.begin_read()?;
        let count = match kind {
            EntityKind::Paste => read_txn.open_table(PASTES)?.len()?,
            EntityKind::File => read_txn.open_table(FILES)?.len()?,
        };
        Ok(count)
    }

    fn exists(&self, slug: &str) -> Result<bool, AppError> {
        let read_txn = self.db.begin_read()?;
        let pastes = read_txn.open_table(PASTES)?;
        let files = read_txn.open_table(FILES)?;
        let removals = read_txn.open_table(PASTES_BY_REMOVAL)?;
        Ok(pastes.get(slug)?.is_some()
            || files.get(slug)?.is_some()
            || removals.get(slug)?.is_some())
    }

    fn insert(&self, paste: &Paste) -> Result<(), AppError> {
        if paste.files.is_empty() {
            return Err(AppError::Validation("A paste needs at least one file".to_string()));
        }

        let row = PasteRow::from(paste);
        let encoded_row = bincode::serialize(&row)?;
        let mut encoded_files = Vec::with_capacity(paste.files.len());
        for file in &paste.files {
            encoded_files.push((file.slug.as_str(), bincode::serialize(file)?));
        }

        let write_txn = self.db.begin_write()?;
        {
            let mut pastes = write_txn.open_table(PASTES)?;
            let mut files = write_txn.open_table(FILES)?;
            let mut removals = write_txn.open_table(PASTES_BY_REMOVAL)?;
            let mut by_expiry = write_txn.open_table(PASTES_BY_EXPIRY)?;

            // The first file shares the paste slug; every other pair must differ.
            let mut claimed: HashSet<&str> = HashSet::new();
            claimed.insert(paste.slug.as_str());
            for (index, file) in paste.files.iter().enumerate() {
                let shares_paste_slug = index == 0 && file.slug == paste.slug;
                if !shares_paste_slug && !claimed.insert(file.slug.as_str()) {
                    return Err(AppError::StorageConflict {
                        slug: file.slug.clone(),
                    });
                }
            }
            if !claimed.insert(paste.removal.as_str()) {
                return Err(AppError::StorageConflict {
                    slug: paste.removal.clone(),
                });
            }

            for slug in paste.slugs().chain(std::iter::once(paste.removal.as_str())) {
                if pastes.get(slug)?.is_some()
                    || files.get(slug)?.is_some()
                    || removals.get(slug)?.is_some()
                {
                    return Err(AppError::StorageConflict {
                        slug: slug.to_string(),
                    });
                }
            }

            pastes.insert(paste.slug.as_str(), encoded_row.as_slice())?;
            for (slug, encoded) in &encoded_files {
                files.insert(*slug, encoded.as_slice())?;
            }
            removals.insert(paste.removal.as_str(), paste.slug.as_str())?;
            if let Some(key) = row.expiry_key() {
                by_expiry.insert((key, paste.slug.as_str()), ())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn delete(&self, slug: &str) -> Result<bool, AppError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut pastes = write_txn.open_table(PASTES)?;
            let mut files = write_txn.open_table(FILES)?;
            let mut removals = write_txn.open_table(PASTES_BY_REMOVAL)?;
            let mut by_expiry = write_txn.open_table(PASTES_BY_EXPIRY)?;

            let Some(guard) = pastes.get(slug)? else {
                return Ok(false);
            };
            let row: PasteRow = bincode::deserialize(guard.value())?;
            drop(guard);

            for file_slug in &row.file_slugs {
                let _ = files.remove(file_slug.as_str())?;
            }
            let _ = removals.remove(row.removal.as_str())?;
            if let Some(key) = row.expiry_key() {
                let _ = by_expiry.remove((key, slug))?;
            }
            let _ = pastes.remove(slug)?;
        }
        write_txn.commit()?;
        Ok(true)
    }

    fn find_paste(&self, slug: &str) -> Result<Option<Paste>, AppError> {
        let read_txn = self.db.begin_read()?;
        let pastes = read_txn.open_table(PASTES)?;
        let files = read_txn.open_table(FILES)?;
        load_paste(&pastes, &files, slug)
    }

    fn find_file(&self, slug: &str) -> Result<Option<File>, AppError> {
        let read_txn = self.db.begin_read()?;
        let files = read_txn.open_table(FILES)?;
        match files.get(slug)? {
            Some(value) => Ok(Some(bincode::deserialize(value.value())?)),
            None => Ok(None),
        }
    }

    fn find_by_removal_token(&self, token: &str) -> Result<Option<Paste>, AppError> {
        let read_txn = self.db.begin_read()?;
        let removals = read_txn.open_table(PASTES_BY_REMOVAL)?;
        let Some(guard) = removals.get(token)? else {
            return Ok(None);
        };
        let slug = guard.value().to_string();
        drop(guard);

        let pastes = read_txn.open_table(PASTES)?;
        let files = read_txn.open_table(FILES)?;
        load_paste(&pastes, &files, &slug)
    }

    fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<Paste>, AppError> {
        let cutoff = expiry_millis(now);
        let read_txn = self.db.begin_read()?;
        let by_expiry = read_txn.open_table(PASTES_BY_EXPIRY)?;
        let pastes = read_txn.open_table(PASTES)?;
        let files = read_txn.open_table(FILES)?;

        let mut slugs = Vec::new();
        for item in by_expiry.iter()? {
            let (key, _) = item?;
            let (expires_ms, slug) = key.value();
            if expires_ms > cutoff {
                break;
            }
            slugs.push(slug.to_string());
        }

        let mut expired = Vec::with_capacity(slugs.len());
        for slug in slugs {
            if let Some(paste) = load_paste(&pastes, &files, &slug)? {
                if paste.is_expired(now) {
                    expired.push(paste);
                }
            }
        }
        Ok(expired)
    }
}
