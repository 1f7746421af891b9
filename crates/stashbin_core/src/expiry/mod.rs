//! Removal of expired pastes, lazily on access and actively by sweep.
//!
//! Both paths go through [`PasteStore::delete`], which is idempotent, so a
//! paste can be caught by a reader and the sweep at the same time without
//! either side failing.

use crate::db::PasteStore;
use crate::error::AppError;
use crate::models::paste::Paste;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Deletes pastes whose expiry lies in the past.
#[derive(Clone)]
pub struct ExpiryReaper {
    store: Arc<dyn PasteStore>,
}

impl ExpiryReaper {
    pub fn new(store: Arc<dyn PasteStore>) -> Self {
        Self { store }
    }

    /// Pass `paste` through if it is still live at `now`.
    ///
    /// An expired paste is deleted on the spot, and the caller sees the same
    /// [`AppError::NotFound`] it would get for a slug that never existed.
    ///
    /// # Errors
    /// [`AppError::NotFound`] for expired pastes; storage errors from the delete.
    pub fn enforce_not_expired(&self, paste: Paste, now: DateTime<Utc>) -> Result<Paste, AppError> {
        if !paste.is_expired(now) {
            return Ok(paste);
        }
        let removed = self.store.delete(&paste.slug)?;
        tracing::warn!(
            "Paste {} was accessed past its expiry ({})",
            paste.slug,
            if removed { "deleted" } else { "already gone" }
        );
        Err(AppError::NotFound)
    }

    /// Delete every paste expired at `now`.
    ///
    /// # Returns
    /// The number of pastes this call removed. Rows deleted concurrently by
    /// someone else are not counted.
    ///
    /// # Errors
    /// Storage errors from the scan or a delete.
    pub fn reap(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let expired = self.store.find_expired(now)?;
        let mut removed = 0;
        for paste in &expired {
            if self.store.delete(&paste.slug)? {
                removed += 1;
            }
        }
        tracing::info!("Reaped {} expired paste(s)", removed);
        Ok(removed)
    }
}
