//! Reservation scope for the slugs of one paste creation.

use super::{SlugAllocator, SlugMode};
use crate::error::AppError;
use std::collections::HashSet;

/// Hands out slugs for one paste and its files, pairwise distinct before commit.
///
/// Each [`SlugBatch::next_slug`] call sees every slug reserved earlier in the
/// same batch. The reservation set lives only as long as the batch and is
/// cleared on drop, whichever way the creation ends.
pub struct SlugBatch<'a> {
    allocator: &'a SlugAllocator,
    mode: SlugMode,
    reserved: HashSet<String>,
}

impl<'a> SlugBatch<'a> {
    pub(super) fn new(allocator: &'a SlugAllocator, mode: SlugMode) -> Self {
        Self {
            allocator,
            mode,
            reserved: HashSet::new(),
        }
    }

    /// Allocate the next slug and reserve it for the rest of the batch.
    ///
    /// # Errors
    /// Propagates [`AppError::AllocationExhausted`] and storage errors.
    pub fn next_slug(&mut self) -> Result<String, AppError> {
        let slug = self.allocator.allocate(self.mode, &self.reserved)?;
        self.reserved.insert(slug.clone());
        Ok(slug)
    }

    /// Swap `old` for a freshly drawn slug.
    ///
    /// `old` leaves the reservations first, so a slug lost to a commit conflict
    /// does not widen the slugs drawn after it.
    ///
    /// # Errors
    /// Propagates [`AppError::AllocationExhausted`] and storage errors.
    pub fn replace(&mut self, old: &str) -> Result<String, AppError> {
        self.reserved.remove(old);
        self.next_slug()
    }

    /// Draw a fixed-width removal token that also avoids this batch's slugs.
    ///
    /// The token is not added to the reservations, so it does not inflate the
    /// adaptive width of later slugs.
    ///
    /// # Errors
    /// Propagates [`AppError::AllocationExhausted`] and storage errors.
    pub fn removal_token(&self) -> Result<String, AppError> {
        self.allocator
            .allocate(SlugMode::removal_token(), &self.reserved)
    }

    /// Number of slugs handed out so far.
    pub fn len(&self) -> usize {
        self.reserved.len()
    }

    /// Whether no slug has been handed out yet.
    pub fn is_empty(&self) -> bool {
        self.reserved.is_empty()
    }

    /// Whether `slug` was handed out by this batch.
    pub fn contains(&self, slug: &str) -> bool {
        self.reserved.contains(slug)
    }

    /// End the batch explicitly.
    pub fn release(self) {}
}

impl Drop for SlugBatch<'_> {
    fn drop(&mut self) {
        if !self.reserved.is_empty() {
            tracing::trace!("Releasing {} slug reservation(s)", self.reserved.len());
        }
        self.reserved.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_paste, setup_temp_db, StubStore};
    use crate::PasteStore;
    use std::sync::Arc;

    #[test]
    fn batch_slugs_are_distinct_and_absent_from_storage() {
        let (db, _temp) = setup_temp_db();
        let db = Arc::new(db);
        for index in 0..40u32 {
            let slug = format!("SEED{}", index);
            let removal = format!("REMOVAL{}", index);
            db.insert(&sample_paste(&slug, &removal, &[], None))
                .unwrap();
        }

        let allocator = SlugAllocator::new(db.clone(), 10, 1);
        let mut batch = allocator.batch(SlugMode::Adaptive);
        let slugs: Vec<String> = (0..30).map(|_| batch.next_slug().unwrap()).collect();

        let unique: HashSet<&String> = slugs.iter().collect();
        assert_eq!(unique.len(), slugs.len());
        for slug in &slugs {
            assert!(!db.exists(slug).unwrap(), "{} already stored", slug);
            assert!(batch.contains(slug));
        }
        assert_eq!(batch.len(), 30);
    }

    #[test]
    fn later_slugs_account_for_earlier_reservations() {
        // 127 stored rows: the first slug fits in one byte, the second needs two.
        let allocator = SlugAllocator::new(Arc::new(StubStore::with_rows(64, 63)), 10, 1);
        let mut batch = allocator.batch(SlugMode::Adaptive);
        let first = batch.next_slug().unwrap();
        let second = batch.next_slug().unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 4);
    }

    #[test]
    fn replaced_slug_no_longer_counts_toward_width() {
        let allocator = SlugAllocator::new(Arc::new(StubStore::with_rows(64, 63)), 10, 1);
        let mut batch = allocator.batch(SlugMode::Adaptive);
        let first = batch.next_slug().unwrap();
        let replacement = batch.replace(&first).unwrap();

        assert_eq!(replacement.len(), 2);
        assert_eq!(batch.len(), 1);
        assert!(batch.contains(&replacement));
        assert!(!batch.contains(&first) || replacement == first);
    }

    #[test]
    fn removal_token_is_fixed_width_and_not_reserved() {
        let allocator = SlugAllocator::new(Arc::new(StubStore::default()), 10, 1);
        let mut batch = allocator.batch(SlugMode::Adaptive);
        batch.next_slug().unwrap();
        let token = batch.removal_token().unwrap();
        assert_eq!(token.len(), 13);
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn fresh_batches_start_empty() {
        let allocator = SlugAllocator::new(Arc::new(StubStore::default()), 10, 1);
        {
            let mut batch = allocator.batch(SlugMode::Adaptive);
            batch.next_slug().unwrap();
            batch.release();
        }
        let batch = allocator.batch(SlugMode::Adaptive);
        assert!(batch.is_empty());
    }
}
