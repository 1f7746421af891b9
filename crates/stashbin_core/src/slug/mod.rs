//! Public identifier allocation shared by pastes and files.
//!
//! Slugs are random bytes from the OS CSPRNG encoded as base-32. Adaptive
//! slugs grow with the corpus so that less than half of the identifier space
//! is ever in use; fixed slugs have a constant width. Allocation is
//! optimistic: candidates are checked against storage and the caller's
//! reservations, and the store's uniqueness check at commit stays the final
//! arbiter.

/// Batch-scoped slug reservations.
pub mod batch;
/// Base-32 encoding.
pub mod encoding;

pub use batch::SlugBatch;

use crate::constants::{LONG_SLUG_BYTES, REMOVAL_TOKEN_BYTES};
use crate::db::{EntityKind, PasteStore};
use crate::error::AppError;
use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::HashSet;
use std::sync::Arc;

/// How wide a newly drawn slug should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlugMode {
    /// Width follows corpus size.
    Adaptive,
    /// Constant width in bytes.
    Fixed(usize),
}

impl SlugMode {
    /// Fixed-width mode for callers that opt into hard-to-guess slugs.
    pub const fn long() -> Self {
        Self::Fixed(LONG_SLUG_BYTES)
    }

    /// Fixed-width mode used for removal tokens.
    pub const fn removal_token() -> Self {
        Self::Fixed(REMOVAL_TOKEN_BYTES)
    }
}

/// Smallest byte width `w >= min_width` with `2^(8w) >= 2n`.
///
/// # Arguments
/// - `n`: Rows that will exist once the new slug is taken.
/// - `min_width`: Configured lower bound, treated as at least one byte.
pub fn adaptive_width(n: u64, min_width: usize) -> usize {
    let doubled = n.max(1).saturating_mul(2);
    // ceil(log2(doubled)) for doubled >= 2
    let bits = (u64::BITS - (doubled - 1).leading_zeros()) as usize;
    let bytes = (bits + 7) / 8;
    bytes.max(min_width).max(1)
}

/// Draws slugs that collide with neither storage nor the caller's reservations.
#[derive(Clone)]
pub struct SlugAllocator {
    store: Arc<dyn PasteStore>,
    retries: u32,
    min_width: usize,
}

impl SlugAllocator {
    /// Construct an allocator over `store`.
    ///
    /// # Arguments
    /// - `store`: Storage consulted for existing slugs and row counts.
    /// - `retries`: Attempts before giving up; at least one is always made.
    /// - `min_width`: Lower bound for adaptive widths, in bytes.
    pub fn new(store: Arc<dyn PasteStore>, retries: u32, min_width: usize) -> Self {
        Self {
            store,
            retries: retries.max(1),
            min_width,
        }
    }

    /// Attempts made before [`AppError::AllocationExhausted`].
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Byte width the next slug drawn in `mode` would use.
    ///
    /// # Errors
    /// Propagates storage errors from row counting.
    pub fn width_for(&self, mode: SlugMode, reserved: usize) -> Result<usize, AppError> {
        match mode {
            SlugMode::Fixed(width) => Ok(width.max(1)),
            SlugMode::Adaptive => {
                let stored = self.store.count(EntityKind::Paste)?
                    + self.store.count(EntityKind::File)?;
                let n = stored + reserved as u64 + 1;
                Ok(adaptive_width(n, self.min_width))
            }
        }
    }

    /// Allocate a slug not present in storage nor in `reservations`.
    ///
    /// # Arguments
    /// - `mode`: Width policy for the new slug.
    /// - `reservations`: Slugs claimed by the current, uncommitted batch.
    ///
    /// # Returns
    /// A fresh base-32 slug.
    ///
    /// # Errors
    /// [`AppError::AllocationExhausted`] when every attempt collided, or a
    /// storage error from the existence checks.
    pub fn allocate(
        &self,
        mode: SlugMode,
        reservations: &HashSet<String>,
    ) -> Result<String, AppError> {
        let width = self.width_for(mode, reservations.len())?;
        let mut bytes = vec![0u8; width];

        for attempt in 1..=self.retries {
            OsRng.fill_bytes(&mut bytes);
            let candidate = encoding::encode(&bytes);
            if reservations.contains(&candidate) || self.store.exists(&candidate)? {
                tracing::debug!(
                    "Slug collision on attempt {}/{} at width {}",
                    attempt,
                    self.retries,
                    width
                );
                continue;
            }
            return Ok(candidate);
        }

        tracing::error!(
            "Slug allocation exhausted {} attempts at width {} ({} reserved)",
            self.retries,
            width,
            reservations.len()
        );
        Err(AppError::AllocationExhausted {
            attempts: self.retries,
        })
    }

    /// Open a reservation scope for one multi-entity creation.
    pub fn batch(&self, mode: SlugMode) -> SlugBatch<'_> {
        SlugBatch::new(self, mode)
    }
}
