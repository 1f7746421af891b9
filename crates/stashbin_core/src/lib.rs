//! Core domain library for stashbin (config, storage, slugs, admission, expiry).

/// Configuration loading and defaults.
pub mod config;
/// Shared constants used across stashbin crates.
pub mod constants;
/// Storage port and the redb-backed implementation.
pub mod db;
/// Application error types (storage/domain).
pub mod error;
/// Lazy and periodic removal of expired pastes.
pub mod expiry;
/// Per-client admission control.
pub mod limits;
/// Paste and file models.
pub mod models;
/// File rendering.
pub mod render;
/// Paste creation, lookup and removal.
pub mod service;
/// Public identifier allocation.
pub mod slug;
/// Submission validation (lexers, spam scoring).
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::Config;
pub use constants::DEFAULT_PORT;
pub use db::{Database, EntityKind, PasteStore, SlugTarget};
pub use error::AppError;
pub use expiry::ExpiryReaper;
pub use limits::{Area, RateLimitConfig, RateLimiter};
pub use models::paste::{ExpiryRequest, File, NewFile, NewPaste, Paste, PasteReceipt};
pub use render::{PlainRenderer, Renderer};
pub use service::PasteService;
pub use slug::{SlugAllocator, SlugBatch, SlugMode};
