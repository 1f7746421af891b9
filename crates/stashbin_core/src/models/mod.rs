//! Data models for API requests and persistence.

/// Paste and file models.
pub mod paste;
