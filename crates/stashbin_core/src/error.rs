//! Application error types for core storage and domain logic.
use crate::limits::Area;
use thiserror::Error;

/// Top-level application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] redb::Error),

    #[error("Storage error: {0}")]
    StorageMessage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Absent and expired content are reported identically.
    #[error("Not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error("Spam score {score} exceeds the allowed maximum of {limit}")]
    Spam { score: u32, limit: u32 },

    #[error("Rate limit exceeded for {area}")]
    RateLimited { area: Area },

    #[error("Could not allocate a free slug after {attempts} attempts")]
    AllocationExhausted { attempts: u32 },

    #[error("Slug '{slug}' is already taken")]
    StorageConflict { slug: String },

    #[error("Internal server error")]
    Internal,
}

impl From<redb::DatabaseError> for AppError {
    fn from(value: redb::DatabaseError) -> Self {
        Self::Database(value.into())
    }
}

impl From<redb::TransactionError> for AppError {
    fn from(value: redb::TransactionError) -> Self {
        Self::Database(value.into())
    }
}

impl From<redb::TableError> for AppError {
    fn from(value: redb::TableError) -> Self {
        Self::Database(value.into())
    }
}

impl From<redb::StorageError> for AppError {
    fn from(value: redb::StorageError) -> Self {
        Self::Database(value.into())
    }
}

impl From<redb::CommitError> for AppError {
    fn from(value: redb::CommitError) -> Self {
        Self::Database(value.into())
    }
}
