use common::UserId;
use thiserror::Error;

use crate::Version;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record changed between being read and being written.
    #[error("Concurrency conflict on {entity} {id}: expected version {expected}")]
    ConcurrencyConflict {
        entity: &'static str,
        id: String,
        expected: Version,
    },

    /// An update was staged for a record the transaction never read.
    #[error("{entity} {id} was not loaded in this transaction")]
    NotLoaded { entity: &'static str, id: String },

    /// Booking reference already taken.
    #[error("Booking reference already exists: {0}")]
    DuplicateReference(String),

    /// Room number already taken.
    #[error("Room number already exists: {0}")]
    DuplicateRoomNumber(String),

    /// The user already has a resident profile.
    #[error("User {0} already has a resident profile")]
    DuplicateResident(UserId),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A persisted row violates a domain invariant.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Returns true if re-running the operation from a fresh read may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::ConcurrencyConflict { .. } | StoreError::DuplicateReference(_)
        )
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
