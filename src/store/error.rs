//! Store Errors
//!
//! Error types for account and ledger store operations.

use uuid::Uuid;

use crate::domain::LedgerError;

/// Errors that can occur in a store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No account with this number
    #[error("Account not found: {0}")]
    NotFound(String),

    /// Unique key already taken (account number or entry id)
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Optimistic concurrency conflict
    #[error("Version mismatch for account {account_number}: expected {expected}, found {actual}")]
    VersionMismatch {
        account_number: String,
        expected: i64,
        actual: i64,
    },

    /// Idempotency key already recorded by an earlier commit
    #[error("Idempotency key already exists: {0}")]
    DuplicateIdempotencyKey(Uuid),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored row could not be decoded
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    /// Store could not be reached or refused the operation
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Check if this error is a concurrency conflict
    pub fn is_version_mismatch(&self) -> bool {
        matches!(self, StoreError::VersionMismatch { .. })
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(account_number) => LedgerError::AccountNotFound(account_number),
            StoreError::VersionMismatch { account_number, .. } => {
                LedgerError::ConcurrentModification { account_number }
            }
            StoreError::DuplicateIdempotencyKey(key) => LedgerError::IdempotencyConflict(key),
            other => {
                tracing::error!(error = %other, "Store operation failed");
                LedgerError::StorageFailure(other.to_string())
            }
        }
    }
}
