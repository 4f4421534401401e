//! Domain Error Types
//!
//! Pure ledger errors that don't depend on infrastructure. Every variant has
//! a stable code so adapters can render precise feedback without parsing
//! messages.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use super::AmountError;

/// Failure taxonomy of the ledger engine
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    /// Malformed or out-of-range input (caller's fault, never retried)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Referenced account number does not exist
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Withdrawal or transfer-out would take a non-credit account negative
    #[error(
        "Insufficient funds on account {account_number}: balance {current_balance}, requested {requested_amount}, short by {deficiency}"
    )]
    InsufficientFunds {
        account_number: String,
        current_balance: Decimal,
        requested_amount: Decimal,
        deficiency: Decimal,
    },

    /// Optimistic version check lost a race (safe to retry the whole operation)
    #[error("Concurrent modification of account {account_number}")]
    ConcurrentModification { account_number: String },

    /// Could not find an unused account number within the retry budget
    #[error("Account number generation exhausted after {attempts} attempts")]
    GenerationExhausted { attempts: u32 },

    /// Underlying store failed; effect of the operation is indeterminate
    #[error("Storage failure: {0}")]
    StorageFailure(String),

    /// Idempotency key was already used for a different request
    #[error("Idempotency key {0} was already used for a different request")]
    IdempotencyConflict(Uuid),
}

impl LedgerError {
    /// Create an insufficient funds error; deficiency is derived
    pub fn insufficient_funds(
        account_number: impl Into<String>,
        current_balance: Decimal,
        requested_amount: Decimal,
    ) -> Self {
        Self::InsufficientFunds {
            account_number: account_number.into(),
            current_balance,
            requested_amount,
            deficiency: requested_amount - current_balance,
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Stable identity of the failure kind
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::AccountNotFound(_) => "account_not_found",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::ConcurrentModification { .. } => "concurrent_modification",
            Self::GenerationExhausted { .. } => "generation_exhausted",
            Self::StorageFailure(_) => "storage_failure",
            Self::IdempotencyConflict(_) => "idempotency_conflict",
        }
    }

    /// Check if this is a client error (caller's fault)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_)
                | Self::AccountNotFound(_)
                | Self::InsufficientFunds { .. }
                | Self::IdempotencyConflict(_)
        )
    }

    /// Check if retrying the whole operation may help
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification { .. })
    }
}

impl From<AmountError> for LedgerError {
    fn from(err: AmountError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}
