//! Command definitions
//!
//! Commands carry raw caller input into the engine; validation happens there.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{AccountType, Transaction};

// =========================================================================
// CreateAccountCommand
// =========================================================================

/// Command to open a new account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountCommand {
    pub owner_name: String,
    pub account_type: AccountType,
    /// Opening balance, may be zero
    pub initial_deposit: Decimal,
}

impl CreateAccountCommand {
    pub fn new(owner_name: impl Into<String>, account_type: AccountType) -> Self {
        Self {
            owner_name: owner_name.into(),
            account_type,
            initial_deposit: Decimal::ZERO,
        }
    }

    pub fn with_initial_deposit(mut self, initial_deposit: Decimal) -> Self {
        self.initial_deposit = initial_deposit;
        self
    }
}

// =========================================================================
// MovementCommand
// =========================================================================

/// Command for a single-account deposit or withdrawal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementCommand {
    pub amount: Decimal,
    pub description: Option<String>,
}

impl MovementCommand {
    pub fn new(amount: Decimal) -> Self {
        Self {
            amount,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

// =========================================================================
// TransferCommand
// =========================================================================

/// Command to move money between two accounts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferCommand {
    pub from_account_number: String,
    pub to_account_number: String,
    pub amount: Decimal,
    pub description: Option<String>,
}

impl TransferCommand {
    pub fn new(
        from_account_number: impl Into<String>,
        to_account_number: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self {
            from_account_number: from_account_number.into(),
            to_account_number: to_account_number.into(),
            amount,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Both legs of a committed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    pub out_transaction: Transaction,
    pub in_transaction: Transaction,
    pub amount: Decimal,
}
