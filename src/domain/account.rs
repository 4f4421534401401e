//! Account entity
//!
//! An account's balance is only ever changed by posting a ledger entry:
//! `Account::post` computes the new balance and the entry together, and the
//! store persists both in one commit.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{Amount, AmountError, LedgerError, Transaction, TransactionType};

/// Account type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Checking,
    Savings,
    Credit,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Checking => "CHECKING",
            AccountType::Savings => "SAVINGS",
            AccountType::Credit => "CREDIT",
        }
    }

    /// How far below zero a debit may take the balance.
    ///
    /// `None` means no limit is enforced (CREDIT accounts).
    pub fn overdraft_limit(&self) -> Option<Decimal> {
        match self {
            AccountType::Checking | AccountType::Savings => Some(Decimal::ZERO),
            AccountType::Credit => None,
        }
    }
}

impl Default for AccountType {
    fn default() -> Self {
        Self::Checking
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CHECKING" => Ok(AccountType::Checking),
            "SAVINGS" => Ok(AccountType::Savings),
            "CREDIT" => Ok(AccountType::Credit),
            other => Err(format!("unknown account type: {other}")),
        }
    }
}

/// Persisted account state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Store-assigned primary key
    pub id: Uuid,
    /// Unique, externally visible, immutable after creation
    pub account_number: String,
    pub owner_name: String,
    pub balance: Decimal,
    pub account_type: AccountType,
    pub created_at: DateTime<Utc>,
    /// Optimistic concurrency token, bumped by every committed write
    pub version: i64,
}

/// Account about to be inserted; the store assigns `id` and `version`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub account_number: String,
    pub owner_name: String,
    pub account_type: AccountType,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

/// One leg applied to an account: the entry to append and the version the
/// account must still have when it is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub expected_version: i64,
    pub entry: Transaction,
}

impl Posting {
    pub fn account_number(&self) -> &str {
        &self.entry.account_number
    }

    pub fn new_balance(&self) -> Decimal {
        self.entry.balance_after
    }
}

impl Account {
    /// Compute one leg against the current state without mutating it.
    ///
    /// Debits are checked against the account type's overdraft limit.
    pub fn post(
        &self,
        amount: Amount,
        transaction_type: TransactionType,
        description: impl Into<String>,
    ) -> Result<Posting, LedgerError> {
        let value = amount.value();

        if !transaction_type.is_credit() {
            if let Some(limit) = self.account_type.overdraft_limit() {
                if self.balance + limit < value {
                    return Err(LedgerError::insufficient_funds(
                        &self.account_number,
                        self.balance,
                        value,
                    ));
                }
            }
        }

        let new_balance = if transaction_type.is_credit() {
            self.balance.checked_add(value)
        } else {
            self.balance.checked_sub(value)
        }
        .ok_or(AmountError::Overflow)?;

        Ok(Posting {
            expected_version: self.version,
            entry: Transaction::record(
                &self.account_number,
                amount,
                transaction_type,
                description,
                new_balance,
            ),
        })
    }
}
