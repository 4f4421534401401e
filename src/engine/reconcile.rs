//! Ledger reconciliation
//!
//! Replays an account's entries from zero and compares the result with the
//! stored balance and with every entry's `balance_after`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Account, Transaction};

/// Result of replaying one account's ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub account_number: String,
    /// Sum of signed entry amounts
    pub expected_balance: Decimal,
    pub stored_balance: Decimal,
    pub entry_count: usize,
    /// First entry whose `balance_after` disagrees with the running sum
    pub first_break: Option<Uuid>,
}

impl ReconciliationReport {
    pub fn is_consistent(&self) -> bool {
        self.first_break.is_none() && self.expected_balance == self.stored_balance
    }

    /// Stored balance minus replayed balance
    pub fn drift(&self) -> Decimal {
        self.stored_balance - self.expected_balance
    }
}

/// Replay `entries` (already in timestamp order) against `account`
pub fn replay(account: &Account, entries: &[Transaction]) -> ReconciliationReport {
    let mut running = Decimal::ZERO;
    let mut first_break = None;

    for entry in entries {
        running += entry.signed_amount();
        if first_break.is_none() && entry.balance_after != running {
            first_break = Some(entry.id);
        }
    }

    ReconciliationReport {
        account_number: account.account_number.clone(),
        expected_balance: running,
        stored_balance: account.balance,
        entry_count: entries.len(),
        first_break,
    }
}
