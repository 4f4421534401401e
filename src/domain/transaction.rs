//! Ledger entries
//!
//! A `Transaction` is an immutable record of one balance-affecting movement.
//! It is created exactly once per completed leg and never updated.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::Amount;

/// Kind of movement recorded by a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    TransferIn,
    TransferOut,
}

impl TransactionType {
    /// Storage / wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::TransferIn => "TRANSFER_IN",
            TransactionType::TransferOut => "TRANSFER_OUT",
        }
    }

    /// Whether this entry adds to the balance (DEPOSIT, TRANSFER_IN)
    pub fn is_credit(&self) -> bool {
        matches!(self, TransactionType::Deposit | TransactionType::TransferIn)
    }

    /// Signed effect of `amount` on the owning account's balance
    pub fn signed(&self, amount: Decimal) -> Decimal {
        if self.is_credit() {
            amount
        } else {
            -amount
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEPOSIT" => Ok(TransactionType::Deposit),
            "WITHDRAWAL" => Ok(TransactionType::Withdrawal),
            "TRANSFER_IN" => Ok(TransactionType::TransferIn),
            "TRANSFER_OUT" => Ok(TransactionType::TransferOut),
            other => Err(format!("unknown transaction type: {other}")),
        }
    }
}

/// Immutable ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub account_number: String,
    /// Always the positive magnitude of the movement
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    /// Owning account's balance immediately after this entry
    pub balance_after: Decimal,
}

impl Transaction {
    /// Build a new entry with a fresh id and the current time
    pub fn record(
        account_number: impl Into<String>,
        amount: Amount,
        transaction_type: TransactionType,
        description: impl Into<String>,
        balance_after: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_number: account_number.into(),
            amount: amount.value(),
            transaction_type,
            description: description.into(),
            timestamp: Utc::now(),
            balance_after,
        }
    }

    /// Signed effect of this entry on its account
    pub fn signed_amount(&self) -> Decimal {
        self.transaction_type.signed(self.amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_sign_convention() {
        assert_eq!(TransactionType::Deposit.signed(dec!(5)), dec!(5));
        assert_eq!(TransactionType::TransferIn.signed(dec!(5)), dec!(5));
        assert_eq!(TransactionType::Withdrawal.signed(dec!(5)), dec!(-5));
        assert_eq!(TransactionType::TransferOut.signed(dec!(5)), dec!(-5));
    }

    #[test]
    fn test_type_round_trips_through_storage_name() {
        for kind in [
            TransactionType::Deposit,
            TransactionType::Withdrawal,
            TransactionType::TransferIn,
            TransactionType::TransferOut,
        ] {
            assert_eq!(kind.as_str().parse::<TransactionType>().unwrap(), kind);
        }
        assert!("REFUND".parse::<TransactionType>().is_err());
    }

    #[test]
    fn test_serialized_type_name() {
        let json = serde_json::to_string(&TransactionType::TransferOut).unwrap();
        assert_eq!(json, r#""TRANSFER_OUT""#);
    }

    #[test]
    fn test_record() {
        let amount = Amount::new(dec!(42.10)).unwrap();
        let entry = Transaction::record("ACC1", amount, TransactionType::Withdrawal, "atm", dec!(57.90));

        assert_eq!(entry.account_number, "ACC1");
        assert_eq!(entry.amount, dec!(42.10));
        assert_eq!(entry.signed_amount(), dec!(-42.10));
        assert_eq!(entry.balance_after, dec!(57.90));
    }
}
