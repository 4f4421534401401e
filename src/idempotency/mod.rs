//! Idempotency module
//!
//! A movement committed under an idempotency key records the key with its
//! entries. A later request with the same key is answered from those entries
//! instead of being applied again, provided it asks for the same thing.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{LedgerError, Transaction, TransactionType};

/// One leg a request would produce, used to match it against a stored result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedLeg {
    pub account_number: String,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
}

impl ExpectedLeg {
    pub fn new(
        account_number: impl Into<String>,
        transaction_type: TransactionType,
        amount: Decimal,
    ) -> Self {
        Self {
            account_number: account_number.into(),
            transaction_type,
            amount,
        }
    }

    fn matches(&self, entry: &Transaction) -> bool {
        entry.account_number == self.account_number
            && entry.transaction_type == self.transaction_type
            && entry.amount == self.amount
    }
}

/// Check that entries stored under `key` answer the request described by
/// `expected`, leg for leg and in order.
///
/// Descriptions are not compared; defaults may differ between callers.
pub fn verify_replay(
    key: Uuid,
    entries: Vec<Transaction>,
    expected: &[ExpectedLeg],
) -> Result<Vec<Transaction>, LedgerError> {
    let same_shape = entries.len() == expected.len()
        && entries
            .iter()
            .zip(expected)
            .all(|(entry, leg)| leg.matches(entry));

    if !same_shape {
        tracing::warn!(idempotency_key = %key, "Idempotency key reused for a different request");
        return Err(LedgerError::IdempotencyConflict(key));
    }

    tracing::info!(idempotency_key = %key, legs = entries.len(), "Replaying committed result");
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Amount;
    use rust_decimal_macros::dec;

    fn entry(number: &str, kind: TransactionType, amount: Decimal) -> Transaction {
        Transaction::record(number, Amount::new(amount).unwrap(), kind, "t", amount)
    }

    #[test]
    fn test_matching_replay() {
        let key = Uuid::new_v4();
        let stored = vec![
            entry("ACC1", TransactionType::TransferOut, dec!(30)),
            entry("ACC2", TransactionType::TransferIn, dec!(30)),
        ];
        let expected = [
            ExpectedLeg::new("ACC1", TransactionType::TransferOut, dec!(30)),
            ExpectedLeg::new("ACC2", TransactionType::TransferIn, dec!(30.00)),
        ];

        let replayed = verify_replay(key, stored.clone(), &expected).unwrap();
        assert_eq!(replayed, stored);
    }

    #[test]
    fn test_different_amount_conflicts() {
        let key = Uuid::new_v4();
        let stored = vec![entry("ACC1", TransactionType::Deposit, dec!(50))];
        let expected = [ExpectedLeg::new("ACC1", TransactionType::Deposit, dec!(60))];

        assert_eq!(
            verify_replay(key, stored, &expected),
            Err(LedgerError::IdempotencyConflict(key))
        );
    }

    #[test]
    fn test_different_operation_conflicts() {
        let key = Uuid::new_v4();
        let stored = vec![entry("ACC1", TransactionType::Deposit, dec!(50))];
        let withdraw = [ExpectedLeg::new("ACC1", TransactionType::Withdrawal, dec!(50))];
        let transfer = [
            ExpectedLeg::new("ACC1", TransactionType::TransferOut, dec!(50)),
            ExpectedLeg::new("ACC2", TransactionType::TransferIn, dec!(50)),
        ];

        assert!(verify_replay(key, stored.clone(), &withdraw).is_err());
        assert!(verify_replay(key, stored, &transfer).is_err());
    }
}
