//! Domain Events
//!
//! Notification payloads handed to the event notifier after a commit.
//! Events are immutable facts that have already happened.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Transaction, TransactionType};

/// A completed movement on one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionEvent {
    pub transaction_id: Uuid,
    pub account_number: String,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub description: String,
    pub balance_after: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl TransactionEvent {
    /// Partition key for downstream delivery (all events of one account in order)
    pub fn key(&self) -> &str {
        &self.account_number
    }
}

impl From<&Transaction> for TransactionEvent {
    fn from(entry: &Transaction) -> Self {
        Self {
            transaction_id: entry.id,
            account_number: entry.account_number.clone(),
            amount: entry.amount,
            transaction_type: entry.transaction_type,
            description: entry.description.clone(),
            balance_after: entry.balance_after,
            timestamp: entry.timestamp,
        }
    }
}
