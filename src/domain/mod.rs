//! Domain module
//!
//! Core ledger types and business rules.

pub mod account;
pub mod amount;
pub mod context;
pub mod error;
pub mod events;
pub mod transaction;

pub use account::{Account, AccountType, NewAccount, Posting};
pub use amount::{opening_balance, Amount, AmountError};
pub use context::OperationContext;
pub use error::LedgerError;
pub use events::TransactionEvent;
pub use transaction::{Transaction, TransactionType};
