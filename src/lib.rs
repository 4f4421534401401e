//! Account ledger
//!
//! Accounts, an append-only ledger of balance movements, and the engine that
//! keeps the two consistent under concurrent access. Re-exports modules for
//! the server binary, the load test and integration tests.

pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod idempotency;
pub mod jobs;
pub mod notify;
pub mod store;

mod error;

pub use config::Config;
pub use domain::{
    Account, AccountType, Amount, AmountError, LedgerError, OperationContext, Transaction,
    TransactionEvent, TransactionType,
};
pub use engine::{
    CreateAccountCommand, EngineConfig, LedgerEngine, MovementCommand, ReconciliationReport,
    TransferCommand, TransferResult,
};
pub use error::{AppError, AppResult};
