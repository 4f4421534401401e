//! Store module
//!
//! Persistence boundary of the ledger core. The engine only talks to these
//! traits, so PostgreSQL and the in-memory store are interchangeable.
//!
//! Every balance write is conditioned on the account version read before it
//! (`compare_and_swap`). `LedgerRepository::commit` applies several such
//! writes plus their ledger entries all-or-nothing.

mod error;
pub mod memory;
pub mod postgres;

use std::future::Future;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{Account, NewAccount, Posting, Transaction};

pub use error::StoreError;
pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Keyed storage of accounts
pub trait AccountStore: Send + Sync {
    /// Load an account by number
    fn get(
        &self,
        account_number: &str,
    ) -> impl Future<Output = Result<Option<Account>, StoreError>> + Send;

    /// Check whether an account number is taken
    fn exists(&self, account_number: &str) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Insert a new account, together with its opening entry if any.
    ///
    /// Fails with `DuplicateKey` if the account number is taken.
    fn create(
        &self,
        account: NewAccount,
        opening: Option<Transaction>,
    ) -> impl Future<Output = Result<Account, StoreError>> + Send;

    /// Write a new balance only if the stored version is still `expected_version`
    fn compare_and_swap(
        &self,
        account_number: &str,
        expected_version: i64,
        new_balance: Decimal,
    ) -> impl Future<Output = Result<Account, StoreError>> + Send;

    /// All account numbers, ascending
    fn list_account_numbers(&self) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;
}

/// Append-only storage of ledger entries
pub trait LedgerStore: Send + Sync {
    fn append(
        &self,
        entry: Transaction,
    ) -> impl Future<Output = Result<Transaction, StoreError>> + Send;

    /// Entries of one account, ascending by timestamp (ties in append order)
    fn list_by_account(
        &self,
        account_number: &str,
    ) -> impl Future<Output = Result<Vec<Transaction>, StoreError>> + Send;

    /// Entries committed under an idempotency key, in append order
    fn find_by_idempotency_key(
        &self,
        key: Uuid,
    ) -> impl Future<Output = Result<Option<Vec<Transaction>>, StoreError>> + Send;
}

/// Both stores plus the multi-key atomic write the engine commits through
pub trait LedgerRepository: AccountStore + LedgerStore {
    /// Apply every write and append every entry, or nothing at all.
    ///
    /// Returns the appended entries in the order given.
    fn commit(
        &self,
        batch: CommitBatch,
    ) -> impl Future<Output = Result<Vec<Transaction>, StoreError>> + Send;

    /// The account and its entries as of one point in time.
    ///
    /// No commit may land between reading the balance and reading the entries.
    fn snapshot(
        &self,
        account_number: &str,
    ) -> impl Future<Output = Result<Option<AccountSnapshot>, StoreError>> + Send;
}

/// An account together with its entries, read consistently
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub account: Account,
    /// Ascending by timestamp, ties in append order
    pub entries: Vec<Transaction>,
}

/// Version-checked balance write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountWrite {
    pub account_number: String,
    pub expected_version: i64,
    pub new_balance: Decimal,
}

impl From<&Posting> for AccountWrite {
    fn from(posting: &Posting) -> Self {
        Self {
            account_number: posting.account_number().to_string(),
            expected_version: posting.expected_version,
            new_balance: posting.new_balance(),
        }
    }
}

/// One atomic unit of ledger mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitBatch {
    /// Sorted ascending by account number
    pub writes: Vec<AccountWrite>,
    /// In leg order
    pub entries: Vec<Transaction>,
    pub idempotency_key: Option<Uuid>,
}

impl CommitBatch {
    /// Build a batch from postings. Writes are put in ascending account
    /// number order regardless of leg order, so every store acquires rows in
    /// one global order.
    pub fn from_postings(postings: &[Posting], idempotency_key: Option<Uuid>) -> Self {
        let mut writes: Vec<AccountWrite> = postings.iter().map(AccountWrite::from).collect();
        writes.sort_by(|a, b| a.account_number.cmp(&b.account_number));

        Self {
            writes,
            entries: postings.iter().map(|p| p.entry.clone()).collect(),
            idempotency_key,
        }
    }
}
