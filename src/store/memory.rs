//! In-memory store
//!
//! Process-local implementation of the store traits. One lock guards all
//! state, so `commit` is trivially atomic. Used by tests, the load test and
//! `STORE_BACKEND=memory`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{Account, NewAccount, Transaction};

use super::{
    AccountSnapshot, AccountStore, CommitBatch, LedgerRepository, LedgerStore, StoreError,
};

#[derive(Debug, Default)]
struct State {
    accounts: BTreeMap<String, Account>,
    /// Entries per account in append order
    entries: HashMap<String, Vec<Transaction>>,
    entry_ids: HashSet<Uuid>,
    idempotency: HashMap<Uuid, Vec<Transaction>>,
}

impl State {
    fn sorted_entries(&self, account_number: &str) -> Vec<Transaction> {
        let mut entries = self.entries.get(account_number).cloned().unwrap_or_default();
        // stable: equal timestamps keep append order
        entries.sort_by_key(|e| e.timestamp);
        entries
    }

    fn check_write(
        &self,
        account_number: &str,
        expected_version: i64,
    ) -> Result<&Account, StoreError> {
        let account = self
            .accounts
            .get(account_number)
            .ok_or_else(|| StoreError::NotFound(account_number.to_string()))?;

        if account.version != expected_version {
            return Err(StoreError::VersionMismatch {
                account_number: account_number.to_string(),
                expected: expected_version,
                actual: account.version,
            });
        }
        Ok(account)
    }

    fn write_balance(
        &mut self,
        account_number: &str,
        new_balance: Decimal,
    ) -> Result<Account, StoreError> {
        let account = self
            .accounts
            .get_mut(account_number)
            .ok_or_else(|| StoreError::NotFound(account_number.to_string()))?;
        account.balance = new_balance;
        account.version += 1;
        Ok(account.clone())
    }

    fn check_entry(&self, entry: &Transaction) -> Result<(), StoreError> {
        if self.entry_ids.contains(&entry.id) {
            return Err(StoreError::DuplicateKey(entry.id.to_string()));
        }
        if !self.accounts.contains_key(&entry.account_number) {
            return Err(StoreError::NotFound(entry.account_number.clone()));
        }
        Ok(())
    }

    fn push_entry(&mut self, entry: Transaction) {
        self.entry_ids.insert(entry.id);
        self.entries
            .entry(entry.account_number.clone())
            .or_default()
            .push(entry);
    }
}

/// Shared, cloneable in-memory store
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ledger entries across all accounts
    pub async fn entry_count(&self) -> usize {
        self.state.read().await.entry_ids.len()
    }
}

impl AccountStore for InMemoryStore {
    async fn get(&self, account_number: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.state.read().await.accounts.get(account_number).cloned())
    }

    async fn exists(&self, account_number: &str) -> Result<bool, StoreError> {
        Ok(self.state.read().await.accounts.contains_key(account_number))
    }

    async fn create(
        &self,
        account: NewAccount,
        opening: Option<Transaction>,
    ) -> Result<Account, StoreError> {
        let mut state = self.state.write().await;

        if state.accounts.contains_key(&account.account_number) {
            return Err(StoreError::DuplicateKey(account.account_number));
        }
        if let Some(entry) = &opening {
            if state.entry_ids.contains(&entry.id) {
                return Err(StoreError::DuplicateKey(entry.id.to_string()));
            }
        }

        let created = Account {
            id: Uuid::new_v4(),
            account_number: account.account_number,
            owner_name: account.owner_name,
            balance: account.balance,
            account_type: account.account_type,
            created_at: account.created_at,
            version: 0,
        };
        state
            .accounts
            .insert(created.account_number.clone(), created.clone());
        if let Some(entry) = opening {
            state.push_entry(entry);
        }

        Ok(created)
    }

    async fn compare_and_swap(
        &self,
        account_number: &str,
        expected_version: i64,
        new_balance: Decimal,
    ) -> Result<Account, StoreError> {
        let mut state = self.state.write().await;
        state.check_write(account_number, expected_version)?;
        state.write_balance(account_number, new_balance)
    }

    async fn list_account_numbers(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.state.read().await.accounts.keys().cloned().collect())
    }
}

impl LedgerStore for InMemoryStore {
    async fn append(&self, entry: Transaction) -> Result<Transaction, StoreError> {
        let mut state = self.state.write().await;
        state.check_entry(&entry)?;
        state.push_entry(entry.clone());
        Ok(entry)
    }

    async fn list_by_account(&self, account_number: &str) -> Result<Vec<Transaction>, StoreError> {
        Ok(self.state.read().await.sorted_entries(account_number))
    }

    async fn find_by_idempotency_key(
        &self,
        key: Uuid,
    ) -> Result<Option<Vec<Transaction>>, StoreError> {
        Ok(self.state.read().await.idempotency.get(&key).cloned())
    }
}

impl LedgerRepository for InMemoryStore {
    async fn commit(&self, batch: CommitBatch) -> Result<Vec<Transaction>, StoreError> {
        let mut state = self.state.write().await;

        // Validate everything before touching anything
        if let Some(key) = batch.idempotency_key {
            if state.idempotency.contains_key(&key) {
                return Err(StoreError::DuplicateIdempotencyKey(key));
            }
        }
        for write in &batch.writes {
            state.check_write(&write.account_number, write.expected_version)?;
        }
        for entry in &batch.entries {
            state.check_entry(entry)?;
        }

        for write in &batch.writes {
            state.write_balance(&write.account_number, write.new_balance)?;
        }
        for entry in &batch.entries {
            state.push_entry(entry.clone());
        }
        if let Some(key) = batch.idempotency_key {
            state.idempotency.insert(key, batch.entries.clone());
        }

        Ok(batch.entries)
    }

    async fn snapshot(&self, account_number: &str) -> Result<Option<AccountSnapshot>, StoreError> {
        let state = self.state.read().await;
        Ok(state.accounts.get(account_number).map(|account| AccountSnapshot {
            account: account.clone(),
            entries: state.sorted_entries(account_number),
        }))
    }
}
