//! Common test utilities
#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rust_decimal::Decimal;
use uuid::Uuid;

use account_ledger::domain::{Account, AccountType, NewAccount, Transaction, TransactionEvent};
use account_ledger::engine::{
    CreateAccountCommand, EngineConfig, LedgerEngine, RetryPolicy,
};
use account_ledger::notify::EventNotifier;
use account_ledger::store::{
    AccountSnapshot, AccountStore, CommitBatch, InMemoryStore, LedgerRepository, LedgerStore,
    PgStore, StoreError,
};
use account_ledger::{db, OperationContext};

/// Generous retry budget with tiny delays, for tests that race on purpose
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 100,
        base_delay: Duration::from_millis(1),
    }
}

pub fn test_config() -> EngineConfig {
    EngineConfig {
        retry: fast_retry(),
        ..EngineConfig::default()
    }
}

// =========================================================================
// RecordingNotifier
// =========================================================================

/// Keeps every notified event in memory
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<TransactionEvent>>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<TransactionEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

impl EventNotifier for RecordingNotifier {
    fn notify(&self, event: TransactionEvent) {
        self.events.lock().unwrap().push(event);
    }
}

// =========================================================================
// FlakyStore
// =========================================================================

/// In-memory store that can be told to fail upcoming calls
#[derive(Clone, Default)]
pub struct FlakyStore {
    pub inner: InMemoryStore,
    commit_failures: Arc<AtomicU32>,
    commit_conflicts: Arc<AtomicU32>,
    create_collisions: Arc<AtomicU32>,
    taken_lookups: Arc<AtomicU32>,
    exists_calls: Arc<AtomicU32>,
}

fn take(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl FlakyStore {
    /// Next `n` commits fail as if the database went away
    pub fn fail_commits(&self, n: u32) {
        self.commit_failures.store(n, Ordering::SeqCst);
    }

    /// Next `n` commits lose their version check
    pub fn conflict_commits(&self, n: u32) {
        self.commit_conflicts.store(n, Ordering::SeqCst);
    }

    /// Next `n` account inserts hit a taken account number
    pub fn collide_creates(&self, n: u32) {
        self.create_collisions.store(n, Ordering::SeqCst);
    }

    /// Next `n` account number lookups report the number as taken
    pub fn taken_numbers(&self, n: u32) {
        self.taken_lookups.store(n, Ordering::SeqCst);
    }

    pub fn exists_calls(&self) -> u32 {
        self.exists_calls.load(Ordering::SeqCst)
    }
}

impl AccountStore for FlakyStore {
    async fn get(&self, account_number: &str) -> Result<Option<Account>, StoreError> {
        self.inner.get(account_number).await
    }

    async fn exists(&self, account_number: &str) -> Result<bool, StoreError> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        if take(&self.taken_lookups) {
            return Ok(true);
        }
        self.inner.exists(account_number).await
    }

    async fn create(
        &self,
        account: NewAccount,
        opening: Option<Transaction>,
    ) -> Result<Account, StoreError> {
        if take(&self.create_collisions) {
            return Err(StoreError::DuplicateKey(account.account_number));
        }
        self.inner.create(account, opening).await
    }

    async fn compare_and_swap(
        &self,
        account_number: &str,
        expected_version: i64,
        new_balance: Decimal,
    ) -> Result<Account, StoreError> {
        self.inner
            .compare_and_swap(account_number, expected_version, new_balance)
            .await
    }

    async fn list_account_numbers(&self) -> Result<Vec<String>, StoreError> {
        self.inner.list_account_numbers().await
    }
}

impl LedgerStore for FlakyStore {
    async fn append(&self, entry: Transaction) -> Result<Transaction, StoreError> {
        self.inner.append(entry).await
    }

    async fn list_by_account(&self, account_number: &str) -> Result<Vec<Transaction>, StoreError> {
        self.inner.list_by_account(account_number).await
    }

    async fn find_by_idempotency_key(
        &self,
        key: Uuid,
    ) -> Result<Option<Vec<Transaction>>, StoreError> {
        self.inner.find_by_idempotency_key(key).await
    }
}

impl LedgerRepository for FlakyStore {
    async fn commit(&self, batch: CommitBatch) -> Result<Vec<Transaction>, StoreError> {
        if take(&self.commit_failures) {
            return Err(StoreError::Unavailable("injected commit failure".into()));
        }
        if take(&self.commit_conflicts) {
            let write = &batch.writes[0];
            return Err(StoreError::VersionMismatch {
                account_number: write.account_number.clone(),
                expected: write.expected_version,
                actual: write.expected_version + 1,
            });
        }
        self.inner.commit(batch).await
    }

    async fn snapshot(&self, account_number: &str) -> Result<Option<AccountSnapshot>, StoreError> {
        self.inner.snapshot(account_number).await
    }
}

// =========================================================================
// Database
// =========================================================================

/// Connect to `DATABASE_URL` and apply the migrations.
///
/// Tables are not truncated: tests open their own accounts and only assert on those.
pub async fn setup_test_db() -> PgStore {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = db::connect(&database_url, 5)
        .await
        .expect("Failed to connect to DB");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    PgStore::new(pool)
}

// =========================================================================
// Builders
// =========================================================================

pub type TestEngine = LedgerEngine<InMemoryStore, RecordingNotifier>;
pub type FlakyEngine = LedgerEngine<FlakyStore, RecordingNotifier>;

pub fn engine() -> (TestEngine, RecordingNotifier) {
    let notifier = RecordingNotifier::default();
    let engine = LedgerEngine::new(InMemoryStore::new(), notifier.clone(), test_config());
    (engine, notifier)
}

pub fn flaky_engine(config: EngineConfig) -> (FlakyEngine, FlakyStore, RecordingNotifier) {
    let store = FlakyStore::default();
    let notifier = RecordingNotifier::default();
    let engine = LedgerEngine::new(store.clone(), notifier.clone(), config);
    (engine, store, notifier)
}

/// Open an account with `balance` as its initial deposit
pub async fn open<S, N>(
    engine: &LedgerEngine<S, N>,
    owner: &str,
    account_type: AccountType,
    balance: Decimal,
) -> Account
where
    S: LedgerRepository,
    N: EventNotifier,
{
    engine
        .create_account(
            CreateAccountCommand::new(owner, account_type).with_initial_deposit(balance),
            &OperationContext::new(),
        )
        .await
        .expect("account creation failed")
}
