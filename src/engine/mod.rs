//! Ledger engine
//!
//! Validates and applies account operations. Every mutation follows the same
//! path: load the touched accounts, compute each leg with `Account::post`,
//! hand all legs to the store as one `CommitBatch`, then notify once per
//! committed entry. A lost version check re-runs the whole operation under
//! the configured `RetryPolicy`.

pub mod account_number;
mod commands;
mod reconcile;
pub mod retry;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::{
    opening_balance, Account, Amount, LedgerError, NewAccount, OperationContext, Posting,
    Transaction, TransactionEvent, TransactionType,
};
use crate::idempotency::{verify_replay, ExpectedLeg};
use crate::notify::EventNotifier;
use crate::store::{CommitBatch, LedgerRepository, StoreError};

pub use account_number::{AccountNumberConfig, AccountNumberGenerator};
pub use commands::{CreateAccountCommand, MovementCommand, TransferCommand, TransferResult};
pub use reconcile::{replay, ReconciliationReport};
pub use retry::RetryPolicy;

const OWNER_NAME_MIN_CHARS: usize = 2;
const OWNER_NAME_MAX_CHARS: usize = 50;
const DESCRIPTION_MAX_CHARS: usize = 100;
const OPENING_DESCRIPTION: &str = "Initial deposit";

/// Engine settings
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub retry: RetryPolicy,
    pub account_numbers: AccountNumberConfig,
}

/// Entries produced by a commit, or found under an already used idempotency key
enum Outcome {
    Committed(Vec<Transaction>),
    Replayed(Vec<Transaction>),
}

/// The ledger core, over an explicit store and notifier
pub struct LedgerEngine<S, N> {
    store: S,
    notifier: N,
    retry: RetryPolicy,
    numbers: AccountNumberGenerator,
}

impl<S: LedgerRepository, N: EventNotifier> LedgerEngine<S, N> {
    pub fn new(store: S, notifier: N, config: EngineConfig) -> Self {
        Self {
            store,
            notifier,
            retry: config.retry,
            numbers: AccountNumberGenerator::new(config.account_numbers),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // =====================================================================
    // Accounts
    // =====================================================================

    /// Open an account, writing its opening DEPOSIT entry in the same store call
    #[tracing::instrument(
        skip(self, command, context),
        fields(account_type = %command.account_type, correlation_id = ?context.correlation_id)
    )]
    pub async fn create_account(
        &self,
        command: CreateAccountCommand,
        context: &OperationContext,
    ) -> Result<Account, LedgerError> {
        let owner_name = validate_owner_name(&command.owner_name)?;
        let initial = opening_balance(command.initial_deposit)?;
        let opening_amount = if initial.is_zero() {
            None
        } else {
            Some(Amount::new(initial)?)
        };

        // shared by lookup misses and insert collisions
        let mut attempts = 0;
        loop {
            let account_number = self.numbers.next_unique(&self.store, &mut attempts).await?;
            let opening = opening_amount.map(|amount| {
                Transaction::record(
                    &account_number,
                    amount,
                    TransactionType::Deposit,
                    OPENING_DESCRIPTION,
                    initial,
                )
            });
            let new_account = NewAccount {
                account_number: account_number.clone(),
                owner_name: owner_name.clone(),
                account_type: command.account_type,
                balance: initial,
                created_at: Utc::now(),
            };

            match self.store.create(new_account, opening.clone()).await {
                Ok(account) => {
                    tracing::info!(
                        account_number = %account.account_number,
                        balance = %account.balance,
                        "Account created"
                    );
                    if let Some(entry) = &opening {
                        self.notify(entry);
                    }
                    return Ok(account);
                }
                Err(StoreError::DuplicateKey(_)) => {
                    // lost the number to a concurrent creation
                    tracing::warn!(%account_number, attempts, "Account number collided on insert");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub async fn get_account(&self, account_number: &str) -> Result<Account, LedgerError> {
        self.load(account_number).await
    }

    /// Entries of an existing account, oldest first
    pub async fn list_transactions(
        &self,
        account_number: &str,
    ) -> Result<Vec<Transaction>, LedgerError> {
        if !self.store.exists(account_number).await? {
            return Err(LedgerError::AccountNotFound(account_number.to_string()));
        }
        Ok(self.store.list_by_account(account_number).await?)
    }

    // =====================================================================
    // Movements
    // =====================================================================

    #[tracing::instrument(
        skip(self, command, context),
        fields(amount = %command.amount, correlation_id = ?context.correlation_id)
    )]
    pub async fn deposit(
        &self,
        account_number: &str,
        command: MovementCommand,
        context: &OperationContext,
    ) -> Result<Transaction, LedgerError> {
        self.movement(account_number, TransactionType::Deposit, command, context)
            .await
    }

    #[tracing::instrument(
        skip(self, command, context),
        fields(amount = %command.amount, correlation_id = ?context.correlation_id)
    )]
    pub async fn withdraw(
        &self,
        account_number: &str,
        command: MovementCommand,
        context: &OperationContext,
    ) -> Result<Transaction, LedgerError> {
        self.movement(account_number, TransactionType::Withdrawal, command, context)
            .await
    }

    /// Move money between two accounts; both legs commit together or not at all
    #[tracing::instrument(
        skip(self, command, context),
        fields(
            from = %command.from_account_number,
            to = %command.to_account_number,
            amount = %command.amount,
            correlation_id = ?context.correlation_id
        )
    )]
    pub async fn transfer(
        &self,
        command: TransferCommand,
        context: &OperationContext,
    ) -> Result<TransferResult, LedgerError> {
        let amount = Amount::new(command.amount)?;
        let description = normalize_description(command.description.as_deref())?;
        let from = command.from_account_number.as_str();
        let to = command.to_account_number.as_str();

        if from == to {
            return Err(LedgerError::invalid("Cannot transfer to the same account"));
        }

        let out_description = description
            .clone()
            .unwrap_or_else(|| format!("Transfer to {to}"));
        let in_description = description.unwrap_or_else(|| format!("Transfer from {from}"));
        let expected = [
            ExpectedLeg::new(from, TransactionType::TransferOut, amount.value()),
            ExpectedLeg::new(to, TransactionType::TransferIn, amount.value()),
        ];

        let outcome = match self.find_replay(context, &expected).await? {
            Some(entries) => Outcome::Replayed(entries),
            None => {
                let (out_description, in_description) =
                    (out_description.as_str(), in_description.as_str());
                let expected = &expected[..];
                let key = context.idempotency_key;
                self.retry
                    .run("transfer", move || {
                        self.try_transfer(
                            from,
                            to,
                            amount,
                            out_description,
                            in_description,
                            key,
                            expected,
                        )
                    })
                    .await?
            }
        };

        let mut legs = self.finish(outcome).into_iter();
        let (out_transaction, in_transaction) = match (legs.next(), legs.next()) {
            (Some(out), Some(inn)) => (out, inn),
            _ => {
                return Err(LedgerError::StorageFailure(
                    "transfer commit returned fewer than two entries".into(),
                ))
            }
        };

        tracing::info!(
            from,
            to,
            amount = %amount,
            from_balance = %out_transaction.balance_after,
            to_balance = %in_transaction.balance_after,
            "Transfer completed"
        );

        Ok(TransferResult {
            out_transaction,
            in_transaction,
            amount: amount.value(),
        })
    }

    // =====================================================================
    // Reconciliation
    // =====================================================================

    /// Replay an account's ledger and compare it with the stored balance.
    ///
    /// Balance and entries come from one store snapshot, so movements
    /// committed concurrently never show up as drift.
    pub async fn reconcile(&self, account_number: &str) -> Result<ReconciliationReport, LedgerError> {
        let snapshot = self
            .store
            .snapshot(account_number)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(account_number.to_string()))?;
        let report = replay(&snapshot.account, &snapshot.entries);

        if !report.is_consistent() {
            tracing::warn!(
                account_number,
                expected = %report.expected_balance,
                stored = %report.stored_balance,
                first_break = ?report.first_break,
                "Ledger does not reconcile"
            );
        }
        Ok(report)
    }

    // =====================================================================
    // Internals
    // =====================================================================

    async fn load(&self, account_number: &str) -> Result<Account, LedgerError> {
        self.store
            .get(account_number)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(account_number.to_string()))
    }

    async fn movement(
        &self,
        account_number: &str,
        transaction_type: TransactionType,
        command: MovementCommand,
        context: &OperationContext,
    ) -> Result<Transaction, LedgerError> {
        let amount = Amount::new(command.amount)?;
        let default_description = match transaction_type {
            TransactionType::Deposit => "Deposit",
            _ => "Withdrawal",
        };
        let description = normalize_description(command.description.as_deref())?
            .unwrap_or_else(|| default_description.to_string());
        let expected = [ExpectedLeg::new(
            account_number,
            transaction_type,
            amount.value(),
        )];

        let outcome = match self.find_replay(context, &expected).await? {
            Some(entries) => Outcome::Replayed(entries),
            None => {
                let description = description.as_str();
                let expected = &expected[..];
                let key = context.idempotency_key;
                self.retry
                    .run(transaction_type.as_str(), move || {
                        self.try_movement(
                            account_number,
                            transaction_type,
                            amount,
                            description,
                            key,
                            expected,
                        )
                    })
                    .await?
            }
        };

        let entry = self
            .finish(outcome)
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::StorageFailure("commit returned no entry".into()))?;

        tracing::info!(
            account_number,
            transaction_id = %entry.id,
            transaction_type = %entry.transaction_type,
            balance_after = %entry.balance_after,
            "Movement committed"
        );
        Ok(entry)
    }

    /// One attempt: reload, recompute, commit
    async fn try_movement(
        &self,
        account_number: &str,
        transaction_type: TransactionType,
        amount: Amount,
        description: &str,
        idempotency_key: Option<Uuid>,
        expected: &[ExpectedLeg],
    ) -> Result<Outcome, LedgerError> {
        let account = self.load(account_number).await?;
        let posting = account.post(amount, transaction_type, description)?;
        self.commit(&[posting], idempotency_key, expected).await
    }

    /// One attempt of a transfer; both legs share a single commit
    #[allow(clippy::too_many_arguments)]
    async fn try_transfer(
        &self,
        from: &str,
        to: &str,
        amount: Amount,
        out_description: &str,
        in_description: &str,
        idempotency_key: Option<Uuid>,
        expected: &[ExpectedLeg],
    ) -> Result<Outcome, LedgerError> {
        // read in ascending account number order, report the source first
        let (low, high) = if from < to { (from, to) } else { (to, from) };
        let low_account = self.store.get(low).await?;
        let high_account = self.store.get(high).await?;
        let (source, destination) = if from < to {
            (low_account, high_account)
        } else {
            (high_account, low_account)
        };

        let source = source.ok_or_else(|| LedgerError::AccountNotFound(from.to_string()))?;
        let destination =
            destination.ok_or_else(|| LedgerError::AccountNotFound(to.to_string()))?;

        let out_leg = source.post(amount, TransactionType::TransferOut, out_description)?;
        let in_leg = destination.post(amount, TransactionType::TransferIn, in_description)?;

        self.commit(&[out_leg, in_leg], idempotency_key, expected)
            .await
    }

    async fn commit(
        &self,
        postings: &[Posting],
        idempotency_key: Option<Uuid>,
        expected: &[ExpectedLeg],
    ) -> Result<Outcome, LedgerError> {
        let batch = CommitBatch::from_postings(postings, idempotency_key);

        match self.store.commit(batch).await {
            Ok(entries) => Ok(Outcome::Committed(entries)),
            Err(StoreError::DuplicateIdempotencyKey(key)) => {
                // a concurrent request with the same key won the commit
                let entries = self
                    .store
                    .find_by_idempotency_key(key)
                    .await?
                    .ok_or_else(|| {
                        LedgerError::StorageFailure(format!(
                            "idempotency key {key} recorded without entries"
                        ))
                    })?;
                verify_replay(key, entries, expected).map(Outcome::Replayed)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_replay(
        &self,
        context: &OperationContext,
        expected: &[ExpectedLeg],
    ) -> Result<Option<Vec<Transaction>>, LedgerError> {
        let Some(key) = context.idempotency_key else {
            return Ok(None);
        };
        match self.store.find_by_idempotency_key(key).await? {
            Some(entries) => verify_replay(key, entries, expected).map(Some),
            None => Ok(None),
        }
    }

    /// Notify committed entries; replayed ones were notified when first committed
    fn finish(&self, outcome: Outcome) -> Vec<Transaction> {
        match outcome {
            Outcome::Committed(entries) => {
                for entry in &entries {
                    self.notify(entry);
                }
                entries
            }
            Outcome::Replayed(entries) => entries,
        }
    }

    fn notify(&self, entry: &Transaction) {
        self.notifier.notify(TransactionEvent::from(entry));
    }
}

fn validate_owner_name(owner_name: &str) -> Result<String, LedgerError> {
    let trimmed = owner_name.trim();
    let chars = trimmed.chars().count();
    if !(OWNER_NAME_MIN_CHARS..=OWNER_NAME_MAX_CHARS).contains(&chars) {
        return Err(LedgerError::invalid(format!(
            "Owner name must be between {OWNER_NAME_MIN_CHARS} and {OWNER_NAME_MAX_CHARS} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Trimmed description, `None` when blank
fn normalize_description(description: Option<&str>) -> Result<Option<String>, LedgerError> {
    let Some(description) = description.map(str::trim).filter(|d| !d.is_empty()) else {
        return Ok(None);
    };
    if description.chars().count() > DESCRIPTION_MAX_CHARS {
        return Err(LedgerError::invalid(format!(
            "Description must be at most {DESCRIPTION_MAX_CHARS} characters"
        )));
    }
    Ok(Some(description.to_string()))
}
