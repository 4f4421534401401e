//! PostgreSQL store
//!
//! sqlx implementation of the store traits. Balance writes are conditional
//! `UPDATE ... WHERE version = $expected`; a commit runs all of its writes and
//! inserts in one database transaction, with writes in ascending account
//! number order so concurrent commits lock rows in the same order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction as DbTransaction};
use uuid::Uuid;

use crate::domain::{Account, NewAccount, Transaction};

use super::{
    AccountSnapshot, AccountStore, AccountWrite, CommitBatch, LedgerRepository, LedgerStore,
    StoreError,
};

type AccountRow = (Uuid, String, String, Decimal, String, DateTime<Utc>, i64);
type EntryRow = (Uuid, String, Decimal, String, String, DateTime<Utc>, Decimal);

const ACCOUNT_COLUMNS: &str =
    "id, account_number, owner_name, balance, account_type, created_at, version";
const ENTRY_COLUMNS: &str =
    "id, account_number, amount, transaction_type, description, timestamp, balance_after";

fn account_from_row(row: AccountRow) -> Result<Account, StoreError> {
    let (id, account_number, owner_name, balance, account_type, created_at, version) = row;
    Ok(Account {
        id,
        account_number,
        owner_name,
        balance,
        account_type: account_type.parse().map_err(StoreError::InvalidData)?,
        created_at,
        version,
    })
}

fn entry_from_row(row: EntryRow) -> Result<Transaction, StoreError> {
    let (id, account_number, amount, transaction_type, description, timestamp, balance_after) = row;
    Ok(Transaction {
        id,
        account_number,
        amount,
        transaction_type: transaction_type.parse().map_err(StoreError::InvalidData)?,
        description,
        timestamp,
        balance_after,
    })
}

fn entries_by_account_sql() -> String {
    format!(
        r#"
        SELECT {ENTRY_COLUMNS}
        FROM transactions
        WHERE account_number = $1
        ORDER BY timestamp ASC, seq ASC
        "#
    )
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Store backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new PgStore with a database pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Version-checked balance update inside an open transaction
    async fn write_balance(
        tx: &mut DbTransaction<'_, Postgres>,
        write: &AccountWrite,
    ) -> Result<Account, StoreError> {
        let updated: Option<AccountRow> = sqlx::query_as(&format!(
            r#"
            UPDATE accounts
            SET balance = $3, version = version + 1
            WHERE account_number = $1 AND version = $2
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(&write.account_number)
        .bind(write.expected_version)
        .bind(write.new_balance)
        .fetch_optional(&mut **tx)
        .await?;

        if let Some(row) = updated {
            return account_from_row(row);
        }

        // Nothing updated: tell a missing account from a lost race
        let actual: Option<i64> =
            sqlx::query_scalar("SELECT version FROM accounts WHERE account_number = $1")
                .bind(&write.account_number)
                .fetch_optional(&mut **tx)
                .await?;

        match actual {
            Some(actual) => Err(StoreError::VersionMismatch {
                account_number: write.account_number.clone(),
                expected: write.expected_version,
                actual,
            }),
            None => Err(StoreError::NotFound(write.account_number.clone())),
        }
    }

    async fn insert_entry(
        tx: &mut DbTransaction<'_, Postgres>,
        entry: &Transaction,
        idempotency_key: Option<Uuid>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO transactions (
                id, account_number, amount, transaction_type,
                description, timestamp, balance_after, idempotency_key
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.account_number)
        .bind(entry.amount)
        .bind(entry.transaction_type.as_str())
        .bind(&entry.description)
        .bind(entry.timestamp)
        .bind(entry.balance_after)
        .bind(idempotency_key)
        .execute(&mut **tx)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StoreError::DuplicateKey(entry.id.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}

impl AccountStore for PgStore {
    async fn get(&self, account_number: &str) -> Result<Option<Account>, StoreError> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE account_number = $1"
        ))
        .bind(account_number)
        .fetch_optional(&self.pool)
        .await?;

        row.map(account_from_row).transpose()
    }

    async fn exists(&self, account_number: &str) -> Result<bool, StoreError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM accounts WHERE account_number = $1)")
                .bind(account_number)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn create(
        &self,
        account: NewAccount,
        opening: Option<Transaction>,
    ) -> Result<Account, StoreError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            INSERT INTO accounts (id, account_number, owner_name, balance, account_type, created_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, 0)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&account.account_number)
        .bind(&account.owner_name)
        .bind(account.balance)
        .bind(account.account_type.as_str())
        .bind(account.created_at)
        .fetch_one(&mut *tx)
        .await;

        let row = match inserted {
            Ok(row) => row,
            Err(e) if is_unique_violation(&e) => {
                return Err(StoreError::DuplicateKey(account.account_number))
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(entry) = &opening {
            Self::insert_entry(&mut tx, entry, None).await?;
        }

        tx.commit().await?;
        account_from_row(row)
    }

    async fn compare_and_swap(
        &self,
        account_number: &str,
        expected_version: i64,
        new_balance: Decimal,
    ) -> Result<Account, StoreError> {
        let mut tx = self.pool.begin().await?;
        let write = AccountWrite {
            account_number: account_number.to_string(),
            expected_version,
            new_balance,
        };
        let account = Self::write_balance(&mut tx, &write).await?;
        tx.commit().await?;
        Ok(account)
    }

    async fn list_account_numbers(&self) -> Result<Vec<String>, StoreError> {
        let numbers: Vec<String> =
            sqlx::query_scalar("SELECT account_number FROM accounts ORDER BY account_number ASC")
                .fetch_all(&self.pool)
                .await?;
        Ok(numbers)
    }
}

impl LedgerStore for PgStore {
    async fn append(&self, entry: Transaction) -> Result<Transaction, StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::insert_entry(&mut tx, &entry, None).await?;
        tx.commit().await?;
        Ok(entry)
    }

    async fn list_by_account(&self, account_number: &str) -> Result<Vec<Transaction>, StoreError> {
        let rows: Vec<EntryRow> = sqlx::query_as(&entries_by_account_sql())
            .bind(account_number)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(entry_from_row).collect()
    }

    async fn find_by_idempotency_key(
        &self,
        key: Uuid,
    ) -> Result<Option<Vec<Transaction>>, StoreError> {
        let rows: Vec<EntryRow> = sqlx::query_as(&format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM transactions
            WHERE idempotency_key = $1
            ORDER BY seq ASC
            "#
        ))
        .bind(key)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(None);
        }
        rows.into_iter()
            .map(entry_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}

impl LedgerRepository for PgStore {
    async fn commit(&self, batch: CommitBatch) -> Result<Vec<Transaction>, StoreError> {
        let mut tx = self.pool.begin().await?;

        if let Some(key) = batch.idempotency_key {
            let claimed = sqlx::query(
                "INSERT INTO idempotency_keys (key) VALUES ($1) ON CONFLICT (key) DO NOTHING",
            )
            .bind(key)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if claimed == 0 {
                return Err(StoreError::DuplicateIdempotencyKey(key));
            }
        }

        // writes arrive sorted by account number
        for write in &batch.writes {
            Self::write_balance(&mut tx, write).await?;
        }
        for entry in &batch.entries {
            Self::insert_entry(&mut tx, entry, batch.idempotency_key).await?;
        }

        tx.commit().await?;

        tracing::debug!(
            writes = batch.writes.len(),
            entries = batch.entries.len(),
            "Ledger batch committed"
        );

        Ok(batch.entries)
    }

    async fn snapshot(&self, account_number: &str) -> Result<Option<AccountSnapshot>, StoreError> {
        let mut tx = self.pool.begin().await?;
        // both reads see the same committed state
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE account_number = $1"
        ))
        .bind(account_number)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };

        let rows: Vec<EntryRow> = sqlx::query_as(&entries_by_account_sql())
            .bind(account_number)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(Some(AccountSnapshot {
            account: account_from_row(row)?,
            entries: rows
                .into_iter()
                .map(entry_from_row)
                .collect::<Result<Vec<_>, _>>()?,
        }))
    }
}
