//! Scheduled Jobs
//!
//! Background reconciliation: periodically replays every account's ledger and
//! reports accounts whose stored balance no longer matches their entries.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::domain::LedgerError;
use crate::engine::LedgerEngine;
use crate::notify::EventNotifier;
use crate::store::LedgerRepository;

/// Result of one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationSummary {
    pub checked: usize,
    /// Account numbers whose ledger does not reconcile
    pub inconsistent: Vec<String>,
    /// Accounts that could not be checked, with the reason
    pub errors: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

impl ReconciliationSummary {
    pub fn is_clean(&self) -> bool {
        self.inconsistent.is_empty() && self.errors.is_empty()
    }
}

/// Reconcile every account once.
///
/// A failure on one account is recorded and the pass continues; only failing
/// to list accounts aborts it.
pub async fn run_reconciliation<S, N>(
    engine: &LedgerEngine<S, N>,
) -> Result<ReconciliationSummary, LedgerError>
where
    S: LedgerRepository,
    N: EventNotifier,
{
    let account_numbers = engine.store().list_account_numbers().await?;
    let mut inconsistent = Vec::new();
    let mut errors = Vec::new();

    for account_number in &account_numbers {
        match engine.reconcile(account_number).await {
            Ok(report) if report.is_consistent() => {}
            Ok(report) => {
                tracing::error!(
                    account_number = %report.account_number,
                    expected = %report.expected_balance,
                    stored = %report.stored_balance,
                    drift = %report.drift(),
                    "Account failed reconciliation"
                );
                inconsistent.push(report.account_number);
            }
            Err(e) => {
                tracing::error!(%account_number, error = %e, "Reconciliation check failed");
                errors.push(format!("{account_number}: {e}"));
            }
        }
    }

    let summary = ReconciliationSummary {
        checked: account_numbers.len(),
        inconsistent,
        errors,
        completed_at: Utc::now(),
    };

    tracing::info!(
        checked = summary.checked,
        inconsistent = summary.inconsistent.len(),
        errors = summary.errors.len(),
        "Reconciliation pass finished"
    );
    Ok(summary)
}

/// Runs `run_reconciliation` on a fixed interval
pub struct ReconciliationJob<S, N> {
    engine: Arc<LedgerEngine<S, N>>,
    period: Duration,
}

impl<S, N> ReconciliationJob<S, N>
where
    S: LedgerRepository + 'static,
    N: EventNotifier + 'static,
{
    pub fn new(engine: Arc<LedgerEngine<S, N>>, period: Duration) -> Self {
        Self { engine, period }
    }

    /// Start the job in the background
    /// Returns a handle that can be used to abort it
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        tracing::info!(period_secs = self.period.as_secs(), "Reconciliation job started");

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately; skip it so startup is not a full scan
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let Err(e) = run_reconciliation(self.engine.as_ref()).await {
                tracing::error!(error = %e, "Reconciliation pass failed");
            }
        }
    }
}

/// Spawn a reconciliation job running every `period`
pub fn spawn_reconciliation_job<S, N>(
    engine: Arc<LedgerEngine<S, N>>,
    period: Duration,
) -> JoinHandle<()>
where
    S: LedgerRepository + 'static,
    N: EventNotifier + 'static,
{
    ReconciliationJob::new(engine, period).start()
}

// =========================================================================
// Tests
// =========================================================================
