//! Channel-backed notifier
//!
//! `notify` pushes onto a bounded tokio channel with `try_send`; a background
//! task drains it into an `EventSink`, bounding every publish with a timeout.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::domain::TransactionEvent;

use super::EventNotifier;

/// Destination of delivered events (message broker, log, test recorder)
pub trait EventSink: Send + Sync + 'static {
    fn publish(
        &self,
        event: &TransactionEvent,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// Errors a sink may report; they are logged, never propagated to the engine
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Sink rejected event: {0}")]
    Rejected(String),

    #[error("Sink unavailable: {0}")]
    Unavailable(String),
}

/// Configuration for the delivery queue
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Events buffered before new ones are dropped
    pub capacity: usize,
    /// Upper bound for a single publish attempt
    pub publish_timeout: Duration,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            publish_timeout: Duration::from_secs(2),
        }
    }
}

/// Outcome of the delivery task, returned when all notifiers are dropped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub delivered: u64,
    pub failed: u64,
}

/// Notifier that queues events for a background delivery task
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::Sender<TransactionEvent>,
}

impl ChannelNotifier {
    /// Start the delivery task on the current runtime.
    ///
    /// The task ends once every clone of the returned notifier is dropped and
    /// the queue is drained.
    pub fn spawn<K: EventSink>(sink: K, config: NotifierConfig) -> (Self, JoinHandle<DeliveryStats>) {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        let handle = tokio::spawn(deliver(sink, rx, config.publish_timeout));
        (Self { tx }, handle)
    }
}

impl EventNotifier for ChannelNotifier {
    fn notify(&self, event: TransactionEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::warn!(
                    transaction_id = %event.transaction_id,
                    account_number = %event.account_number,
                    "Notification queue full, event dropped"
                );
            }
            Err(TrySendError::Closed(event)) => {
                tracing::warn!(
                    transaction_id = %event.transaction_id,
                    account_number = %event.account_number,
                    "Notification queue closed, event dropped"
                );
            }
        }
    }
}

async fn deliver<K: EventSink>(
    sink: K,
    mut rx: mpsc::Receiver<TransactionEvent>,
    publish_timeout: Duration,
) -> DeliveryStats {
    let mut stats = DeliveryStats::default();

    while let Some(event) = rx.recv().await {
        match tokio::time::timeout(publish_timeout, sink.publish(&event)).await {
            Ok(Ok(())) => {
                stats.delivered += 1;
                tracing::debug!(transaction_id = %event.transaction_id, "Transaction event delivered");
            }
            Ok(Err(e)) => {
                stats.failed += 1;
                tracing::error!(
                    transaction_id = %event.transaction_id,
                    error = %e,
                    "Failed to deliver transaction event"
                );
            }
            Err(_) => {
                stats.failed += 1;
                tracing::error!(
                    transaction_id = %event.transaction_id,
                    timeout_ms = publish_timeout.as_millis() as u64,
                    "Timed out delivering transaction event"
                );
            }
        }
    }

    tracing::info!(
        delivered = stats.delivered,
        failed = stats.failed,
        "Notification delivery stopped"
    );
    stats
}

/// Sink that writes each event as a structured log record
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    async fn publish(&self, event: &TransactionEvent) -> Result<(), SinkError> {
        let payload =
            serde_json::to_string(event).map_err(|e| SinkError::Rejected(e.to_string()))?;

        tracing::info!(
            target: "account_ledger::events",
            key = %event.key(),
            transaction_id = %event.transaction_id,
            payload = %payload,
            "Transaction event published"
        );
        Ok(())
    }
}
