//! Event notification
//!
//! The engine hands every committed ledger entry to an `EventNotifier`.
//! Notification is fire-and-forget: `notify` never blocks and never fails
//! from the engine's point of view. Delivery problems are logged by the
//! notifier and never roll back a commit.

mod channel;

use std::sync::Arc;

use crate::domain::TransactionEvent;

pub use channel::{ChannelNotifier, DeliveryStats, EventSink, LogSink, NotifierConfig, SinkError};

/// One-way boundary for completed-movement events
pub trait EventNotifier: Send + Sync {
    fn notify(&self, event: TransactionEvent);
}

impl<T: EventNotifier + ?Sized> EventNotifier for Arc<T> {
    fn notify(&self, event: TransactionEvent) {
        (**self).notify(event)
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl EventNotifier for NoopNotifier {
    fn notify(&self, event: TransactionEvent) {
        tracing::trace!(transaction_id = %event.transaction_id, "Notification discarded");
    }
}
