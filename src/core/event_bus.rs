//! In-process bounded event bus for failed-transaction notifications
//!
//! A single bounded tokio `mpsc` queue with competing consumers: every
//! subscriber pulls from the same receiver, so each event is delivered to
//! exactly one puller.
//!
//! # Closing
//!
//! [`EventBus::close`] drops the bus's sender. Publishing afterwards fails
//! with [`StatementError::BusClosed`], while events already queued stay
//! available until drained; the subscription then ends.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::traits::EventPublisher;
use crate::types::{FailedTxEvent, StatementError};

/// Bounded single-queue event bus
#[derive(Debug)]
pub struct EventBus {
    capacity: usize,
    sender: Mutex<Option<mpsc::Sender<FailedTxEvent>>>,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<FailedTxEvent>>>,
}

impl EventBus {
    /// Create a bus holding up to `capacity` undelivered events
    ///
    /// A capacity below 1 is coerced to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);

        Self {
            capacity,
            sender: Mutex::new(Some(sender)),
            receiver: Arc::new(tokio::sync::Mutex::new(receiver)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Enqueue an event, waiting while the bus is full
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The event is queued
    /// * `Err(StatementError::BusClosed)` - The bus was closed
    /// * `Err(StatementError::Canceled)` - `token` fired before the event fit
    pub async fn publish(
        &self,
        token: &CancellationToken,
        event: FailedTxEvent,
    ) -> Result<(), StatementError> {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(StatementError::BusClosed)?;

        tokio::select! {
            sent = sender.send(event) => sent.map_err(|_| StatementError::BusClosed),
            _ = token.cancelled() => Err(StatementError::Canceled),
        }
    }

    /// Consumable view of the queue
    ///
    /// Subscriptions compete for events rather than each seeing all of them.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: Arc::clone(&self.receiver),
        }
    }

    /// Stop accepting events; idempotent
    pub fn close(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

#[async_trait]
impl EventPublisher for EventBus {
    async fn publish(
        &self,
        token: &CancellationToken,
        event: FailedTxEvent,
    ) -> Result<(), StatementError> {
        EventBus::publish(self, token, event).await
    }
}

/// Handle for pulling events off an [`EventBus`]
#[derive(Debug, Clone)]
pub struct Subscription {
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<FailedTxEvent>>>,
}

impl Subscription {
    /// Next queued event, or `None` once the bus is closed and drained
    pub async fn next(&self) -> Option<FailedTxEvent> {
        self.receiver.lock().await.recv().await
    }
}
