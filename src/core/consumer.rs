//! Reconciliation consumer with idempotent, retrying delivery
//!
//! This module provides the `ReconciliationConsumer`, a pool of workers that
//! drain an [`EventBus`] and hand each failed-transaction event to a
//! pluggable [`ReconciliationHandler`].
//!
//! # Delivery
//!
//! Per event:
//!
//! ```text
//! received ──(event_id seen before)──► dropped
//!     └──► attempt 1 ..= max_retries + 1 ──► success | exhausted (logged, dropped)
//! ```
//!
//! - De-duplication is in-memory only, keyed by `event_id`, and lasts for the
//!   lifetime of the consumer. Events with an empty id are never de-duplicated.
//! - Between attempts the worker sleeps `base_backoff * 2^attempt`. Only the
//!   retrying worker sleeps; the others keep draining.
//! - A fired shutdown token interrupts the sleep and abandons the event.
//!
//! Delivery is at-least-once with local de-duplication, not exactly-once.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashSet;
use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::event_bus::{EventBus, Subscription};
use crate::types::{FailedTxEvent, StatementError};

/// Worker count used when the configured count is zero
pub const DEFAULT_WORKERS: usize = 4;

/// Backoff used when the configured backoff is zero
pub const DEFAULT_BASE_BACKOFF: Duration = Duration::from_millis(100);

/// Upper bound on retries; the backoff multiplier saturates well before it
pub const MAX_RETRIES: u32 = 64;

/// Reconciles one failed transaction
///
/// Any error triggers the same retry path; errors are not classified.
#[async_trait]
pub trait ReconciliationHandler: Send + Sync {
    async fn handle(&self, event: &FailedTxEvent) -> Result<(), StatementError>;
}

/// Handler that records reconciliation in the log
///
/// Rejects events without an id.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingReconciler;

#[async_trait]
impl ReconciliationHandler for LoggingReconciler {
    async fn handle(&self, event: &FailedTxEvent) -> Result<(), StatementError> {
        if event.event_id.is_empty() {
            return Err(StatementError::reconciliation_failed("", "missing event id"));
        }

        info!(
            event_id = %event.event_id,
            upload_id = %event.upload_id,
            amount = event.transaction.amount,
            "reconciled failed transaction"
        );
        Ok(())
    }
}

/// Consumer tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerConfig {
    /// Number of competing workers (zero means [`DEFAULT_WORKERS`])
    pub workers: usize,

    /// Retries after the first attempt (capped at [`MAX_RETRIES`])
    pub max_retries: u32,

    /// Delay before the first retry (zero means [`DEFAULT_BASE_BACKOFF`])
    pub base_backoff: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            max_retries: 0,
            base_backoff: DEFAULT_BASE_BACKOFF,
        }
    }
}

impl ConsumerConfig {
    fn normalized(self) -> Self {
        Self {
            workers: if self.workers == 0 {
                DEFAULT_WORKERS
            } else {
                self.workers
            },
            max_retries: if self.max_retries > MAX_RETRIES {
                warn!(
                    max_retries = self.max_retries,
                    cap = MAX_RETRIES,
                    "max_retries above cap, using cap"
                );
                MAX_RETRIES
            } else {
                self.max_retries
            },
            base_backoff: if self.base_backoff.is_zero() {
                DEFAULT_BASE_BACKOFF
            } else {
                self.base_backoff
            },
        }
    }
}

/// Identities of events already taken for handling
#[derive(Debug, Default)]
struct SeenEvents {
    ids: DashSet<String>,
}

impl SeenEvents {
    /// Record `event_id`; false if it was already recorded
    fn mark(&self, event_id: &str) -> bool {
        self.ids.insert(event_id.to_string())
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}

/// State shared by all workers
struct Delivery {
    handler: Arc<dyn ReconciliationHandler>,
    seen: SeenEvents,
    max_retries: u32,
    base_backoff: Duration,
    shutdown: CancellationToken,
}

impl Delivery {
    async fn run_worker(self: Arc<Self>, worker: usize, subscription: Subscription) {
        debug!(worker, "reconciliation worker started");
        while let Some(event) = subscription.next().await {
            self.process(&event).await;
        }
        debug!(worker, "reconciliation worker stopped");
    }

    async fn process(&self, event: &FailedTxEvent) {
        if !event.event_id.is_empty() && !self.seen.mark(&event.event_id) {
            info!(
                event_id = %event.event_id,
                upload_id = %event.upload_id,
                "skip duplicate failed transaction event"
            );
            return;
        }

        for attempt in 0..=self.max_retries {
            let err = match self.handler.handle(event).await {
                Ok(()) => return,
                Err(e) => e,
            };

            if attempt == self.max_retries {
                error!(
                    event_id = %event.event_id,
                    upload_id = %event.upload_id,
                    attempts = attempt.saturating_add(1),
                    error = %err,
                    "failed to reconcile transaction after retries"
                );
                return;
            }

            let delay = backoff_delay(self.base_backoff, attempt);
            warn!(
                event_id = %event.event_id,
                attempt = attempt.saturating_add(1),
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "reconciliation attempt failed, retrying"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown.cancelled() => {
                    warn!(event_id = %event.event_id, "retry abandoned on shutdown");
                    return;
                }
            }
        }
    }
}

/// `base * 2^attempt`, saturating
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// Worker pool draining an [`EventBus`]
pub struct ReconciliationConsumer {
    bus: Arc<EventBus>,
    delivery: Arc<Delivery>,
    workers: usize,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl ReconciliationConsumer {
    /// Create a consumer; no worker runs until [`start`](Self::start)
    ///
    /// `shutdown` interrupts retry sleeps when it fires.
    pub fn new(
        bus: Arc<EventBus>,
        handler: Arc<dyn ReconciliationHandler>,
        config: ConsumerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let config = config.normalized();

        Self {
            bus,
            delivery: Arc::new(Delivery {
                handler,
                seen: SeenEvents::default(),
                max_retries: config.max_retries,
                base_backoff: config.base_backoff,
                shutdown,
            }),
            workers: config.workers,
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Number of distinct event ids taken for handling so far
    pub fn seen_count(&self) -> usize {
        self.delivery.seen.len()
    }

    /// Launch the workers on the current tokio runtime
    pub fn start(&self) {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        for worker in 0..self.workers {
            let delivery = Arc::clone(&self.delivery);
            let subscription = self.bus.subscribe();
            handles.push(tokio::spawn(delivery.run_worker(worker, subscription)));
        }
        info!(workers = self.workers, "reconciliation consumer started");
    }

    /// Close the bus and wait for the workers to drain it
    ///
    /// If the workers are still busy when `timeout` elapses, returns
    /// [`StatementError::Timeout`] and leaves them running in the background.
    pub async fn stop(&self, timeout: Duration) -> Result<(), StatementError> {
        self.bus.close();

        let handles =
            std::mem::take(&mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner));

        match tokio::time::timeout(timeout, join_all(handles)).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        error!(error = %e, "reconciliation worker ended abnormally");
                    }
                }
                info!("reconciliation consumer stopped");
                Ok(())
            }
            Err(_) => Err(StatementError::timeout(
                "reconciliation consumer to drain",
                timeout.as_millis() as u64,
            )),
        }
    }
}
