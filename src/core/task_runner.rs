//! Bounded-concurrency executor for fire-and-forget background work
//!
//! This module provides the `TaskRunner` struct, which admits at most N tasks
//! at a time and runs each admitted task on the tokio runtime.
//!
//! # Design
//!
//! ```text
//! submit ──(semaphore permit | cancellation)──► supervisor task
//!                                                   └── spawned task body
//! ```
//!
//! - Admission waits for a semaphore permit, or gives up silently when the
//!   cancellation token fires first.
//! - The permit moves into a supervisor task, so it is released on every exit
//!   path.
//! - The task body runs in its own spawned task. A panic surfaces as a
//!   `JoinError` at the supervisor, is logged, and goes no further.
//! - Task errors are collected in an internally synchronized list that
//!   [`TaskRunner::wait`] reports as one aggregate.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use super::traits::{Runner, Task};
use crate::logging::panic_message;
use crate::types::{StatementError, TaskErrors};

/// Capacity used when the runner is built with a capacity of zero
pub const DEFAULT_CAPACITY: usize = 10;

/// Internally synchronized accumulator of task failures
#[derive(Debug, Default)]
struct ErrorLog {
    errors: Mutex<Vec<StatementError>>,
}

impl ErrorLog {
    fn push(&self, error: StatementError) {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(error);
    }

    fn snapshot(&self) -> Vec<StatementError> {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Bounded-concurrency task executor
///
/// Must be used from within a tokio runtime.
#[derive(Debug)]
pub struct TaskRunner {
    capacity: usize,
    permits: Arc<Semaphore>,
    supervisors: Mutex<JoinSet<()>>,
    errors: Arc<ErrorLog>,
}

impl TaskRunner {
    /// Create a runner admitting at most `capacity` concurrent tasks
    ///
    /// A capacity of zero falls back to [`DEFAULT_CAPACITY`].
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            warn!(
                capacity,
                default = DEFAULT_CAPACITY,
                "invalid runner capacity, using default"
            );
            DEFAULT_CAPACITY
        } else {
            capacity
        };

        Self {
            capacity,
            permits: Arc::new(Semaphore::new(capacity)),
            supervisors: Mutex::new(JoinSet::new()),
            errors: Arc::new(ErrorLog::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of free admission slots
    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }

    /// Admit and launch a task
    ///
    /// Suspends until a slot is free or `token` fires. If the token wins,
    /// the task is dropped with a "canceled before start" warning and no
    /// error is reported. Once admitted, the caller is not blocked any further.
    pub async fn submit<F, Fut>(&self, token: &CancellationToken, task: F)
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<(), StatementError>> + Send + 'static,
    {
        let permit = tokio::select! {
            permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                Ok(permit) => permit,
                // The semaphore is never closed
                Err(_) => return,
            },
            _ = token.cancelled() => {
                warn!(reason = "cancellation token fired", "task canceled before start");
                return;
            }
        };

        let token = token.clone();
        let errors = Arc::clone(&self.errors);

        let mut supervisors = self
            .supervisors
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Reap finished supervisors so a runner that is never waited on stays bounded
        while let Some(result) = supervisors.try_join_next() {
            if let Err(e) = result {
                log_join_error(e);
            }
        }

        supervisors.spawn(async move {
            let _permit = permit;

            // Cooperative cancellation: a task whose token fired while it
            // was being scheduled is skipped
            if token.is_cancelled() {
                warn!(reason = "cancellation token fired", "task canceled");
                return;
            }

            match tokio::spawn(task(token)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => errors.push(e),
                Err(e) => log_join_error(e),
            }
        });
    }

    /// Wait for every submitted task, then report collected failures
    ///
    /// Returns the same aggregate on repeated calls once all tasks are done.
    /// Tasks submitted concurrently with a running `wait` are not guaranteed
    /// to be waited on.
    pub async fn wait(&self) -> Result<(), TaskErrors> {
        let mut supervisors = std::mem::take(
            &mut *self
                .supervisors
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );

        while let Some(result) = supervisors.join_next().await {
            if let Err(e) = result {
                log_join_error(e);
            }
        }

        let errors = self.errors.snapshot();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(TaskErrors { errors })
        }
    }
}

fn log_join_error(error: JoinError) {
    if error.is_panic() {
        let payload = error.into_panic();
        // Location and stack are recorded by the panic hook at the panic site
        error!(panic = %panic_message(&*payload), "panic occurred in background task");
    } else {
        warn!(error = %error, "background task was aborted");
    }
}

#[async_trait]
impl Runner for TaskRunner {
    async fn submit(&self, token: &CancellationToken, task: Task) {
        TaskRunner::submit(self, token, task).await;
    }
}
