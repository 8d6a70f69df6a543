//! Collaborator traits for the statement processor
//!
//! This module defines the seams the processor is written against, so that
//! storage, publishing, task execution, identity and time can be swapped
//! (for instance with deterministic fakes in tests).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::core::record_store::StoreError;
use crate::types::{
    FailedTxEvent, IssueFilter, StatementError, Transaction, UploadMeta, UploadStatus,
};

/// Unit of background work handed to a [`Runner`]
///
/// The task receives the cancellation token it was submitted with.
pub type Task =
    Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, Result<(), StatementError>> + Send>;

/// Keyed storage for upload state
///
/// Operations are synchronous: implementations must never hold a lock across
/// a suspension point.
pub trait Store: Send + Sync {
    /// Register a new upload; fails with `Conflict` if the id exists
    fn create_upload(&self, meta: UploadMeta) -> Result<(), StoreError>;

    /// Apply `mutate` to the upload's metadata under the record lock
    fn update_meta(
        &self,
        upload_id: &str,
        mutate: &mut dyn FnMut(&mut UploadMeta),
    ) -> Result<(), StoreError>;

    /// Replace the balance, issues and counters of an upload
    fn save_results(
        &self,
        upload_id: &str,
        balance: i64,
        issues: Vec<Transaction>,
        total_lines: u64,
        parsed_ok: u64,
        parse_errors: u64,
    ) -> Result<(), StoreError>;

    /// Consistent `(balance, meta)` snapshot
    fn get_balance(&self, upload_id: &str) -> Result<(i64, UploadMeta), StoreError>;

    /// One page of filtered issues plus the total match count
    fn list_issues(
        &self,
        upload_id: &str,
        filter: &IssueFilter,
        page: usize,
        page_size: usize,
    ) -> Result<IssueSlice, StoreError>;
}

/// Result of [`Store::list_issues`]
#[derive(Debug, Clone, PartialEq)]
pub struct IssueSlice {
    pub transactions: Vec<Transaction>,
    pub total: usize,
    pub status: UploadStatus,
}

/// Destination for failed-transaction events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        token: &CancellationToken,
        event: FailedTxEvent,
    ) -> Result<(), StatementError>;
}

/// Fire-and-forget executor for background work
#[async_trait]
pub trait Runner: Send + Sync {
    /// Hand `task` to the executor
    ///
    /// Returns once the task is admitted or dropped; never reports the task's
    /// own outcome.
    async fn submit(&self, token: &CancellationToken, task: Task);
}

/// Source of unique string identities
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
