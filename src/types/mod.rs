//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `transaction`: Parsed statement lines and their enums
//! - `upload`: Upload identity, lifecycle and counters
//! - `event`: Failed-transaction notifications
//! - `query`: Issue filters, pagination and result views
//! - `error`: Error taxonomy for the reconciler

pub mod error;
pub mod event;
pub mod query;
pub mod transaction;
pub mod upload;

pub use error::{ErrorCode, ErrorKind, StatementError, TaskErrors};
pub use event::FailedTxEvent;
pub use query::{
    BalanceView, IssueFilter, IssuesPage, Pagination, UploadReceipt, DEFAULT_PAGE_SIZE,
    MAX_PAGE_SIZE,
};
pub use transaction::{Transaction, TxStatus, TxType};
pub use upload::{ParseStats, UploadId, UploadMeta, UploadStatus};
