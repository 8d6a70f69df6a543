//! Query-side types: issue filters, pagination and result views
//!
//! Results are plain data so that any outer surface (CLI report, HTTP
//! envelope) can render them without probing for capabilities.

use super::error::StatementError;
use super::transaction::{Transaction, TxStatus, TxType};
use super::upload::{UploadId, UploadStatus};

/// Largest page size accepted by [`Pagination::new`]
pub const MAX_PAGE_SIZE: usize = 100;

/// Page size used when a caller does not ask for one
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Predicate over issue transactions
///
/// A transaction matches when it satisfies every non-empty constraint
/// (AND across `statuses` and `types`, OR within each set).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueFilter {
    pub statuses: Vec<TxStatus>,
    pub types: Vec<TxType>,
}

impl Default for IssueFilter {
    fn default() -> Self {
        Self {
            statuses: vec![TxStatus::Failed, TxStatus::Pending],
            types: Vec::new(),
        }
    }
}

impl IssueFilter {
    /// Build a filter from comma-separated status and type lists
    ///
    /// Matching is case-insensitive and empty entries are ignored. Only
    /// `FAILED`/`PENDING` are valid statuses. When no status is given the
    /// default `{FAILED, PENDING}` applies.
    pub fn parse(statuses: Option<&str>, types: Option<&str>) -> Result<Self, StatementError> {
        let mut filter = IssueFilter {
            statuses: Vec::new(),
            types: Vec::new(),
        };

        for value in split_list(statuses) {
            match TxStatus::parse(value) {
                Some(status) if status.is_issue() => filter.statuses.push(status),
                _ => return Err(StatementError::invalid_input("invalid status filter")),
            }
        }

        for value in split_list(types) {
            match TxType::parse(value) {
                Some(tx_type) => filter.types.push(tx_type),
                None => return Err(StatementError::invalid_input("invalid type filter")),
            }
        }

        if filter.statuses.is_empty() {
            filter.statuses = IssueFilter::default().statuses;
        }

        Ok(filter)
    }

    /// Whether a transaction satisfies this filter
    pub fn matches(&self, tx: &Transaction) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&tx.status) {
            return false;
        }

        if !self.types.is_empty() && !self.types.contains(&tx.tx_type) {
            return false;
        }

        true
    }
}

fn split_list(raw: Option<&str>) -> impl Iterator<Item = &str> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// 1-indexed page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: usize,
    pub page_size: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    /// Validate a page request, clamping `page_size` to [`MAX_PAGE_SIZE`]
    pub fn new(page: usize, page_size: usize) -> Result<Self, StatementError> {
        if page < 1 {
            return Err(StatementError::invalid_input("invalid page"));
        }
        if page_size < 1 {
            return Err(StatementError::invalid_input("invalid page_size"));
        }

        Ok(Self {
            page,
            page_size: page_size.min(MAX_PAGE_SIZE),
        })
    }
}

/// Returned when an upload is accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub upload_id: UploadId,
}

/// Balance snapshot of one upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceView {
    pub upload_id: UploadId,
    pub status: UploadStatus,
    pub balance: i64,
}

/// One page of filtered issues
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuesPage {
    pub upload_id: UploadId,
    pub status: UploadStatus,
    pub transactions: Vec<Transaction>,
    pub page: usize,
    pub page_size: usize,
    /// Number of matching issues across all pages
    pub total: usize,
}
