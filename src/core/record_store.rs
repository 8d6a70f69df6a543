//! Thread-safe in-memory storage for upload state
//!
//! This module provides the `RecordStore` struct, which keeps one record per
//! upload holding its metadata, running balance and issue list.
//!
//! # Design
//!
//! Locking is two-tier:
//!
//! - The identity-to-record map is a `DashMap`. Its (sharded) locks are only
//!   held for insertion and lookup, never while a record is being read or
//!   mutated.
//! - Each record sits behind its own `RwLock`. Every operation on a record
//!   takes that lock exactly once, so a reader always sees balance, issues
//!   and metadata from the same committed write.
//!
//! Unrelated uploads therefore proceed fully in parallel while mutations
//! within one upload are serialized.
//!
//! The store is memory-resident and non-durable.

use std::sync::{Arc, PoisonError, RwLock};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;

use super::traits::{IssueSlice, Store};
use crate::types::{IssueFilter, ParseStats, Transaction, UploadId, UploadMeta};

/// Storage-level failures
///
/// These never leave the processor as-is; they are translated into
/// business errors at the usecase boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("upload {0} not found")]
    NotFound(UploadId),

    #[error("upload {0} already exists")]
    Conflict(UploadId),
}

#[derive(Debug, Default)]
struct UploadRecord {
    meta: UploadMeta,
    balance: i64,
    issues: Vec<Transaction>,
}

/// In-memory upload store with per-record locking
#[derive(Debug, Default)]
pub struct RecordStore {
    uploads: DashMap<UploadId, Arc<RwLock<UploadRecord>>>,
}

impl RecordStore {
    /// Create a new empty RecordStore
    pub fn new() -> Self {
        Self {
            uploads: DashMap::new(),
        }
    }

    /// Number of registered uploads
    pub fn len(&self) -> usize {
        self.uploads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uploads.is_empty()
    }

    /// Look up a record, releasing the map lock before returning
    fn record(&self, upload_id: &str) -> Result<Arc<RwLock<UploadRecord>>, StoreError> {
        self.uploads
            .get(upload_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| StoreError::NotFound(upload_id.to_string()))
    }
}

impl Store for RecordStore {
    fn create_upload(&self, meta: UploadMeta) -> Result<(), StoreError> {
        match self.uploads.entry(meta.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Conflict(meta.id)),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(RwLock::new(UploadRecord {
                    meta,
                    ..UploadRecord::default()
                })));
                Ok(())
            }
        }
    }

    fn update_meta(
        &self,
        upload_id: &str,
        mutate: &mut dyn FnMut(&mut UploadMeta),
    ) -> Result<(), StoreError> {
        let record = self.record(upload_id)?;
        let mut record = record.write().unwrap_or_else(PoisonError::into_inner);

        // Mutate a private copy so a panicking mutator leaves the record intact
        let mut meta = record.meta.clone();
        mutate(&mut meta);
        record.meta = meta;

        Ok(())
    }

    fn save_results(
        &self,
        upload_id: &str,
        balance: i64,
        issues: Vec<Transaction>,
        total_lines: u64,
        parsed_ok: u64,
        parse_errors: u64,
    ) -> Result<(), StoreError> {
        let record = self.record(upload_id)?;
        let mut record = record.write().unwrap_or_else(PoisonError::into_inner);

        record.balance = balance;
        record.issues = issues;
        record.meta.stats = ParseStats {
            total_lines,
            parsed_ok,
            parse_errors,
        };

        Ok(())
    }

    fn get_balance(&self, upload_id: &str) -> Result<(i64, UploadMeta), StoreError> {
        let record = self.record(upload_id)?;
        let record = record.read().unwrap_or_else(PoisonError::into_inner);

        Ok((record.balance, record.meta.clone()))
    }

    fn list_issues(
        &self,
        upload_id: &str,
        filter: &IssueFilter,
        page: usize,
        page_size: usize,
    ) -> Result<IssueSlice, StoreError> {
        let record = self.record(upload_id)?;
        let record = record.read().unwrap_or_else(PoisonError::into_inner);

        let start = page.saturating_sub(1).saturating_mul(page_size);
        let end = start.saturating_add(page_size);

        let mut total = 0;
        let mut transactions = Vec::with_capacity(page_size.min(record.issues.len()));
        for tx in record.issues.iter().filter(|tx| filter.matches(tx)) {
            if total >= start && total < end {
                transactions.push(tx.clone());
            }
            total += 1;
        }

        Ok(IssueSlice {
            transactions,
            total,
            status: record.meta.status,
        })
    }
}
