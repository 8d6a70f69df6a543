//! Reconciliation events

use super::transaction::Transaction;
use super::upload::UploadId;

/// Notification that one transaction failed and needs reconciliation
///
/// Created once per failed transaction while a statement is decoded and never
/// mutated afterwards. `event_id` is unique per publish and is what the
/// consumer de-duplicates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedTxEvent {
    pub event_id: String,
    pub upload_id: UploadId,
    pub transaction: Transaction,
}
