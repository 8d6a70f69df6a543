//! Transaction-related types for the statement reconciler
//!
//! This module defines the parsed statement line and the enums describing
//! its direction and settlement status.

use serde::{Deserialize, Serialize};

/// Direction of a statement line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TxType {
    /// Money received; adds to the balance when successful
    Credit,

    /// Money sent; subtracts from the balance when successful
    Debit,
}

impl TxType {
    /// Parse a transaction type, ignoring ASCII case
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "CREDIT" => Some(TxType::Credit),
            "DEBIT" => Some(TxType::Debit),
            _ => None,
        }
    }

    /// Canonical upper-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            TxType::Credit => "CREDIT",
            TxType::Debit => "DEBIT",
        }
    }
}

/// Settlement status of a statement line
///
/// Only `Success` lines contribute to the balance. `Failed` and `Pending`
/// lines are kept as issues, and `Failed` lines are also sent for
/// reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TxStatus {
    Success,
    Failed,
    Pending,
}

impl TxStatus {
    /// Parse a transaction status, ignoring ASCII case
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "SUCCESS" => Some(TxStatus::Success),
            "FAILED" => Some(TxStatus::Failed),
            "PENDING" => Some(TxStatus::Pending),
            _ => None,
        }
    }

    /// Canonical upper-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Success => "SUCCESS",
            TxStatus::Failed => "FAILED",
            TxStatus::Pending => "PENDING",
        }
    }

    /// Whether a transaction in this status is an issue
    pub fn is_issue(&self) -> bool {
        !matches!(self, TxStatus::Success)
    }
}

/// One parsed statement line
///
/// Immutable once parsed. Amounts are expressed in the smallest currency
/// unit and are never negative; the direction is carried by `tx_type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Epoch seconds
    pub timestamp: i64,

    /// Name of the other party
    pub counterparty: String,

    pub tx_type: TxType,

    /// Non-negative amount in the smallest currency unit
    pub amount: i64,

    pub status: TxStatus,

    pub description: String,
}

impl Transaction {
    /// Signed contribution of this transaction to the running balance
    ///
    /// Non-successful transactions contribute nothing.
    pub fn balance_delta(&self) -> i64 {
        match (self.status, self.tx_type) {
            (TxStatus::Success, TxType::Credit) => self.amount,
            (TxStatus::Success, TxType::Debit) => -self.amount,
            _ => 0,
        }
    }
}
