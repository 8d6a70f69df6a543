//! Upload lifecycle types
//!
//! An upload is one submitted statement. Its metadata is created in the
//! `Queued` state and then owned by the single background task that
//! processes it.

use serde::{Deserialize, Serialize};

/// Opaque upload identity
pub type UploadId = String;

/// Lifecycle of an upload
///
/// Transitions are monotonic: `Queued -> Processing -> {Done, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UploadStatus {
    #[default]
    Queued,
    Processing,
    Done,
    Failed,
}

impl UploadStatus {
    /// Canonical upper-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Queued => "QUEUED",
            UploadStatus::Processing => "PROCESSING",
            UploadStatus::Done => "DONE",
            UploadStatus::Failed => "FAILED",
        }
    }

    /// Whether the upload has reached a final state
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadStatus::Done | UploadStatus::Failed)
    }
}

/// Per-line decoding counters
///
/// `total_lines` always equals `parsed_ok + parse_errors`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub total_lines: u64,
    pub parsed_ok: u64,
    pub parse_errors: u64,
}

impl ParseStats {
    /// Count a line that decoded into a transaction
    pub fn record_ok(&mut self) {
        self.total_lines += 1;
        self.parsed_ok += 1;
    }

    /// Count a line that could not be decoded
    pub fn record_error(&mut self) {
        self.total_lines += 1;
        self.parse_errors += 1;
    }
}

/// Identity and lifecycle of one submitted statement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadMeta {
    pub id: UploadId,
    pub status: UploadStatus,

    /// Set when the upload ends in `Failed`
    pub error_message: Option<String>,

    /// Epoch seconds, zero until processing starts
    pub started_at: i64,

    /// Epoch seconds, zero until processing ends
    pub ended_at: i64,

    pub stats: ParseStats,
}

impl UploadMeta {
    /// Metadata for a freshly accepted upload
    pub fn queued(id: impl Into<UploadId>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}
