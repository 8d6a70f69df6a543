//! End-to-end statement pipeline
//!
//! Wires the concurrency core together for one run over a set of
//! statement files and renders a CSV report.
//!
//! # Architecture
//!
//! ```text
//! Pipeline
//!     ├── tokio multi-threaded runtime (worker_threads)
//!     ├── StatementProcessor
//!     │   ├── RecordStore
//!     │   ├── TaskRunner (runner_capacity)
//!     │   └── EventBus (bus_capacity) ──► ReconciliationConsumer (LoggingReconciler)
//!     └── report writer (summary | issues)
//! ```
//!
//! Every input is opened before any upload is submitted, so a missing file
//! fails the run without partial work. Uploads that fail while decoding
//! are not fatal for the run; they show up as `FAILED` in the summary.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::compat::TokioAsyncReadCompatExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::core::{
    Dependencies, EventBus, LoggingReconciler, RecordStore, ReconciliationConsumer,
    StatementProcessor, TaskRunner, UuidV7Generator,
};
use crate::io::{write_issues_csv, write_summary_csv, IssueRow, SummaryRow};
use crate::types::{IssueFilter, StatementError, UploadId, MAX_PAGE_SIZE};

/// Which report to write once all uploads are processed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportKind {
    /// One row per input
    Summary,

    /// Every issue matching the filter, per input in statement order
    Issues(IssueFilter),
}

/// One run of the reconciler over a set of statements
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: EngineConfig,
}

impl Pipeline {
    /// Create a pipeline; `config` is normalized here
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config: config.normalized(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Process `inputs` and write the requested report to `output`
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be built, an input cannot be
    /// opened, or the report cannot be written.
    pub fn process(
        &self,
        inputs: &[PathBuf],
        report: &ReportKind,
        output: &mut dyn Write,
    ) -> Result<(), StatementError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.worker_threads)
            .enable_all()
            .build()?;

        runtime.block_on(self.run(inputs, report, output))
    }

    async fn run(
        &self,
        inputs: &[PathBuf],
        report: &ReportKind,
        output: &mut dyn Write,
    ) -> Result<(), StatementError> {
        let root = CancellationToken::new();
        let store = Arc::new(RecordStore::new());
        let bus = Arc::new(EventBus::new(self.config.bus_capacity));
        let runner = Arc::new(TaskRunner::new(self.config.runner_capacity));

        let consumer = ReconciliationConsumer::new(
            Arc::clone(&bus),
            Arc::new(LoggingReconciler),
            self.config.consumer_config(),
            root.child_token(),
        );
        consumer.start();

        let processor = StatementProcessor::new(Dependencies {
            store: Some(store),
            events: Some(bus),
            runner: Some(runner.clone()),
            ids: Some(Arc::new(UuidV7Generator)),
            clock: None,
            root: Some(root.clone()),
        });

        let outcome = ingest(&processor, &runner, inputs).await.and_then(|uploads| {
            write_report(&processor, &uploads, report, output)
        });

        if let Err(e) = consumer.stop(self.config.stop_timeout()).await {
            warn!(error = %e, "reconciliation consumer did not drain in time");
        }
        root.cancel();

        outcome
    }
}

/// Upload every input and wait for all of them to be processed
///
/// Returns `(label, upload id)` pairs in input order.
async fn ingest(
    processor: &StatementProcessor,
    runner: &TaskRunner,
    inputs: &[PathBuf],
) -> Result<Vec<(String, UploadId)>, StatementError> {
    let mut files = Vec::with_capacity(inputs.len());
    for path in inputs {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| StatementError::IoError {
                message: format!("failed to open '{}': {}", path.display(), e),
            })?;
        files.push((label(path), file));
    }

    let mut uploads = Vec::with_capacity(files.len());
    for (label, file) in files {
        let receipt = processor.upload(file.compat()).await?;
        info!(file = %label, upload_id = %receipt.upload_id, "statement submitted");
        uploads.push((label, receipt.upload_id));
    }

    // Decode failures are recorded on each upload; the aggregate is only logged
    if let Err(errors) = runner.wait().await {
        for error in &errors.errors {
            warn!(error = %error, "statement upload failed");
        }
    }

    Ok(uploads)
}

fn label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn write_report(
    processor: &StatementProcessor,
    uploads: &[(String, UploadId)],
    report: &ReportKind,
    output: &mut dyn Write,
) -> Result<(), StatementError> {
    match report {
        ReportKind::Summary => {
            let rows = uploads
                .iter()
                .map(|(file, upload_id)| summary_row(processor, file, upload_id))
                .collect::<Result<Vec<_>, _>>()?;
            write_summary_csv(&rows, output)
        }
        ReportKind::Issues(filter) => {
            let mut rows = Vec::new();
            for (file, upload_id) in uploads {
                collect_issues(processor, file, upload_id, filter, &mut rows)?;
            }
            write_issues_csv(&rows, output)
        }
    }
}

fn summary_row(
    processor: &StatementProcessor,
    file: &str,
    upload_id: &str,
) -> Result<SummaryRow, StatementError> {
    let balance = processor.balance(upload_id)?;
    let meta = processor.status(upload_id)?;
    let issues = processor.issues(upload_id, &IssueFilter::default(), 1, 1)?;

    Ok(SummaryRow {
        file: file.to_string(),
        status: balance.status,
        balance: balance.balance,
        total_lines: meta.stats.total_lines,
        parsed_ok: meta.stats.parsed_ok,
        parse_errors: meta.stats.parse_errors,
        issues: issues.total,
    })
}

fn collect_issues(
    processor: &StatementProcessor,
    file: &str,
    upload_id: &str,
    filter: &IssueFilter,
    rows: &mut Vec<IssueRow>,
) -> Result<(), StatementError> {
    let mut page = 1;
    loop {
        let slice = processor.issues(upload_id, filter, page, MAX_PAGE_SIZE)?;
        rows.extend(slice.transactions.iter().map(|tx| IssueRow::new(file, tx)));

        if page.saturating_mul(MAX_PAGE_SIZE) >= slice.total {
            return Ok(());
        }
        page += 1;
    }
}
