//! Statement processing usecase
//!
//! This module provides the `StatementProcessor`, which accepts statements,
//! registers them in the store and hands the decoding work to a runner.
//!
//! # Upload Lifecycle
//!
//! ```text
//! upload() ──► Queued ──(background task)──► Processing ──► Done
//!                                                   └──────► Failed (fatal decode error)
//! ```
//!
//! The background task owns a [`Tally`] for the whole run. Nothing it
//! accumulates is shared until the final `save_results`, which is followed
//! by a single terminal `update_meta` carrying status, end time and counters.
//!
//! # Error Handling
//!
//! - A malformed line is counted and skipped.
//! - A container-level decode error stops the run, marks the upload
//!   `Failed` and is returned to the runner. Results gathered up to that
//!   point are still saved.
//! - A failed publish is logged and never aborts the upload.
//! - Store errors are translated into business errors at this boundary.

use std::sync::Arc;

use futures::io::AsyncRead;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::clock::SystemClock;
use super::record_store::StoreError;
use super::traits::{Clock, EventPublisher, IdGenerator, Runner, Store, Task};
use crate::io::{DecodedLine, StatementReader};
use crate::types::{
    BalanceView, FailedTxEvent, IssueFilter, IssuesPage, ParseStats, StatementError, Transaction,
    TxStatus, UploadId, UploadMeta, UploadReceipt, UploadStatus,
};

impl From<StoreError> for StatementError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(upload_id) => StatementError::upload_not_found(&upload_id),
            StoreError::Conflict(upload_id) => StatementError::upload_conflict(&upload_id),
        }
    }
}

/// Collaborators of a [`StatementProcessor`]
///
/// `store`, `runner` and `ids` are required to accept uploads. Without
/// `events`, failed transactions are still recorded as issues but nothing
/// is published.
#[derive(Default, Clone)]
pub struct Dependencies {
    pub store: Option<Arc<dyn Store>>,
    pub events: Option<Arc<dyn EventPublisher>>,
    pub runner: Option<Arc<dyn Runner>>,
    pub ids: Option<Arc<dyn IdGenerator>>,

    /// Defaults to [`SystemClock`]
    pub clock: Option<Arc<dyn Clock>>,

    /// Token every background task is submitted under; defaults to a fresh one
    pub root: Option<CancellationToken>,
}

/// Orchestrates upload acceptance, background decoding and queries
pub struct StatementProcessor {
    store: Option<Arc<dyn Store>>,
    events: Option<Arc<dyn EventPublisher>>,
    runner: Option<Arc<dyn Runner>>,
    ids: Option<Arc<dyn IdGenerator>>,
    clock: Arc<dyn Clock>,
    root: CancellationToken,
}

impl StatementProcessor {
    pub fn new(deps: Dependencies) -> Self {
        Self {
            store: deps.store,
            events: deps.events,
            runner: deps.runner,
            ids: deps.ids,
            clock: deps.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            root: deps.root.unwrap_or_default(),
        }
    }

    /// Accept a statement for background processing
    ///
    /// Registers the upload as `Queued`, submits the decoding task and
    /// returns as soon as the runner admits (or drops) it. The outcome of
    /// processing is only observable through [`balance`](Self::balance).
    ///
    /// # Errors
    ///
    /// * `StatementError::MissingDependency` - store, runner or id generator
    ///   is not wired in; nothing is submitted
    /// * `StatementError::UploadConflict` - the generated id already exists
    pub async fn upload<R>(&self, stream: R) -> Result<UploadReceipt, StatementError>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let store = required(&self.store, "store")?;
        let runner = required(&self.runner, "runner")?;
        let ids = required(&self.ids, "ids")?;

        let upload_id = ids.generate();
        store.create_upload(UploadMeta::queued(upload_id.clone()))?;
        info!(upload_id = %upload_id, "upload accepted");

        let job = DecodeJob {
            upload_id: upload_id.clone(),
            store: Arc::clone(store),
            events: self.events.clone(),
            ids: Arc::clone(ids),
            clock: Arc::clone(&self.clock),
        };
        let task: Task = Box::new(move |token| job.run(token, stream).boxed());
        runner.submit(&self.root, task).await;

        Ok(UploadReceipt { upload_id })
    }

    /// Current balance and status of an upload
    pub fn balance(&self, upload_id: &str) -> Result<BalanceView, StatementError> {
        validate_id(upload_id)?;
        let store = required(&self.store, "store")?;

        let (balance, meta) = store.get_balance(upload_id)?;

        Ok(BalanceView {
            upload_id: meta.id,
            status: meta.status,
            balance,
        })
    }

    /// Full metadata snapshot of an upload, including its counters
    pub fn status(&self, upload_id: &str) -> Result<UploadMeta, StatementError> {
        validate_id(upload_id)?;
        let store = required(&self.store, "store")?;

        let (_, meta) = store.get_balance(upload_id)?;
        Ok(meta)
    }

    /// One page of an upload's issues matching `filter`
    ///
    /// `page` is 1-indexed. Pages past the end come back empty with the
    /// correct `total`.
    pub fn issues(
        &self,
        upload_id: &str,
        filter: &IssueFilter,
        page: usize,
        page_size: usize,
    ) -> Result<IssuesPage, StatementError> {
        validate_id(upload_id)?;
        if page < 1 {
            return Err(StatementError::invalid_input("invalid page"));
        }
        if page_size < 1 {
            return Err(StatementError::invalid_input("invalid page_size"));
        }
        let store = required(&self.store, "store")?;

        let slice = store.list_issues(upload_id, filter, page, page_size)?;

        Ok(IssuesPage {
            upload_id: upload_id.to_string(),
            status: slice.status,
            transactions: slice.transactions,
            page,
            page_size,
            total: slice.total,
        })
    }
}

fn required<'a, T: ?Sized>(
    dependency: &'a Option<Arc<T>>,
    name: &str,
) -> Result<&'a Arc<T>, StatementError> {
    dependency
        .as_ref()
        .ok_or_else(|| StatementError::missing_dependency(name))
}

fn validate_id(upload_id: &str) -> Result<(), StatementError> {
    if upload_id.trim().is_empty() {
        return Err(StatementError::invalid_input("upload_id is required"));
    }
    Ok(())
}

/// Per-run accumulator, exclusively owned by one background task
#[derive(Debug, Default)]
struct Tally {
    balance: i64,
    issues: Vec<Transaction>,
    stats: ParseStats,
}

impl Tally {
    fn record(&mut self, tx: Transaction) {
        self.stats.record_ok();
        self.balance = self.balance.saturating_add(tx.balance_delta());
        if tx.status.is_issue() {
            self.issues.push(tx);
        }
    }

    fn reject(&mut self) {
        self.stats.record_error();
    }
}

/// Everything the background task needs, moved into it at submission
struct DecodeJob {
    upload_id: UploadId,
    store: Arc<dyn Store>,
    events: Option<Arc<dyn EventPublisher>>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl DecodeJob {
    async fn run<R>(self, token: CancellationToken, stream: R) -> Result<(), StatementError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let started_at = self.clock.now().timestamp();
        self.store.update_meta(&self.upload_id, &mut |meta| {
            meta.status = UploadStatus::Processing;
            meta.started_at = started_at;
        })?;
        debug!(upload_id = %self.upload_id, "upload processing started");

        let (tally, fatal) = self.decode(&token, stream).await;
        let stats = tally.stats;
        let balance = tally.balance;

        self.store.save_results(
            &self.upload_id,
            balance,
            tally.issues,
            stats.total_lines,
            stats.parsed_ok,
            stats.parse_errors,
        )?;

        let ended_at = self.clock.now().timestamp();
        let (status, error_message) = match &fatal {
            Some(e) => (UploadStatus::Failed, Some(e.to_string())),
            None => (UploadStatus::Done, None),
        };
        self.store.update_meta(&self.upload_id, &mut |meta| {
            meta.status = status;
            meta.error_message = error_message.clone();
            meta.ended_at = ended_at;
            meta.stats = stats;
        })?;

        info!(
            upload_id = %self.upload_id,
            status = status.as_str(),
            balance,
            total_lines = stats.total_lines,
            parsed_ok = stats.parsed_ok,
            parse_errors = stats.parse_errors,
            "upload processed"
        );

        match fatal {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Stream the statement into a fresh tally
    ///
    /// Returns the tally together with the fatal error that ended the
    /// stream early, if any.
    async fn decode<R>(
        &self,
        token: &CancellationToken,
        stream: R,
    ) -> (Tally, Option<StatementError>)
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut reader = StatementReader::new(stream);
        let mut tally = Tally::default();

        loop {
            match reader.next_line().await {
                Ok(Some(DecodedLine::Parsed(tx))) => {
                    if tx.status == TxStatus::Failed {
                        self.publish(token, &tx).await;
                    }
                    tally.record(tx);
                }
                Ok(Some(DecodedLine::Rejected(e))) => {
                    warn!(upload_id = %self.upload_id, error = %e, "failed to parse statement record");
                    tally.reject();
                }
                Ok(None) => return (tally, None),
                Err(e) => {
                    warn!(upload_id = %self.upload_id, error = %e, "failed to read statement line");
                    tally.reject();
                    return (tally, Some(e));
                }
            }
        }
    }

    async fn publish(&self, token: &CancellationToken, tx: &Transaction) {
        let Some(events) = &self.events else {
            return;
        };

        let event = FailedTxEvent {
            event_id: self.ids.generate(),
            upload_id: self.upload_id.clone(),
            transaction: tx.clone(),
        };
        let event_id = event.event_id.clone();

        if let Err(e) = events.publish(token, event).await {
            warn!(
                upload_id = %self.upload_id,
                event_id = %event_id,
                error = %e,
                "failed to publish event"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::FixedClock;
    use crate::core::event_bus::EventBus;
    use crate::core::ids::SequenceGenerator;
    use crate::core::record_store::RecordStore;
    use crate::core::task_runner::TaskRunner;
    use crate::types::{ErrorKind, TxType};
    use async_trait::async_trait;
    use futures::io::Cursor;
    use rstest::rstest;
    use std::sync::Mutex;

    const SCENARIO: &str = "1674507883, JOHN, CREDIT, 100, SUCCESS, salary\n\
                            1674507884, JOHN, DEBIT, 50, SUCCESS, grocery\n\
                            1674507885, JOHN, DEBIT, 20, FAILED, restaurant\n\
                            1674507886, JOHN, CREDIT, 10, PENDING, transfer\n";

    #[derive(Default)]
    struct RecordingPublisher {
        events: Mutex<Vec<FailedTxEvent>>,
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(
            &self,
            _token: &CancellationToken,
            event: FailedTxEvent,
        ) -> Result<(), StatementError> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    struct ClosedPublisher;

    #[async_trait]
    impl EventPublisher for ClosedPublisher {
        async fn publish(
            &self,
            _token: &CancellationToken,
            _event: FailedTxEvent,
        ) -> Result<(), StatementError> {
            Err(StatementError::BusClosed)
        }
    }

    struct Harness {
        processor: StatementProcessor,
        runner: Arc<TaskRunner>,
        store: Arc<RecordStore>,
    }

    fn harness(events: Option<Arc<dyn EventPublisher>>) -> Harness {
        let store = Arc::new(RecordStore::new());
        let runner = Arc::new(TaskRunner::new(2));
        let processor = StatementProcessor::new(Dependencies {
            store: Some(store.clone()),
            events,
            runner: Some(runner.clone()),
            ids: Some(Arc::new(SequenceGenerator::new("upload"))),
            clock: Some(Arc::new(FixedClock::at(1_700_000_000))),
            root: None,
        });

        Harness {
            processor,
            runner,
            store,
        }
    }

    #[tokio::test]
    async fn test_statement_scenario() {
        let publisher = Arc::new(RecordingPublisher::default());
        let h = harness(Some(publisher.clone()));

        let receipt = h.processor.upload(Cursor::new(SCENARIO.as_bytes())).await.unwrap();
        h.runner.wait().await.unwrap();

        let view = h.processor.balance(&receipt.upload_id).unwrap();
        assert_eq!(view.status, UploadStatus::Done);
        assert_eq!(view.balance, 50);

        let page = h
            .processor
            .issues(&receipt.upload_id, &IssueFilter::default(), 1, 10)
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.transactions[0].status, TxStatus::Failed);
        assert_eq!(page.transactions[1].status, TxStatus::Pending);

        let events = publisher.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].upload_id, receipt.upload_id);
        assert_eq!(events[0].transaction.description, "restaurant");
    }

    #[tokio::test]
    async fn test_scenario_through_event_bus() {
        let bus = Arc::new(EventBus::new(8));
        let h = harness(Some(bus.clone()));

        h.processor.upload(Cursor::new(SCENARIO.as_bytes())).await.unwrap();
        h.runner.wait().await.unwrap();
        bus.close();

        let subscription = bus.subscribe();
        let mut received = 0;
        while subscription.next().await.is_some() {
            received += 1;
        }
        assert_eq!(received, 1);
    }

    #[tokio::test]
    async fn test_meta_records_times_and_counters() {
        let h = harness(None);

        let receipt = h.processor.upload(Cursor::new(SCENARIO.as_bytes())).await.unwrap();
        h.runner.wait().await.unwrap();

        let meta = h.processor.status(&receipt.upload_id).unwrap();
        assert_eq!(meta.status, UploadStatus::Done);
        assert_eq!(meta.started_at, 1_700_000_000);
        assert_eq!(meta.ended_at, 1_700_000_000);
        assert_eq!(meta.error_message, None);
        assert_eq!(meta.stats.total_lines, 4);
        assert_eq!(meta.stats.parsed_ok, 4);
        assert_eq!(meta.stats.parse_errors, 0);
    }

    #[tokio::test]
    async fn test_malformed_lines_are_counted_and_skipped() {
        let h = harness(None);
        let content = "1674507883, JOHN, CREDIT, 100, SUCCESS, salary\n\
                       garbage\n\
                       1674507884, JOHN, DEBIT, -5, SUCCESS, negative\n\
                       1674507885, JOHN, REFUND, 5, SUCCESS, unknown type\n\
                       1674507886, JOHN, DEBIT, 30, SUCCESS, rent\n";

        let receipt = h.processor.upload(Cursor::new(content.as_bytes())).await.unwrap();
        h.runner.wait().await.unwrap();

        let (balance, meta) = h.store.get_balance(&receipt.upload_id).unwrap();
        assert_eq!(meta.status, UploadStatus::Done);
        assert_eq!(balance, 70);
        assert_eq!(meta.stats.total_lines, 5);
        assert_eq!(meta.stats.parsed_ok, 2);
        assert_eq!(meta.stats.parse_errors, 3);
    }

    #[tokio::test]
    async fn test_fatal_decode_error_fails_upload_but_keeps_results() {
        let h = harness(None);
        let mut content = b"1674507883, JOHN, CREDIT, 100, SUCCESS, salary\n".to_vec();
        content.extend_from_slice(b"1674507884, JO\xff\xfeHN, DEBIT, 50, SUCCESS, grocery\n");
        content.extend_from_slice(b"1674507885, JOHN, DEBIT, 20, SUCCESS, never read\n");

        let receipt = h.processor.upload(Cursor::new(content)).await.unwrap();
        let errors = h.runner.wait().await.unwrap_err();

        assert!(matches!(
            errors.errors.as_slice(),
            [StatementError::DecodeError { line: Some(2), .. }]
        ));

        let (balance, meta) = h.store.get_balance(&receipt.upload_id).unwrap();
        assert_eq!(meta.status, UploadStatus::Failed);
        assert!(meta.error_message.is_some());
        assert_eq!(balance, 100);
        assert_eq!(meta.stats.total_lines, 2);
        assert_eq!(meta.stats.parsed_ok, 1);
        assert_eq!(meta.stats.parse_errors, 1);
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_abort_upload() {
        let h = harness(Some(Arc::new(ClosedPublisher)));

        let receipt = h.processor.upload(Cursor::new(SCENARIO.as_bytes())).await.unwrap();
        h.runner.wait().await.unwrap();

        let view = h.processor.balance(&receipt.upload_id).unwrap();
        assert_eq!(view.status, UploadStatus::Done);
        assert_eq!(view.balance, 50);
    }

    #[tokio::test]
    async fn test_upload_ids_are_unique() {
        let h = harness(None);

        let first = h.processor.upload(Cursor::new(&b""[..])).await.unwrap();
        let second = h.processor.upload(Cursor::new(&b""[..])).await.unwrap();
        h.runner.wait().await.unwrap();

        assert_ne!(first.upload_id, second.upload_id);
        assert_eq!(h.store.len(), 2);
    }

    #[rstest]
    #[case::no_store("store")]
    #[case::no_runner("runner")]
    #[case::no_ids("ids")]
    #[tokio::test]
    async fn test_missing_dependency_fails_fast(#[case] missing: &str) {
        let store = Arc::new(RecordStore::new());
        let mut deps = Dependencies {
            store: Some(store.clone()),
            events: None,
            runner: Some(Arc::new(TaskRunner::new(1))),
            ids: Some(Arc::new(SequenceGenerator::new("upload"))),
            clock: None,
            root: None,
        };
        match missing {
            "store" => deps.store = None,
            "runner" => deps.runner = None,
            _ => deps.ids = None,
        }
        let processor = StatementProcessor::new(deps);

        let err = processor.upload(Cursor::new(SCENARIO.as_bytes())).await.unwrap_err();

        assert_eq!(err, StatementError::missing_dependency(missing));
        assert_eq!(err.kind(), ErrorKind::Server);
        assert!(store.is_empty());
    }

    #[test]
    fn test_unknown_upload_is_business_not_found() {
        let h = harness(None);

        let err = h.processor.balance("missing").unwrap_err();
        assert_eq!(err, StatementError::upload_not_found("missing"));
        assert_eq!(err.kind(), ErrorKind::Business);

        let err = h
            .processor
            .issues("missing", &IssueFilter::default(), 1, 10)
            .unwrap_err();
        assert_eq!(err, StatementError::upload_not_found("missing"));
    }

    #[rstest]
    #[case::empty_id("", 1, 10)]
    #[case::blank_id("  ", 1, 10)]
    #[case::zero_page("upload-1", 0, 10)]
    #[case::zero_page_size("upload-1", 1, 0)]
    fn test_query_validation(#[case] upload_id: &str, #[case] page: usize, #[case] page_size: usize) {
        let h = harness(None);

        let err = h
            .processor
            .issues(upload_id, &IssueFilter::default(), page, page_size)
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_issue_filter_by_type() {
        let h = harness(None);
        let receipt = h.processor.upload(Cursor::new(SCENARIO.as_bytes())).await.unwrap();
        h.runner.wait().await.unwrap();

        let filter = IssueFilter::parse(None, Some("credit")).unwrap();
        let page = h.processor.issues(&receipt.upload_id, &filter, 1, 10).unwrap();

        assert_eq!(page.total, 1);
        assert_eq!(page.transactions[0].tx_type, TxType::Credit);
        assert_eq!(page.transactions[0].status, TxStatus::Pending);
    }

    #[test]
    fn test_store_errors_translate_to_business_errors() {
        let not_found: StatementError = StoreError::NotFound("u-1".to_string()).into();
        let conflict: StatementError = StoreError::Conflict("u-1".to_string()).into();

        assert_eq!(not_found, StatementError::upload_not_found("u-1"));
        assert_eq!(conflict, StatementError::upload_conflict("u-1"));
        assert_eq!(conflict.kind(), ErrorKind::Business);
    }
}
