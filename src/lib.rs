//! Statement Reconciler Library
//! # Overview
//!
//! This library ingests bank-statement CSV files, computes a balance and a
//! list of issue transactions per statement in the background, and
//! reconciles failed transactions through a retrying event pipeline.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Transaction, UploadMeta, errors, queries)
//! - [`cli`] - CLI arguments parsing
//! - [`config`] - Engine tunables and TOML loading
//! - [`core`] - Concurrency core:
//!   - [`core::task_runner`] - Bounded-concurrency background executor
//!   - [`core::record_store`] - Per-upload state with two-tier locking
//!   - [`core::event_bus`] - Bounded queue of failed-transaction events
//!   - [`core::consumer`] - Idempotent, retrying reconciliation
//!   - [`core::processor`] - Upload orchestration and queries
//! - [`io`] - Statement decoding and report writing
//! - [`pipeline`] - One end-to-end run over a set of files
//!
//! # Statement Lines
//!
//! Each line is `timestamp, counterparty, type, amount, status, description`:
//!
//! - **type**: `CREDIT` adds to the balance, `DEBIT` subtracts from it
//! - **status**: only `SUCCESS` lines move the balance; `FAILED` and
//!   `PENDING` lines are kept as issues
//! - **FAILED** lines are additionally published for reconciliation
//!
//! # Upload States
//!
//! Each upload moves through `QUEUED -> PROCESSING -> DONE | FAILED`. A
//! malformed line is counted and skipped; only an unreadable file ends in
//! `FAILED`.

// Module declarations
pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod types;

pub use config::EngineConfig;
pub use core::{
    EventBus, RecordStore, ReconciliationConsumer, StatementProcessor, TaskRunner,
};
pub use pipeline::{Pipeline, ReportKind};
pub use types::{
    FailedTxEvent, StatementError, Transaction, TxStatus, TxType, UploadMeta, UploadStatus,
};
