//! Core business logic module
//!
//! This module contains the concurrency core of the reconciler:
//! - `traits` - Collaborator seams (store, publisher, runner, ids, clock)
//! - `task_runner` - Bounded-concurrency background executor
//! - `record_store` - Per-upload state with two-tier locking
//! - `event_bus` - Bounded queue of failed-transaction events
//! - `consumer` - Idempotent, retrying reconciliation workers
//! - `processor` - Upload orchestration and queries
//! - `ids`, `clock` - Identity and time sources

pub mod clock;
pub mod consumer;
pub mod event_bus;
pub mod ids;
pub mod processor;
pub mod record_store;
pub mod task_runner;
pub mod traits;

pub use clock::{FixedClock, SystemClock};
pub use consumer::{
    ConsumerConfig, LoggingReconciler, ReconciliationConsumer, ReconciliationHandler,
};
pub use event_bus::{EventBus, Subscription};
pub use ids::{SequenceGenerator, UuidV7Generator};
pub use processor::{Dependencies, StatementProcessor};
pub use record_store::{RecordStore, StoreError};
pub use task_runner::TaskRunner;
pub use traits::{Clock, EventPublisher, IdGenerator, IssueSlice, Runner, Store, Task};
