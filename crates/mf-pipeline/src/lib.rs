//! # mf-pipeline
//!
//! The job execution pipeline: per-job workspaces, source fetching,
//! recipe dispatch, outcome callbacks, and the executor that ties them into
//! one run. Also hosts the queue boundary, the status store and the worker
//! loop that feeds deliveries into the executor.

pub mod dispatcher;
pub mod executor;
pub mod fetcher;
pub mod notifier;
pub mod queue;
pub mod store;
pub mod worker;
pub mod workspace;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use dispatcher::TransformDispatcher;
pub use executor::{JobExecutor, JobRun, StateObserver};
pub use fetcher::{FetchReport, SourceFetcher};
pub use notifier::{CallbackResult, Notifier};
pub use queue::{Delivery, InMemoryQueue, JobQueue};
pub use store::{JobRecord, JobStore};
pub use worker::Worker;
pub use workspace::{WorkspaceLease, WorkspaceManager};
