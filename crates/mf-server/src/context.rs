//! Application context shared by route handlers via Axum state.

use std::sync::Arc;

use mf_core::config::Config;
use mf_core::{JobId, JobSubmission, Result};
use mf_pipeline::{InMemoryQueue, JobRecord, JobStore};

/// Shared handles for the HTTP layer. Cheap to clone.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub queue: Arc<InMemoryQueue>,
    pub store: Arc<JobStore>,
}

impl AppContext {
    /// Build a context with a fresh queue and store sized from `config`.
    pub fn new(config: Config) -> Self {
        let queue = Arc::new(InMemoryQueue::new(config.queue.capacity));
        let store = Arc::new(JobStore::with_retention(config.status.retain_finished));
        Self {
            config: Arc::new(config),
            queue,
            store,
        }
    }

    /// Validate a submission, record it as queued and enqueue it.
    ///
    /// The record is written before the delivery so a fast worker never
    /// races ahead of it; a rejected enqueue removes the record again.
    pub fn submit(&self, submission: JobSubmission) -> Result<JobRecord> {
        let job = submission.into_descriptor(JobId::new())?;
        let record = self.store.insert_queued(&job);

        if let Err(e) = self.queue.submit(job) {
            self.store.remove(record.id);
            return Err(e);
        }

        tracing::info!(job_id = %record.id, job_type = %record.job_type, "Job queued");
        Ok(record)
    }
}
