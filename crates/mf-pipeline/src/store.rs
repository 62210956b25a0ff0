//! In-memory job status records.
//!
//! Queued and running jobs are always kept. Finished records are kept up to
//! a retention limit, after which the least recently finished are evicted.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use mf_core::{JobDescriptor, JobId, JobOutcome, JobState, JobStatus, JobType};

use crate::executor::JobRun;
use crate::notifier::CallbackResult;

/// What the status surface knows about one job.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: JobId,
    pub job_type: JobType,
    pub status: JobStatus,
    /// Last execution state entered, `None` until a worker picks the job up.
    pub state: Option<JobState>,
    pub outcome: Option<JobOutcome>,
    pub error_code: Option<String>,
    pub retryable: bool,
    pub callback: Option<CallbackResult>,
    /// Number of deliveries the job has received.
    pub attempts: u32,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    fn queued(job: &JobDescriptor) -> Self {
        let now = Utc::now();
        Self {
            id: job.id,
            job_type: job.job_type,
            status: JobStatus::Queued,
            state: None,
            outcome: None,
            error_code: None,
            retryable: false,
            callback: None,
            attempts: 0,
            submitted_at: now,
            updated_at: now,
        }
    }
}

/// Finished records kept by [`JobStore::new`].
pub const DEFAULT_RETAIN_FINISHED: usize = 1000;

/// Concurrent map of job records keyed by id.
#[derive(Debug)]
pub struct JobStore {
    records: DashMap<JobId, JobRecord>,
    retain_finished: usize,
}

impl Default for JobStore {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RETAIN_FINISHED)
    }
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store keeping at most `retain_finished` completed or failed records.
    pub fn with_retention(retain_finished: usize) -> Self {
        Self {
            records: DashMap::new(),
            retain_finished,
        }
    }

    /// Record a newly submitted job as queued.
    pub fn insert_queued(&self, job: &JobDescriptor) -> JobRecord {
        let record = JobRecord::queued(job);
        self.records.insert(job.id, record.clone());
        record
    }

    /// Note that a worker received a delivery of `job`.
    ///
    /// Creates the record if the job bypassed submission. A redelivery
    /// clears the result of the previous attempt.
    pub fn start(&self, job: &JobDescriptor, attempt: u32) {
        let mut entry = self
            .records
            .entry(job.id)
            .or_insert_with(|| JobRecord::queued(job));
        let record = entry.value_mut();
        record.status = JobStatus::Running;
        record.state = Some(JobState::Pending);
        record.outcome = None;
        record.error_code = None;
        record.retryable = false;
        record.callback = None;
        record.attempts = attempt;
        record.updated_at = Utc::now();
    }

    /// Track a state transition reported by the executor.
    ///
    /// The terminal state is ignored here: it becomes visible through
    /// [`JobStore::finish`] together with the outcome.
    pub fn mark_state(&self, id: JobId, state: JobState) {
        if state.is_terminal() {
            return;
        }
        if let Some(mut record) = self.records.get_mut(&id) {
            record.state = Some(state);
            record.status = JobStatus::Running;
            record.updated_at = Utc::now();
        }
    }

    /// Store the result of a finished run, then evict the oldest finished
    /// records beyond the retention limit.
    pub fn finish(&self, run: &JobRun) {
        if let Some(mut record) = self.records.get_mut(&run.outcome.id) {
            record.status = run.outcome.status.into();
            record.state = Some(run.final_state());
            record.outcome = Some(run.outcome.clone());
            record.error_code = run.error_code.map(str::to_string);
            record.retryable = run.retryable;
            record.callback = Some(run.callback.clone());
            record.updated_at = Utc::now();
        }
        self.evict_finished();
    }

    fn evict_finished(&self) {
        let mut finished: Vec<(DateTime<Utc>, JobId)> = self
            .records
            .iter()
            .filter(|r| matches!(r.status, JobStatus::Completed | JobStatus::Failed))
            .map(|r| (r.updated_at, r.id))
            .collect();
        if finished.len() <= self.retain_finished {
            return;
        }

        finished.sort_by_key(|(finished_at, _)| *finished_at);
        let excess = finished.len() - self.retain_finished;
        for (_, id) in finished.into_iter().take(excess) {
            self.records.remove(&id);
        }
        tracing::debug!(evicted = excess, "Evicted finished job records");
    }

    /// Forget a job, e.g. when its enqueue was rejected.
    pub fn remove(&self, id: JobId) -> Option<JobRecord> {
        self.records.remove(&id).map(|(_, record)| record)
    }

    pub fn get(&self, id: JobId) -> Option<JobRecord> {
        self.records.get(&id).map(|r| r.value().clone())
    }

    /// All records, newest submission first, optionally filtered by status.
    pub fn list(&self, status: Option<JobStatus>) -> Vec<JobRecord> {
        let mut records: Vec<JobRecord> = self
            .records
            .iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .map(|r| r.value().clone())
            .collect();
        records.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
