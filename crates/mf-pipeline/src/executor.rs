//! Job executor: drives one job descriptor through fetch, transform, notify
//! and cleanup, and always produces exactly one terminal outcome.

use std::sync::Arc;

use mf_av::TransformEngine;
use mf_core::config::Config;
use mf_core::{JobDescriptor, JobId, JobOutcome, JobState, Result};

use crate::dispatcher::TransformDispatcher;
use crate::fetcher::SourceFetcher;
use crate::notifier::{CallbackResult, Notifier};
use crate::workspace::WorkspaceManager;

/// Receives every state a job run enters.
///
/// Wraps a callback taking the job id and the new state.
pub struct StateObserver {
    callback: Box<dyn Fn(JobId, JobState) + Send + Sync>,
}

impl StateObserver {
    /// Create a new observer from the given callback.
    pub fn new(callback: impl Fn(JobId, JobState) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Create an observer that discards all transitions.
    pub fn noop() -> Self {
        Self {
            callback: Box::new(|_, _| {}),
        }
    }

    pub fn send(&self, id: JobId, state: JobState) {
        (self.callback)(id, state);
    }
}

impl std::fmt::Debug for StateObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateObserver").finish_non_exhaustive()
    }
}

/// Records the path a run takes through the state machine.
struct RunTracker<'a> {
    id: JobId,
    state: JobState,
    transitions: Vec<JobState>,
    observer: &'a StateObserver,
}

impl<'a> RunTracker<'a> {
    fn new(id: JobId, observer: &'a StateObserver) -> Self {
        observer.send(id, JobState::Pending);
        Self {
            id,
            state: JobState::Pending,
            transitions: vec![JobState::Pending],
            observer,
        }
    }

    fn advance(&mut self, next: JobState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        if !self.state.can_transition_to(next) {
            tracing::error!(job_id = %self.id, from = %self.state, to = %next, "Illegal state transition");
        }
        tracing::debug!(job_id = %self.id, from = %self.state, to = %next, "State transition");
        self.state = next;
        self.transitions.push(next);
        self.observer.send(self.id, next);
    }
}

/// Everything a single job run produced.
#[derive(Debug, Clone)]
pub struct JobRun {
    pub outcome: JobOutcome,
    /// States entered, starting with `Pending` and ending with `Done`.
    pub transitions: Vec<JobState>,
    pub callback: CallbackResult,
    /// Machine-readable code of the failure, if the run failed.
    pub error_code: Option<&'static str>,
    /// Whether re-running the job could plausibly succeed.
    pub retryable: bool,
    /// Number of transient files removed during cleanup.
    pub reclaimed: usize,
}

impl JobRun {
    pub fn final_state(&self) -> JobState {
        self.transitions
            .last()
            .copied()
            .unwrap_or(JobState::Pending)
    }
}

/// Orchestrates the workspace, fetcher, dispatcher and notifier.
pub struct JobExecutor {
    workspace: WorkspaceManager,
    fetcher: SourceFetcher,
    dispatcher: TransformDispatcher,
    notifier: Notifier,
}

impl JobExecutor {
    pub fn new(
        workspace: WorkspaceManager,
        fetcher: SourceFetcher,
        dispatcher: TransformDispatcher,
        notifier: Notifier,
    ) -> Self {
        Self {
            workspace,
            fetcher,
            dispatcher,
            notifier,
        }
    }

    /// Wire an executor from configuration around the given engine.
    pub fn from_config(config: &Config, engine: Arc<dyn TransformEngine>) -> Self {
        Self::new(
            WorkspaceManager::from_config(&config.storage),
            SourceFetcher::new(&config.fetch),
            TransformDispatcher::new(engine, config.defaults.clone(), config.transform.timeout()),
            Notifier::new(&config.notify),
        )
    }

    pub fn workspace(&self) -> &WorkspaceManager {
        &self.workspace
    }

    /// Run `job` to its terminal state.
    pub async fn execute(&self, job: &JobDescriptor) -> JobRun {
        self.execute_observed(job, &StateObserver::noop()).await
    }

    /// Run `job` to its terminal state, reporting each transition.
    ///
    /// Never fails: every error becomes a failed [`JobOutcome`]. The callback
    /// is attempted and transient files are reclaimed on both paths.
    pub async fn execute_observed(&self, job: &JobDescriptor, observer: &StateObserver) -> JobRun {
        let mut tracker = RunTracker::new(job.id, observer);
        let lease = self.workspace.lease(job.id);

        tracing::info!(
            job_id = %job.id,
            job_type = %job.job_type,
            sources = job.sources.len(),
            "Job started"
        );

        let (outcome, error_code, retryable) = match self.produce(job, &mut tracker).await {
            Ok(artifact) => {
                let locator = artifact.to_string_lossy().to_string();
                tracing::info!(job_id = %job.id, artifact = %locator, "Job completed");
                (JobOutcome::completed(job.id, locator), None, false)
            }
            Err(e) => {
                tracker.advance(JobState::Failed);
                tracing::error!(job_id = %job.id, code = e.code(), error = %e, "Job failed");
                (JobOutcome::failed(job.id, &e), Some(e.code()), e.retryable())
            }
        };

        tracker.advance(JobState::Notifying);
        let callback = self.notifier.notify(job.callback.as_deref(), &outcome).await;

        tracker.advance(JobState::Cleanup);
        let reclaimed = lease.release();

        tracker.advance(JobState::Done(outcome.status));

        JobRun {
            outcome,
            transitions: tracker.transitions,
            callback,
            error_code,
            retryable,
            reclaimed,
        }
    }

    /// The fallible part of a run: acquire, fetch, transform.
    async fn produce(
        &self,
        job: &JobDescriptor,
        tracker: &mut RunTracker<'_>,
    ) -> Result<std::path::PathBuf> {
        tracker.advance(JobState::Fetching);
        let dir = self.workspace.acquire(job.id)?;
        let report = self.fetcher.fetch_all(&dir, &job.sources).await?;
        if !report.skipped.is_empty() {
            tracing::info!(job_id = %job.id, skipped = ?report.skipped, "Some sources were skipped");
        }

        tracker.advance(JobState::Transforming);
        self.dispatcher
            .dispatch(job, &report.inputs, &self.workspace)
            .await
    }
}
