//! Background worker.
//!
//! Pulls deliveries from a [`JobQueue`], runs each through the
//! [`JobExecutor`] with bounded parallelism, records progress in the
//! [`JobStore`], and acknowledges each delivery once its job is terminal.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::executor::{JobExecutor, StateObserver};
use crate::queue::{Delivery, JobQueue};
use crate::store::JobStore;

/// Runs queued jobs until cancelled or the queue closes.
pub struct Worker {
    queue: Arc<dyn JobQueue>,
    executor: Arc<JobExecutor>,
    store: Arc<JobStore>,
    concurrency: usize,
}

impl Worker {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        executor: Arc<JobExecutor>,
        store: Arc<JobStore>,
        concurrency: usize,
    ) -> Self {
        Self {
            queue,
            executor,
            store,
            concurrency: concurrency.max(1),
        }
    }

    /// Run the receive loop.
    ///
    /// On cancellation no further deliveries are received; jobs already
    /// running are driven to their terminal state and acknowledged before
    /// this returns.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(concurrency = self.concurrency, "Worker started");

        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        loop {
            let permit = tokio::select! {
                _ = cancel.cancelled() => break,
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let delivery = tokio::select! {
                _ = cancel.cancelled() => break,
                delivery = self.queue.receive() => match delivery {
                    Some(delivery) => delivery,
                    None => {
                        tracing::info!("Queue closed");
                        break;
                    }
                },
            };

            while let Some(finished) = tasks.try_join_next() {
                log_task_result(finished);
            }

            let queue = self.queue.clone();
            let executor = self.executor.clone();
            let store = self.store.clone();
            tasks.spawn(async move {
                let _permit = permit;
                process_delivery(queue.as_ref(), &executor, &store, delivery).await;
            });
        }

        if !tasks.is_empty() {
            tracing::info!(in_flight = tasks.len(), "Worker draining in-flight jobs");
        }
        while let Some(finished) = tasks.join_next().await {
            log_task_result(finished);
        }

        tracing::info!("Worker stopped");
    }
}

/// Execute one delivery to completion and acknowledge it.
pub async fn process_delivery(
    queue: &dyn JobQueue,
    executor: &JobExecutor,
    store: &Arc<JobStore>,
    delivery: Delivery,
) {
    let job = &delivery.job;
    tracing::info!(job_id = %job.id, attempt = delivery.attempt, "Processing job");

    store.start(job, delivery.attempt);
    let observer = {
        let store = store.clone();
        StateObserver::new(move |id, state| store.mark_state(id, state))
    };

    let run = executor.execute_observed(job, &observer).await;
    store.finish(&run);

    if let Err(e) = queue.ack(delivery.tag).await {
        tracing::warn!(job_id = %job.id, error = %e, "Failed to acknowledge delivery");
    }
}

fn log_task_result(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        // The delivery of a panicked job stays unacknowledged and can be
        // redelivered.
        tracing::error!(error = %e, "Job task panicked");
    }
}
