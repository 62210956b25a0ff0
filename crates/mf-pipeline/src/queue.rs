//! Job queue boundary.
//!
//! Workers consume [`Delivery`] values through the [`JobQueue`] trait and
//! acknowledge each one after the job reached its terminal state. The
//! [`InMemoryQueue`] keeps unacknowledged deliveries so they can be handed
//! out again, giving at-least-once semantics within one process.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use mf_core::{DeliveryTag, Error, JobDescriptor, Result};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// One hand-off of a job to a worker.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub tag: DeliveryTag,
    pub job: JobDescriptor,
    /// 1 for the first delivery, incremented on every redelivery.
    pub attempt: u32,
}

/// Source of jobs for a worker.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Wait for the next delivery. `None` means the queue is closed and
    /// drained.
    async fn receive(&self) -> Option<Delivery>;

    /// Acknowledge a delivery. Called once per delivery, after its job
    /// reached a terminal state.
    async fn ack(&self, tag: DeliveryTag) -> Result<()>;
}

/// Bounded in-process queue with redelivery of unacknowledged jobs.
pub struct InMemoryQueue {
    tx: mpsc::Sender<Delivery>,
    rx: Mutex<mpsc::Receiver<Delivery>>,
    in_flight: DashMap<DeliveryTag, Delivery>,
    acked: AtomicUsize,
    closed: CancellationToken,
}

impl InMemoryQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Mutex::new(rx),
            in_flight: DashMap::new(),
            acked: AtomicUsize::new(0),
            closed: CancellationToken::new(),
        }
    }

    /// Enqueue a job for its first delivery.
    ///
    /// # Errors
    ///
    /// [`Error::QueueFull`] when at capacity, [`Error::QueueClosed`] after
    /// [`InMemoryQueue::close`].
    pub fn submit(&self, job: JobDescriptor) -> Result<DeliveryTag> {
        self.enqueue(job, 1)
    }

    fn enqueue(&self, job: JobDescriptor, attempt: u32) -> Result<DeliveryTag> {
        if self.closed.is_cancelled() {
            return Err(Error::QueueClosed);
        }
        let tag = DeliveryTag::new();
        let id = job.id;
        self.tx
            .try_send(Delivery { tag, job, attempt })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => Error::QueueFull,
                mpsc::error::TrySendError::Closed(_) => Error::QueueClosed,
            })?;
        tracing::debug!(job_id = %id, tag = %tag, attempt, "Job enqueued");
        Ok(tag)
    }

    /// Put every unacknowledged delivery back on the queue.
    ///
    /// Models a broker handing jobs of a lost worker to another one. Returns
    /// how many deliveries were re-enqueued.
    pub fn redeliver_unacked(&self) -> Result<usize> {
        let tags: Vec<DeliveryTag> = self.in_flight.iter().map(|e| *e.key()).collect();
        let mut count = 0;
        for tag in tags {
            if let Some((_, delivery)) = self.in_flight.remove(&tag) {
                tracing::info!(
                    job_id = %delivery.job.id,
                    attempt = delivery.attempt + 1,
                    "Redelivering unacknowledged job"
                );
                self.enqueue(delivery.job, delivery.attempt + 1)?;
                count += 1;
            }
        }
        Ok(count)
    }

    /// Stop accepting jobs. Receivers drain what is already queued and then
    /// get `None`.
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Deliveries waiting to be received.
    pub fn depth(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Deliveries received but not yet acknowledged.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Total acknowledgements since creation.
    pub fn acked(&self) -> usize {
        self.acked.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl JobQueue for InMemoryQueue {
    async fn receive(&self) -> Option<Delivery> {
        let mut rx = self.rx.lock().await;
        let delivery = if self.closed.is_cancelled() {
            rx.try_recv().ok()
        } else {
            tokio::select! {
                d = rx.recv() => d,
                _ = self.closed.cancelled() => rx.try_recv().ok(),
            }
        }?;
        self.in_flight.insert(delivery.tag, delivery.clone());
        Some(delivery)
    }

    async fn ack(&self, tag: DeliveryTag) -> Result<()> {
        match self.in_flight.remove(&tag) {
            Some((_, delivery)) => {
                self.acked.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(job_id = %delivery.job.id, tag = %tag, "Delivery acknowledged");
                Ok(())
            }
            None => Err(Error::not_found("delivery", tag)),
        }
    }
}
