//! Worker pools serving a job queue.
//!
//! Every job handed to a worker ends with exactly one call to its completion
//! callback: the handler's output, `WorkerLost` if the worker panicked or was
//! torn down mid-job, or `Abandoned` if the lane shut down first. Once a job
//! has finished its completion runs to the end even if the worker goes away.

use super::queue::{JobQueue, QueueClosed};
use crate::domain::errors::JobError;
use crate::domain::jobs::Priority;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub type Completion<O> = Box<dyn FnOnce(Result<O, JobError>) -> BoxFuture<'static, ()> + Send>;

pub struct Envelope<J, O> {
    pub id: String,
    pub priority: Priority,
    pub payload: J,
    completion: Completion<O>,
}

/// The work a pool performs for each job.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    type Job: Send + Sync + 'static;
    type Output: Send + 'static;

    async fn handle(&self, job: &Self::Job) -> Self::Output;
}

/// Submission side of a pool.
pub struct Lane<J, O> {
    queue: Arc<JobQueue<Envelope<J, O>>>,
}

impl<J, O> Clone for Lane<J, O> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
        }
    }
}

impl<J: Send + 'static, O: Send + 'static> Lane<J, O> {
    /// Queue `job`; `on_complete` runs once with whatever became of it.
    pub fn submit<F, Fut>(
        &self,
        priority: Priority,
        job: J,
        on_complete: F,
    ) -> Result<String, QueueClosed>
    where
        F: FnOnce(Result<O, JobError>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = Uuid::new_v4().to_string();
        let completion: Completion<O> = Box::new(move |result: Result<O, JobError>| on_complete(result).boxed());
        self.queue.push(
            priority,
            Envelope {
                id: id.clone(),
                priority,
                payload: job,
                completion,
            },
        )?;
        tracing::debug!(lane = self.queue.name(), job_id = %id, ?priority, "job queued");
        Ok(id)
    }

    pub fn name(&self) -> &'static str {
        self.queue.name()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

pub struct WorkerPool<H: JobHandler> {
    name: &'static str,
    handler: Arc<H>,
    queue: Arc<JobQueue<Envelope<H::Job, H::Output>>>,
}

impl<H: JobHandler> WorkerPool<H> {
    pub fn new(name: &'static str, handler: H) -> Self {
        Self {
            name,
            handler: Arc::new(handler),
            queue: Arc::new(JobQueue::new(name)),
        }
    }

    pub fn lane(&self) -> Lane<H::Job, H::Output> {
        Lane {
            queue: self.queue.clone(),
        }
    }

    /// Spawn `workers` tasks pulling from the queue.
    pub fn start(&self, workers: usize) -> Vec<JoinHandle<()>> {
        let workers = workers.max(1);
        tracing::info!(lane = self.name, workers, "starting worker pool");
        (0..workers)
            .map(|worker_id| {
                let handler = self.handler.clone();
                let queue = self.queue.clone();
                tokio::spawn(worker_loop(self.name, worker_id, handler, queue))
            })
            .collect()
    }

    /// Close the lane. Jobs that never reached a worker complete with `Abandoned`.
    pub async fn shutdown(&self) {
        let pending = self.queue.close();
        if !pending.is_empty() {
            tracing::warn!(lane = self.name, jobs = pending.len(), "abandoning queued jobs");
        }
        for envelope in pending {
            let job_id = envelope.id;
            deliver(
                self.name,
                envelope.completion,
                Err(JobError::Abandoned { job_id }),
            )
            .await;
        }
    }
}

async fn worker_loop<H: JobHandler>(
    lane: &'static str,
    worker_id: usize,
    handler: Arc<H>,
    queue: Arc<JobQueue<Envelope<H::Job, H::Output>>>,
) {
    tracing::debug!(lane, worker_id, "worker started");

    while let Some(envelope) = queue.pop().await {
        let Envelope {
            id,
            priority,
            payload,
            completion,
        } = envelope;
        tracing::debug!(lane, worker_id, job_id = %id, ?priority, "job claimed");

        let mut claim = Claim {
            lane,
            job_id: id.clone(),
            completion: Some(completion),
        };

        let result = match AssertUnwindSafe(handler.handle(&payload))
            .catch_unwind()
            .await
        {
            Ok(output) => Ok(output),
            Err(_) => {
                tracing::error!(lane, worker_id, job_id = %id, "worker panicked while running job");
                Err(JobError::WorkerLost { job_id: id })
            }
        };

        // The completion runs on its own task and outlives an abort of this worker.
        if let Some(completion) = claim.completion.take() {
            let delivery = tokio::spawn(deliver(lane, completion, result));
            if let Err(e) = delivery.await {
                tracing::error!(lane, worker_id, job_id = %claim.job_id, "completion task failed: {}", e);
            }
        }
    }

    tracing::debug!(lane, worker_id, "worker stopped");
}

async fn deliver<O>(lane: &'static str, completion: Completion<O>, result: Result<O, JobError>) {
    if AssertUnwindSafe(completion(result))
        .catch_unwind()
        .await
        .is_err()
    {
        tracing::error!(lane, "completion callback panicked");
    }
}

/// A job held by a worker. If the worker task is dropped before the job
/// finishes, the completion still fires with `WorkerLost`.
struct Claim<O: Send + 'static> {
    lane: &'static str,
    job_id: String,
    completion: Option<Completion<O>>,
}

impl<O: Send + 'static> Drop for Claim<O> {
    fn drop(&mut self) {
        let Some(completion) = self.completion.take() else {
            return;
        };
        tracing::error!(lane = self.lane, job_id = %self.job_id, "worker lost while running job");
        let lost = Err(JobError::WorkerLost {
            job_id: self.job_id.clone(),
        });
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(deliver(self.lane, completion, lost));
            }
            Err(_) => {
                tracing::error!(lane = self.lane, job_id = %self.job_id, "no runtime left to report lost job");
            }
        }
    }
}
