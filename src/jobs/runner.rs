//! Sequential job runner
//!
//! One long-lived consumer task. Jobs are taken from the feed in FIFO
//! order and executed one at a time; a slow or hung transformation stalls
//! everything behind it, and nothing here retries. Outcome delivery goes
//! through the [`Notify`] seam so the pipeline stays independent of the
//! chat platform.

use crate::jobs::model::QueuedJob;
use crate::jobs::queue::JobFeed;
use crate::jobs::store::{JobStore, StoreError};
use crate::jobs::transform::TransformConfig;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome delivery back to the submitting user.
///
/// Implementations swallow and log their own delivery failures; a lost
/// notification must not change a job's terminal state.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notify: Send + Sync {
    /// The job finished and its result artifact is on disk.
    async fn job_succeeded(&self, user_id: i64, result_path: &Path);
    /// The job failed; `error` is the recorded error message.
    async fn job_failed(&self, user_id: i64, error: &str);
}

/// The single consumer of the job queue
pub struct JobRunner {
    store: Arc<dyn JobStore>,
    notifier: Arc<dyn Notify>,
    transform: TransformConfig,
    feed: JobFeed,
}

impl JobRunner {
    #[must_use]
    pub fn new(
        store: Arc<dyn JobStore>,
        notifier: Arc<dyn Notify>,
        transform: TransformConfig,
        feed: JobFeed,
    ) -> Self {
        Self {
            store,
            notifier,
            transform,
            feed,
        }
    }

    /// Consume jobs until every queue handle is dropped.
    ///
    /// # Errors
    ///
    /// Returns the first store failure; the runner has no way to record an
    /// outcome at that point, so it stops instead of losing track of jobs.
    pub async fn run(mut self) -> Result<(), StoreError> {
        while let Some(job) = self.feed.next().await {
            self.process(job).await?;
        }
        info!("Job queue closed, runner exiting");
        Ok(())
    }

    async fn process(&self, job: QueuedJob) -> Result<(), StoreError> {
        info!(task_id = %job.task_id, user_id = job.user_id, "Processing task");
        self.store.mark_processing(job.task_id).await?;

        match self.transform.run(&job).await {
            Ok(_) => {
                self.store.mark_completed(job.task_id).await?;
                info!(task_id = %job.task_id, "Task completed");
                self.notifier
                    .job_succeeded(job.user_id, Path::new(&job.result_path))
                    .await;
            }
            Err(e) => {
                let message = e.to_string();
                warn!(task_id = %job.task_id, error = %message, "Task failed");
                self.store.mark_failed(job.task_id, &message).await?;
                self.notifier.job_failed(job.user_id, &message).await;
            }
        }
        Ok(())
    }
}
