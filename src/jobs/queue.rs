//! In-memory job queue
//!
//! A process-local unbounded FIFO between the conversation handlers and the
//! single runner task. `enqueue` never blocks; `JobFeed::next` suspends
//! until an item arrives. Durability comes from the job store, not from the
//! queue: pending rows are reloaded into a fresh queue at startup.

use crate::jobs::model::QueuedJob;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

/// Producer half, cloned into every conversation handler
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<QueuedJob>,
    depth: Arc<AtomicUsize>,
}

/// Consumer half, owned by the single job runner
pub struct JobFeed {
    rx: mpsc::UnboundedReceiver<QueuedJob>,
    depth: Arc<AtomicUsize>,
}

/// Create a connected queue/feed pair.
#[must_use]
pub fn job_queue() -> (JobQueue, JobFeed) {
    let (tx, rx) = mpsc::unbounded_channel();
    let depth = Arc::new(AtomicUsize::new(0));
    (
        JobQueue {
            tx,
            depth: depth.clone(),
        },
        JobFeed { rx, depth },
    )
}

impl JobQueue {
    /// Append a job to the tail of the queue. Never blocks.
    pub fn enqueue(&self, job: QueuedJob) {
        self.depth.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(job).is_err() {
            // Runner gone; the job stays `pending` in the store and is
            // picked up by the recovery scan on next startup.
            self.depth.fetch_sub(1, Ordering::SeqCst);
            warn!("Job queue consumer is gone, dropping enqueue");
        }
    }

    /// Number of jobs currently waiting in the queue
    #[must_use]
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl JobFeed {
    /// Wait for the next job. Returns `None` once every producer handle has
    /// been dropped and the queue has drained.
    pub async fn next(&mut self) -> Option<QueuedJob> {
        let job = self.rx.recv().await;
        if job.is_some() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
        }
        job
    }
}
