//! End-to-end pipeline tests: queue + runner over an in-memory store fake
//! and a recording notifier, with `/bin/sh` scripts standing in for the
//! transformation runner.

use async_trait::async_trait;
use chrono::Utc;
use faceswap_bot::jobs::{
    job_queue, Job, JobQueue, JobRunner, JobStatus, JobStore, Notify, QueuedJob, StoreError,
    TransformConfig,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

struct StoredJob {
    row: Job,
    history: Vec<String>,
}

/// In-memory [`JobStore`] recording every status transition per job
#[derive(Default)]
struct InMemoryStore {
    users: Mutex<HashMap<i64, i64>>,
    jobs: Mutex<Vec<StoredJob>>,
}

impl InMemoryStore {
    fn history_of(&self, task_id: Uuid) -> Vec<String> {
        self.jobs
            .lock()
            .expect("jobs lock")
            .iter()
            .find(|j| j.row.task_id == task_id)
            .map(|j| j.history.clone())
            .unwrap_or_default()
    }

    fn mark(&self, task_id: Uuid, status: JobStatus, error_message: Option<&str>) {
        let mut jobs = self.jobs.lock().expect("jobs lock");
        let job = jobs
            .iter_mut()
            .find(|j| j.row.task_id == task_id)
            .expect("unknown task id");
        job.row.status = status.as_str().to_string();
        match status {
            JobStatus::Processing => job.row.processing_started_at = Some(Utc::now()),
            JobStatus::Completed | JobStatus::Failed => {
                job.row.processing_finished_at = Some(Utc::now());
            }
            JobStatus::Pending => {}
        }
        if let Some(message) = error_message {
            job.row.error_message = Some(message.to_string());
        }
        job.history.push(status.as_str().to_string());
    }
}

#[async_trait]
impl JobStore for InMemoryStore {
    async fn register_user_if_absent(
        &self,
        user_id: i64,
        _handle: Option<String>,
    ) -> Result<(), StoreError> {
        self.users
            .lock()
            .expect("users lock")
            .entry(user_id)
            .or_insert(0);
        Ok(())
    }

    async fn usage_count(&self, user_id: i64) -> Result<i64, StoreError> {
        Ok(*self
            .users
            .lock()
            .expect("users lock")
            .get(&user_id)
            .unwrap_or(&0))
    }

    async fn increment_usage(&self, user_id: i64) -> Result<(), StoreError> {
        *self
            .users
            .lock()
            .expect("users lock")
            .entry(user_id)
            .or_insert(0) += 1;
        Ok(())
    }

    async fn create_job(
        &self,
        user_id: i64,
        source_path: &str,
        target_path: &str,
        result_path: &str,
    ) -> Result<Uuid, StoreError> {
        let task_id = Uuid::new_v4();
        self.jobs.lock().expect("jobs lock").push(StoredJob {
            row: Job {
                task_id,
                user_id,
                source_path: source_path.to_string(),
                target_path: target_path.to_string(),
                result_path: result_path.to_string(),
                status: JobStatus::Pending.as_str().to_string(),
                error_message: None,
                created_at: Utc::now(),
                processing_started_at: None,
                processing_finished_at: None,
            },
            history: vec![JobStatus::Pending.as_str().to_string()],
        });
        Ok(task_id)
    }

    async fn mark_processing(&self, task_id: Uuid) -> Result<(), StoreError> {
        self.mark(task_id, JobStatus::Processing, None);
        Ok(())
    }

    async fn mark_completed(&self, task_id: Uuid) -> Result<(), StoreError> {
        self.mark(task_id, JobStatus::Completed, None);
        Ok(())
    }

    async fn mark_failed(&self, task_id: Uuid, error_message: &str) -> Result<(), StoreError> {
        self.mark(task_id, JobStatus::Failed, Some(error_message));
        Ok(())
    }

    async fn pending_jobs(&self) -> Result<Vec<QueuedJob>, StoreError> {
        Ok(self
            .jobs
            .lock()
            .expect("jobs lock")
            .iter()
            .filter(|j| j.row.status == JobStatus::Pending.as_str())
            .map(|j| QueuedJob {
                task_id: j.row.task_id,
                user_id: j.row.user_id,
                source_path: j.row.source_path.clone(),
                target_path: j.row.target_path.clone(),
                result_path: j.row.result_path.clone(),
            })
            .collect())
    }

    async fn job(&self, task_id: Uuid) -> Result<Option<Job>, StoreError> {
        Ok(self
            .jobs
            .lock()
            .expect("jobs lock")
            .iter()
            .find(|j| j.row.task_id == task_id)
            .map(|j| j.row.clone()))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Delivery {
    Succeeded { user_id: i64, result_path: PathBuf },
    Failed { user_id: i64, error: String },
}

#[derive(Default)]
struct RecordingNotifier {
    deliveries: Mutex<Vec<Delivery>>,
}

#[async_trait]
impl Notify for RecordingNotifier {
    async fn job_succeeded(&self, user_id: i64, result_path: &Path) {
        self.deliveries
            .lock()
            .expect("deliveries lock")
            .push(Delivery::Succeeded {
                user_id,
                result_path: result_path.to_path_buf(),
            });
    }

    async fn job_failed(&self, user_id: i64, error: &str) {
        self.deliveries
            .lock()
            .expect("deliveries lock")
            .push(Delivery::Failed {
                user_id,
                error: error.to_string(),
            });
    }
}

fn write_script(body: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("pipeline-{}.sh", Uuid::new_v4()));
    std::fs::write(&path, body).expect("write test script");
    path
}

fn transform_for(script: &Path) -> TransformConfig {
    TransformConfig {
        runtime: "/bin/sh".to_string(),
        script: script.to_string_lossy().into_owned(),
        execution_provider: "cuda".to_string(),
        frame_processor: "face_swapper".to_string(),
    }
}

/// Replays the controller's submission tail: create, count, enqueue.
async fn submit_job(store: &InMemoryStore, queue: &JobQueue, user_id: i64, tag: &str) -> Uuid {
    let usage = store.usage_count(user_id).await.expect("usage_count");
    let result_path = format!("/tmp/{user_id}/result_{}.jpg", usage + 1);
    let task_id = store
        .create_job(
            user_id,
            &format!("/tmp/{user_id}/{tag}-src.jpg"),
            &format!("/tmp/{user_id}/{tag}-tgt.jpg"),
            &result_path,
        )
        .await
        .expect("create_job");
    store.increment_usage(user_id).await.expect("increment_usage");
    queue.enqueue(QueuedJob {
        task_id,
        user_id,
        source_path: format!("/tmp/{user_id}/{tag}-src.jpg"),
        target_path: format!("/tmp/{user_id}/{tag}-tgt.jpg"),
        result_path,
    });
    task_id
}

#[tokio::test]
async fn submission_creates_pending_job_and_counts_usage() {
    let store = Arc::new(InMemoryStore::default());
    let (queue, _feed) = job_queue();
    store
        .register_user_if_absent(7, Some("alice".to_string()))
        .await
        .expect("register");

    assert!(queue.is_empty());
    let task_id = submit_job(&store, &queue, 7, "a").await;

    assert_eq!(queue.len(), 1);
    assert_eq!(store.usage_count(7).await.expect("usage"), 1);
    let job = store.job(task_id).await.expect("job").expect("created");
    assert_eq!(job.status, "pending");
    assert!(job.processing_started_at.is_none());
}

#[tokio::test]
async fn successful_job_walks_pending_processing_completed() {
    let store = Arc::new(InMemoryStore::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let script = write_script("echo swapped\n");
    let (queue, feed) = job_queue();

    store
        .register_user_if_absent(7, None)
        .await
        .expect("register");
    let task_id = submit_job(&store, &queue, 7, "a").await;
    drop(queue);

    let runner = JobRunner::new(
        store.clone(),
        notifier.clone(),
        transform_for(&script),
        feed,
    );
    runner.run().await.expect("runner drains");

    assert_eq!(
        store.history_of(task_id),
        vec!["pending", "processing", "completed"]
    );
    let job = store.job(task_id).await.expect("job").expect("exists");
    assert!(job.processing_started_at.is_some());
    assert!(job.processing_finished_at.is_some());
    assert_eq!(
        *notifier.deliveries.lock().expect("deliveries"),
        vec![Delivery::Succeeded {
            user_id: 7,
            result_path: PathBuf::from("/tmp/7/result_1.jpg"),
        }]
    );
    let _ = std::fs::remove_file(script);
}

#[tokio::test]
async fn no_face_diagnostic_fails_the_job_despite_clean_exit() {
    let store = Arc::new(InMemoryStore::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let script = write_script("echo 'No face in source path detected.'\nexit 0\n");
    let (queue, feed) = job_queue();

    store
        .register_user_if_absent(8, None)
        .await
        .expect("register");
    let task_id = submit_job(&store, &queue, 8, "b").await;
    drop(queue);

    let runner = JobRunner::new(
        store.clone(),
        notifier.clone(),
        transform_for(&script),
        feed,
    );
    runner.run().await.expect("runner drains");

    assert_eq!(
        store.history_of(task_id),
        vec!["pending", "processing", "failed"]
    );
    let job = store.job(task_id).await.expect("job").expect("exists");
    assert_eq!(
        job.error_message.as_deref(),
        Some("No face in the 1st photo detected.")
    );
    assert_eq!(
        *notifier.deliveries.lock().expect("deliveries"),
        vec![Delivery::Failed {
            user_id: 8,
            error: "No face in the 1st photo detected.".to_string(),
        }]
    );
    let _ = std::fs::remove_file(script);
}

#[tokio::test]
async fn runner_failure_records_stderr_text() {
    let store = Arc::new(InMemoryStore::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let script = write_script("echo 'cuda device not found' >&2\nexit 2\n");
    let (queue, feed) = job_queue();

    store
        .register_user_if_absent(9, None)
        .await
        .expect("register");
    let task_id = submit_job(&store, &queue, 9, "c").await;
    drop(queue);

    let runner = JobRunner::new(
        store.clone(),
        notifier.clone(),
        transform_for(&script),
        feed,
    );
    runner.run().await.expect("runner drains");

    let job = store.job(task_id).await.expect("job").expect("exists");
    assert_eq!(job.status, "failed");
    let message = job.error_message.expect("error recorded");
    assert!(message.contains("cuda device not found"), "{message}");
    let _ = std::fs::remove_file(script);
}

#[tokio::test]
async fn pending_jobs_are_recovered_in_insertion_order() {
    let store = Arc::new(InMemoryStore::default());
    store
        .register_user_if_absent(10, None)
        .await
        .expect("register");

    // Jobs left `pending` by a previous process
    let (stale_queue, _stale_feed) = job_queue();
    let first = submit_job(&store, &stale_queue, 10, "one").await;
    let second = submit_job(&store, &stale_queue, 10, "two").await;
    let third = submit_job(&store, &stale_queue, 10, "three").await;
    drop(stale_queue);

    // Fresh process: repopulate a new queue from the store
    let (queue, mut feed) = job_queue();
    for job in store.pending_jobs().await.expect("pending_jobs") {
        queue.enqueue(job);
    }
    assert_eq!(queue.len(), 3);
    drop(queue);

    let mut recovered = Vec::new();
    while let Some(job) = feed.next().await {
        recovered.push(job.task_id);
    }
    assert_eq!(recovered, vec![first, second, third]);
}

#[tokio::test]
async fn usage_count_equals_number_of_submissions() {
    let store = Arc::new(InMemoryStore::default());
    let (queue, _feed) = job_queue();
    store
        .register_user_if_absent(11, None)
        .await
        .expect("register");

    for tag in ["a", "b", "c"] {
        submit_job(&store, &queue, 11, tag).await;
    }
    assert_eq!(store.usage_count(11).await.expect("usage"), 3);
    assert_eq!(queue.len(), 3);
}
