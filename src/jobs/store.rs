//! Durable job store
//!
//! One `users` table and one `tasks` table behind the [`JobStore`] trait.
//! Every operation is a single parameterized statement; timestamps are
//! written server-side with `now()`. The production implementation runs on
//! an sqlx PostgreSQL pool handed in at construction.

use crate::jobs::model::{Job, JobStatus, QueuedJob};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Errors surfaced by store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying database failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence operations used by the conversation handlers and the runner
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert the user if not yet known. Idempotent.
    async fn register_user_if_absent(
        &self,
        user_id: i64,
        handle: Option<String>,
    ) -> Result<(), StoreError>;

    /// Number of jobs this user has ever submitted
    async fn usage_count(&self, user_id: i64) -> Result<i64, StoreError>;

    /// Bump the submission counter. Called once per created job.
    async fn increment_usage(&self, user_id: i64) -> Result<(), StoreError>;

    /// Create a `pending` job and return its store-assigned identifier.
    async fn create_job(
        &self,
        user_id: i64,
        source_path: &str,
        target_path: &str,
        result_path: &str,
    ) -> Result<Uuid, StoreError>;

    /// `pending → processing`; stamps `processing_started_at`.
    async fn mark_processing(&self, task_id: Uuid) -> Result<(), StoreError>;

    /// `processing → completed`; stamps `processing_finished_at`.
    async fn mark_completed(&self, task_id: Uuid) -> Result<(), StoreError>;

    /// `processing → failed`; stamps `processing_finished_at` and records
    /// the error text shown to the user.
    async fn mark_failed(&self, task_id: Uuid, error_message: &str) -> Result<(), StoreError>;

    /// All `pending` jobs in insertion order. Used once, by the startup
    /// recovery scan.
    async fn pending_jobs(&self) -> Result<Vec<QueuedJob>, StoreError>;

    /// Fetch one job row. Introspection only; the pipeline itself never
    /// reads jobs back.
    async fn job(&self, task_id: Uuid) -> Result<Option<Job>, StoreError>;
}

/// PostgreSQL-backed [`JobStore`]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to the database with a small pool.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the connection cannot be established.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Create the `users` and `tasks` tables if they do not exist yet.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if either DDL statement fails.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                user_id     BIGINT PRIMARY KEY,
                user_handle TEXT,
                usage_count BIGINT NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                task_id                UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                seq                    BIGSERIAL,
                user_id                BIGINT NOT NULL REFERENCES users (user_id),
                source_path            TEXT NOT NULL,
                target_path            TEXT NOT NULL,
                result_path            TEXT NOT NULL,
                status                 TEXT NOT NULL DEFAULT 'pending',
                error_message          TEXT,
                created_at             TIMESTAMPTZ NOT NULL DEFAULT now(),
                processing_started_at  TIMESTAMPTZ,
                processing_finished_at TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Database schema ensured");
        Ok(())
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn register_user_if_absent(
        &self,
        user_id: i64,
        handle: Option<String>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (user_id, user_handle) VALUES ($1, $2) \
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(handle)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn usage_count(&self, user_id: i64) -> Result<i64, StoreError> {
        let count: Option<i64> =
            sqlx::query_scalar("SELECT usage_count FROM users WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(count.unwrap_or(0))
    }

    async fn increment_usage(&self, user_id: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET usage_count = usage_count + 1 WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_job(
        &self,
        user_id: i64,
        source_path: &str,
        target_path: &str,
        result_path: &str,
    ) -> Result<Uuid, StoreError> {
        let task_id: Uuid = sqlx::query_scalar(
            "INSERT INTO tasks (user_id, source_path, target_path, result_path) \
             VALUES ($1, $2, $3, $4) RETURNING task_id",
        )
        .bind(user_id)
        .bind(source_path)
        .bind(target_path)
        .bind(result_path)
        .fetch_one(&self.pool)
        .await?;
        Ok(task_id)
    }

    async fn mark_processing(&self, task_id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE tasks SET status = $1, processing_started_at = now() WHERE task_id = $2",
        )
        .bind(JobStatus::Processing.as_str())
        .bind(task_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_completed(&self, task_id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE tasks SET status = $1, processing_finished_at = now() WHERE task_id = $2",
        )
        .bind(JobStatus::Completed.as_str())
        .bind(task_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_failed(&self, task_id: Uuid, error_message: &str) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE tasks SET status = $1, error_message = $2, \
             processing_finished_at = now() WHERE task_id = $3",
        )
        .bind(JobStatus::Failed.as_str())
        .bind(error_message)
        .bind(task_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn pending_jobs(&self) -> Result<Vec<QueuedJob>, StoreError> {
        let jobs = sqlx::query_as::<_, QueuedJob>(
            "SELECT task_id, user_id, source_path, target_path, result_path \
             FROM tasks WHERE status = $1 ORDER BY seq",
        )
        .bind(JobStatus::Pending.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }

    async fn job(&self, task_id: Uuid) -> Result<Option<Job>, StoreError> {
        let job = sqlx::query_as::<_, Job>(
            "SELECT task_id, user_id, source_path, target_path, result_path, status, \
             error_message, created_at, processing_started_at, processing_finished_at \
             FROM tasks WHERE task_id = $1",
        )
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }
}
