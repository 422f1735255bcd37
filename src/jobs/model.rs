//! Job records and lifecycle states

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// One persisted transformation job
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Job {
    pub task_id: Uuid,
    pub user_id: i64,
    pub source_path: String,
    pub target_path: String,
    pub result_path: String,
    pub status: String,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_finished_at: Option<DateTime<Utc>>,
}

/// Lifecycle states. Transitions are only ever
/// `pending → processing → {completed, failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// The slice of a job carried through the in-memory queue
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct QueuedJob {
    pub task_id: Uuid,
    pub user_id: i64,
    pub source_path: String,
    pub target_path: String,
    pub result_path: String,
}
