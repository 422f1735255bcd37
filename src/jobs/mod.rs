//! The job pipeline: durable store, in-memory FIFO queue, sequential
//! runner, and the external transformation invocation.

/// Job records and lifecycle states
pub mod model;
/// Process-local FIFO between handlers and the runner
pub mod queue;
/// The single sequential consumer
pub mod runner;
/// `users`/`tasks` persistence
pub mod store;
/// External transformation command
pub mod transform;

pub use model::{Job, JobStatus, QueuedJob};
pub use queue::{job_queue, JobFeed, JobQueue};
pub use runner::{JobRunner, Notify};
pub use store::{JobStore, PgJobStore, StoreError};
pub use transform::{TransformConfig, TransformError};
