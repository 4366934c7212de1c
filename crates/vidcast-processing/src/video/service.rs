//! Transcode service abstraction.
//!
//! A service accepts a job of ordered tasks and drives it through
//! `Queued -> Scheduled -> Processing -> {Finished, Error, Canceled}`. State
//! changes are published on a watch channel per job; the job record returned
//! by `job` is the source of truth.

use async_trait::async_trait;
use tokio::sync::watch;
use uuid::Uuid;
use vidcast_core::models::{EncodeJob, EncodeJobRequest, JobOutput, JobState, MediaProcessor};
use vidcast_core::AppError;
use vidcast_storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    #[error("Unknown processor: {0}")]
    UnknownProcessor(String),

    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    #[error("Invalid task graph: {0}")]
    InvalidTask(String),

    #[error("Encoder failed: {0}")]
    EncoderFailed(String),

    #[error("Job {0} has not finished")]
    NotFinished(Uuid),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TranscodeError> for AppError {
    fn from(err: TranscodeError) -> Self {
        match err {
            TranscodeError::UnknownProcessor(name) => AppError::UnknownProcessor(name),
            TranscodeError::JobNotFound(id) => {
                AppError::Transcode(format!("Job not found: {}", id))
            }
            other => AppError::Transcode(other.to_string()),
        }
    }
}

#[async_trait]
pub trait TranscodeService: Send + Sync {
    async fn list_processors(&self) -> Result<Vec<MediaProcessor>, TranscodeError>;

    /// Validate and enqueue a job. The returned record is in `Queued`.
    async fn submit_job(&self, request: EncodeJobRequest) -> Result<EncodeJob, TranscodeError>;

    async fn job(&self, job_id: Uuid) -> Result<EncodeJob, TranscodeError>;

    /// Receiver of state changes for a job, starting at its current state.
    async fn subscribe(&self, job_id: Uuid) -> Result<watch::Receiver<JobState>, TranscodeError>;

    /// Output assets of a finished job, one per task, in task order.
    /// Outputs are handed out once; the job is unknown afterward.
    async fn job_outputs(&self, job_id: Uuid) -> Result<Vec<JobOutput>, TranscodeError>;

    /// Request cancellation. Terminal jobs are left untouched.
    async fn cancel_job(&self, job_id: Uuid) -> Result<(), TranscodeError>;
}
