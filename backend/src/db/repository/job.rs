//! Job record persistence for background site validation runs.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use super::error::RepositoryResult;
use crate::models::{JobId, JobRecord};

/// Repository trait for job records.
///
/// The store enforces the job state machine
/// (`pending -> running -> succeeded | failed`, or `pending -> failed`):
/// every mutation of a job in a terminal state is rejected with
/// `RepositoryError::InvalidState`, as is a progress update that would move
/// `processed_content` backwards.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Create a job in `pending` state.
    async fn create_job(&self, name: &str) -> RepositoryResult<JobRecord>;

    async fn get_job(&self, id: JobId) -> RepositoryResult<Option<JobRecord>>;

    async fn get_job_by_uuid(&self, uuid: Uuid) -> RepositoryResult<Option<JobRecord>>;

    /// Record the content total and move `pending` to `running` with zero progress.
    async fn start_job(&self, id: JobId, total: i64, message: &str)
        -> RepositoryResult<JobRecord>;

    /// Advance `processed_content` of a running job.
    async fn record_progress(
        &self,
        id: JobId,
        processed: i64,
        message: &str,
    ) -> RepositoryResult<JobRecord>;

    /// Move a running job to `succeeded` with status code 200.
    async fn complete_job(&self, id: JobId, payload: Value) -> RepositoryResult<JobRecord>;

    /// Move a pending or running job to `failed`.
    async fn fail_job(
        &self,
        id: JobId,
        status_code: i32,
        payload: Value,
    ) -> RepositoryResult<JobRecord>;
}
