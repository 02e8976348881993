use async_trait::async_trait;

use crate::db::models::{FibJob, GetOrCreate, JobStatus, NewFibJob};
use crate::error::StoreError;

/// Persistence contract for job requests and their Fibonacci job rows.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Return the job whose `fib_num` equals `new_job.fib_num`, or create a
    /// request with default resources plus its job row.
    ///
    /// Never triggers execution. Two concurrent calls with the same `fib_num`
    /// never produce two rows; the loser of a race gets
    /// [`StoreError::DuplicateRequest`] and should look the job up again.
    async fn get_or_create_fib(&self, new_job: &NewFibJob) -> Result<GetOrCreate, StoreError>;

    async fn find_fib(&self, id: i32) -> Result<Option<FibJob>, StoreError>;

    async fn find_fib_by_num(&self, fib_num: i64) -> Result<Option<FibJob>, StoreError>;

    /// Claim the oldest `new` job and mark it `processing`.
    async fn acquire_next_job(&self) -> Result<Option<FibJob>, StoreError>;

    async fn update_job_status(&self, id: i32, status: JobStatus) -> Result<(), StoreError>;

    /// Put jobs left `processing` by a previous run back to `new`.
    async fn requeue_processing(&self) -> Result<u64, StoreError>;

    /// Delete a job request; its job row goes with it.
    async fn delete_request(&self, id: i32) -> Result<bool, StoreError>;

    /// Cheap connectivity check for health endpoints.
    async fn ping(&self) -> Result<(), StoreError>;

    async fn close(&self) {}
}

pub(crate) fn validate_new_job(new_job: &NewFibJob) -> Result<(), StoreError> {
    if new_job.fib_num < 0 {
        return Err(StoreError::InvalidParams(format!(
            "fib_num must be non-negative, got {}",
            new_job.fib_num
        )));
    }
    if let Some(user) = &new_job.user {
        if user.chars().count() > 50 {
            return Err(StoreError::InvalidParams(
                "user must be at most 50 characters".to_string(),
            ));
        }
    }
    Ok(())
}
