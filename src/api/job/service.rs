use std::sync::Arc;

use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::api::validation::ErrorResponse;
use crate::db::{GetOrCreate, JobRepository, JobStatus, NewFibJob};
use crate::error::{RegistryError, StoreError};
use crate::pipeline::TaskRegistry;
use super::dto::{FibJobResponse, JobResultResponse};
use super::models::SubmitFibJob;

/// Service-level errors
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("job not found: {0}")]
    NotFound(i32),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("task error: {0}")]
    Registry(#[from] RegistryError),

    #[error("target read failed for job {id}: {source}")]
    Target {
        id: i32,
        #[source]
        source: std::io::Error,
    },
}

impl ResponseError for ServiceError {
    fn error_response(&self) -> HttpResponse {
        match self {
            ServiceError::Store(StoreError::InvalidParams(msg)) => {
                warn!("Validation error: {}", msg);
                HttpResponse::BadRequest().json(ErrorResponse {
                    error: "Validation failed".to_string(),
                    fields: serde_json::json!({"message": msg}),
                })
            }
            ServiceError::NotFound(id) | ServiceError::Store(StoreError::NotFound(id)) => {
                warn!("Job not found: {}", id);
                HttpResponse::NotFound().json(ErrorResponse {
                    error: "Not found".to_string(),
                    fields: serde_json::json!({"message": format!("Job with id {} not found", id)}),
                })
            }
            ServiceError::Conflict(msg) => {
                warn!("Conflict: {}", msg);
                HttpResponse::Conflict().json(ErrorResponse {
                    error: "Conflict".to_string(),
                    fields: serde_json::json!({"message": msg}),
                })
            }
            ServiceError::Store(e) => {
                error!("Store error: {}", e);
                HttpResponse::InternalServerError().json(ErrorResponse {
                    error: "Failed to process request".to_string(),
                    fields: serde_json::json!({"message": "Database error occurred"}),
                })
            }
            ServiceError::Registry(e) => {
                error!("Registry error: {}", e);
                HttpResponse::InternalServerError().json(ErrorResponse {
                    error: "Failed to process request".to_string(),
                    fields: serde_json::json!({"message": e.to_string()}),
                })
            }
            ServiceError::Target { id, source } => {
                error!("Failed to read target for job {}: {}", id, source);
                HttpResponse::InternalServerError().json(ErrorResponse {
                    error: "Failed to process request".to_string(),
                    fields: serde_json::json!({"message": "Result could not be read"}),
                })
            }
        }
    }
}

/// Job service containing business logic
pub struct JobService {
    repo: Arc<dyn JobRepository>,
    registry: Arc<TaskRegistry>,
}

impl JobService {
    /// Create a new JobService instance
    pub fn new(repo: Arc<dyn JobRepository>, registry: Arc<TaskRegistry>) -> Self {
        Self { repo, registry }
    }

    /// Look up or create the job for the requested parameters
    ///
    /// # Business Logic
    /// - Returns the existing job untouched when one matches `fib_num`
    /// - Otherwise records a new request with default resources
    /// - Never runs the task; workers pick up `new` jobs separately
    /// - A lost insert race is resolved by looking the winner's row up
    ///
    /// # Returns
    /// - `Ok((FibJobResponse, created))`
    /// - `Err(ServiceError)` - lookup and creation both failed
    pub async fn submit(&self, req: &SubmitFibJob) -> Result<(FibJobResponse, bool), ServiceError> {
        info!("Service: Submitting job with fib_num={}", req.fib_num);

        let outcome = self.get_or_create(&NewFibJob::from(req)).await?;

        if outcome.created {
            info!("Service: Job created with id={}", outcome.job.request.id);
        } else {
            info!("Service: Reusing existing job id={}", outcome.job.request.id);
        }

        Ok((FibJobResponse::from(&outcome.job), outcome.created))
    }

    async fn get_or_create(&self, new_job: &NewFibJob) -> Result<GetOrCreate, ServiceError> {
        match self.repo.get_or_create_fib(new_job).await {
            Ok(outcome) => Ok(outcome),
            Err(StoreError::DuplicateRequest { fib_num }) => {
                warn!("Service: Concurrent insert for fib_num={}, retrying lookup", fib_num);
                let job = self.repo.find_fib_by_num(fib_num).await?.ok_or_else(|| {
                    ServiceError::Conflict(format!(
                        "job for fib_num={} vanished after a concurrent insert",
                        fib_num
                    ))
                })?;
                Ok(GetOrCreate {
                    job,
                    created: false,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, id: i32) -> Result<FibJobResponse, ServiceError> {
        let job = self
            .repo
            .find_fib(id)
            .await?
            .ok_or(ServiceError::NotFound(id))?;
        Ok(FibJobResponse::from(&job))
    }

    /// Report status and, once the target exists, its contents
    pub async fn result(&self, id: i32) -> Result<JobResultResponse, ServiceError> {
        let job = self
            .repo
            .find_fib(id)
            .await?
            .ok_or(ServiceError::NotFound(id))?;

        let target = self.registry.build(&job.request.kind, &job.params())?.output();
        let content = target
            .read()
            .map_err(|source| ServiceError::Target { id, source })?;

        Ok(JobResultResponse {
            id,
            fib_num: job.fib_num,
            status: job.request.status,
            complete: content.is_some(),
            content,
        })
    }

    /// Put a failed job back in the queue
    pub async fn retry(&self, id: i32) -> Result<FibJobResponse, ServiceError> {
        let job = self
            .repo
            .find_fib(id)
            .await?
            .ok_or(ServiceError::NotFound(id))?;

        if job.request.status != JobStatus::Failed {
            return Err(ServiceError::Conflict(format!(
                "job {} is {}; only failed jobs can be retried",
                id, job.request.status
            )));
        }

        self.repo.update_job_status(id, JobStatus::New).await?;
        info!("Service: Job {} requeued", id);

        let job = self
            .repo
            .find_fib(id)
            .await?
            .ok_or(ServiceError::NotFound(id))?;
        Ok(FibJobResponse::from(&job))
    }

    pub async fn ping(&self) -> Result<(), ServiceError> {
        self.repo.ping().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::db::{FibJob, MemoryJobRepository};
    use crate::pipeline::OutputConfig;

    /// Lets a concurrent "winner" insert first, then reports the loser's race.
    struct RacingRepository {
        inner: MemoryJobRepository,
        raced: AtomicBool,
    }

    #[async_trait]
    impl JobRepository for RacingRepository {
        async fn get_or_create_fib(&self, new_job: &NewFibJob) -> Result<GetOrCreate, StoreError> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                self.inner.get_or_create_fib(new_job).await?;
                return Err(StoreError::DuplicateRequest {
                    fib_num: new_job.fib_num,
                });
            }
            self.inner.get_or_create_fib(new_job).await
        }

        async fn find_fib(&self, id: i32) -> Result<Option<FibJob>, StoreError> {
            self.inner.find_fib(id).await
        }

        async fn find_fib_by_num(&self, fib_num: i64) -> Result<Option<FibJob>, StoreError> {
            self.inner.find_fib_by_num(fib_num).await
        }

        async fn acquire_next_job(&self) -> Result<Option<FibJob>, StoreError> {
            self.inner.acquire_next_job().await
        }

        async fn update_job_status(&self, id: i32, status: JobStatus) -> Result<(), StoreError> {
            self.inner.update_job_status(id, status).await
        }

        async fn requeue_processing(&self) -> Result<u64, StoreError> {
            self.inner.requeue_processing().await
        }

        async fn delete_request(&self, id: i32) -> Result<bool, StoreError> {
            self.inner.delete_request(id).await
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn service(repo: Arc<dyn JobRepository>, output: &std::path::Path) -> JobService {
        JobService::new(
            repo,
            Arc::new(TaskRegistry::with_defaults(OutputConfig::new(output))),
        )
    }

    #[tokio::test]
    async fn duplicate_request_falls_back_to_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(RacingRepository {
            inner: MemoryJobRepository::new(),
            raced: AtomicBool::new(false),
        });
        let service = service(repo.clone(), dir.path());

        let (job, created) = service
            .submit(&SubmitFibJob { fib_num: 10, user: None })
            .await
            .unwrap();

        assert!(!created);
        assert_eq!(job.fib_num, 10);
        assert_eq!(repo.inner.len().await, 1);
    }

    #[tokio::test]
    async fn result_reports_missing_target() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(Arc::new(MemoryJobRepository::new()), dir.path());

        let (job, _) = service
            .submit(&SubmitFibJob { fib_num: 6, user: None })
            .await
            .unwrap();
        let result = service.result(job.id).await.unwrap();

        assert!(!result.complete);
        assert_eq!(result.content, None);
        assert_eq!(result.status, JobStatus::New);
    }

    #[tokio::test]
    async fn retry_only_applies_to_failed_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(MemoryJobRepository::new());
        let service = service(repo.clone(), dir.path());

        let (job, _) = service
            .submit(&SubmitFibJob { fib_num: 9, user: None })
            .await
            .unwrap();
        assert!(matches!(
            service.retry(job.id).await,
            Err(ServiceError::Conflict(_))
        ));

        repo.update_job_status(job.id, JobStatus::Failed).await.unwrap();
        let retried = service.retry(job.id).await.unwrap();
        assert_eq!(retried.status, JobStatus::New);
        assert_eq!(retried.id, job.id);
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(Arc::new(MemoryJobRepository::new()), dir.path());

        assert!(matches!(service.get(42).await, Err(ServiceError::NotFound(42))));
        assert!(matches!(service.result(42).await, Err(ServiceError::NotFound(42))));
    }
}
