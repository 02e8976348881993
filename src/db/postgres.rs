use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use tracing::{debug, info, warn};

use crate::db::job_repository::{validate_new_job, JobRepository};
use crate::db::models::{FibJob, GetOrCreate, JobRequest, JobStatus, NewFibJob};
use crate::error::StoreError;
use crate::pipeline::CalcFib;

const FIB_JOB_COLUMNS: &str = r#"
    r.id, r.user_name, r.kind, r.status, r.expected_runtime,
    r.resources_ram_mb, r.resources_cpu_cores, r.created_at, r.updated_at,
    f.fib_num
"#;

/// PostgreSQL-backed job repository
#[derive(Clone)]
pub struct PgJobRepository {
    pool: Pool<Postgres>,
}

impl PgJobRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn get_or_create_fib(&self, new_job: &NewFibJob) -> Result<GetOrCreate, StoreError> {
        validate_new_job(new_job)?;
        debug!("get_or_create: fib_num={}", new_job.fib_num);

        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, FibJob>(&format!(
            "SELECT {} FROM job_requests r JOIN fib_jobs f ON f.request_id = r.id WHERE f.fib_num = $1",
            FIB_JOB_COLUMNS
        ))
        .bind(new_job.fib_num)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(job) = existing {
            tx.commit().await?;
            debug!("Found existing job id={} for fib_num={}", job.request.id, job.fib_num);
            return Ok(GetOrCreate {
                job,
                created: false,
            });
        }

        let request = sqlx::query_as::<_, JobRequest>(
            r#"
            INSERT INTO job_requests (user_name, kind)
            VALUES ($1, $2)
            RETURNING id, user_name, kind, status, expected_runtime,
                      resources_ram_mb, resources_cpu_cores, created_at, updated_at
            "#,
        )
        .bind(&new_job.user)
        .bind(CalcFib::KIND)
        .fetch_one(&mut *tx)
        .await?;

        // The unique constraint on fib_num decides races between concurrent inserts.
        let inserted = sqlx::query("INSERT INTO fib_jobs (request_id, fib_num) VALUES ($1, $2)")
            .bind(request.id)
            .bind(new_job.fib_num)
            .execute(&mut *tx)
            .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                tx.rollback().await?;
                warn!("Lost insert race for fib_num={}", new_job.fib_num);
                return Err(StoreError::DuplicateRequest {
                    fib_num: new_job.fib_num,
                });
            }
            Err(e) => return Err(e.into()),
        }

        tx.commit().await?;
        info!("Created job id={} for fib_num={}", request.id, new_job.fib_num);

        Ok(GetOrCreate {
            job: FibJob {
                request,
                fib_num: new_job.fib_num,
            },
            created: true,
        })
    }

    async fn find_fib(&self, id: i32) -> Result<Option<FibJob>, StoreError> {
        let job = sqlx::query_as::<_, FibJob>(&format!(
            "SELECT {} FROM job_requests r JOIN fib_jobs f ON f.request_id = r.id WHERE r.id = $1",
            FIB_JOB_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }

    async fn find_fib_by_num(&self, fib_num: i64) -> Result<Option<FibJob>, StoreError> {
        let job = sqlx::query_as::<_, FibJob>(&format!(
            "SELECT {} FROM job_requests r JOIN fib_jobs f ON f.request_id = r.id WHERE f.fib_num = $1",
            FIB_JOB_COLUMNS
        ))
        .bind(fib_num)
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }

    async fn acquire_next_job(&self) -> Result<Option<FibJob>, StoreError> {
        // SKIP LOCKED lets several workers poll without claiming the same row.
        let job = sqlx::query_as::<_, FibJob>(&format!(
            r#"
            WITH next AS (
                SELECT id FROM job_requests
                WHERE status = 'new'
                ORDER BY id
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            UPDATE job_requests r
            SET status = 'processing', updated_at = NOW()
            FROM next, fib_jobs f
            WHERE r.id = next.id AND f.request_id = r.id
            RETURNING {}
            "#,
            FIB_JOB_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await?;

        if let Some(job) = &job {
            debug!("Acquired job id={}", job.request.id);
        }
        Ok(job)
    }

    async fn update_job_status(&self, id: i32, status: JobStatus) -> Result<(), StoreError> {
        debug!("Updating job {} to status={}", id, status);

        let result = sqlx::query(
            "UPDATE job_requests SET status = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(status.as_str())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn requeue_processing(&self) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE job_requests SET status = 'new', updated_at = NOW() WHERE status = 'processing'",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_request(&self, id: i32) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM job_requests WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
