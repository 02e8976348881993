use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::db::job_repository::{validate_new_job, JobRepository};
use crate::db::models::{
    FibJob, GetOrCreate, JobRequest, JobStatus, NewFibJob, DEFAULT_CPU_CORES,
    DEFAULT_EXPECTED_RUNTIME, DEFAULT_RAM_MB,
};
use crate::error::StoreError;
use crate::pipeline::CalcFib;

#[derive(Default)]
struct MemoryState {
    next_id: i32,
    requests: BTreeMap<i32, JobRequest>,
    fib_nums: BTreeMap<i32, i64>,
    by_fib_num: HashMap<i64, i32>,
}

impl MemoryState {
    fn fib_job(&self, id: i32) -> Option<FibJob> {
        let request = self.requests.get(&id)?;
        let fib_num = *self.fib_nums.get(&id)?;
        Some(FibJob {
            request: request.clone(),
            fib_num,
        })
    }
}

/// In-process job repository.
///
/// Every operation holds one lock for its whole duration, so get-or-create is
/// atomic without a unique-constraint retry path.
#[derive(Default)]
pub struct MemoryJobRepository {
    state: Mutex<MemoryState>,
}

impl MemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored job requests.
    pub async fn len(&self) -> usize {
        self.state.lock().await.requests.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl JobRepository for MemoryJobRepository {
    async fn get_or_create_fib(&self, new_job: &NewFibJob) -> Result<GetOrCreate, StoreError> {
        validate_new_job(new_job)?;
        let mut state = self.state.lock().await;

        if let Some(&id) = state.by_fib_num.get(&new_job.fib_num) {
            if let Some(job) = state.fib_job(id) {
                debug!("Found existing job id={} for fib_num={}", id, new_job.fib_num);
                return Ok(GetOrCreate {
                    job,
                    created: false,
                });
            }
        }

        state.next_id += 1;
        let id = state.next_id;
        let now = Utc::now().naive_utc();

        let request = JobRequest {
            id,
            user: new_job.user.clone(),
            kind: CalcFib::KIND.to_string(),
            status: JobStatus::New,
            expected_runtime: DEFAULT_EXPECTED_RUNTIME,
            resources_ram_mb: DEFAULT_RAM_MB,
            resources_cpu_cores: DEFAULT_CPU_CORES,
            created_at: now,
            updated_at: now,
        };

        state.requests.insert(id, request.clone());
        state.fib_nums.insert(id, new_job.fib_num);
        state.by_fib_num.insert(new_job.fib_num, id);
        info!("Created job id={} for fib_num={}", id, new_job.fib_num);

        Ok(GetOrCreate {
            job: FibJob {
                request,
                fib_num: new_job.fib_num,
            },
            created: true,
        })
    }

    async fn find_fib(&self, id: i32) -> Result<Option<FibJob>, StoreError> {
        Ok(self.state.lock().await.fib_job(id))
    }

    async fn find_fib_by_num(&self, fib_num: i64) -> Result<Option<FibJob>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .by_fib_num
            .get(&fib_num)
            .and_then(|&id| state.fib_job(id)))
    }

    async fn acquire_next_job(&self) -> Result<Option<FibJob>, StoreError> {
        let mut state = self.state.lock().await;

        let next_id = state
            .requests
            .values()
            .find(|r| r.status == JobStatus::New)
            .map(|r| r.id);

        let Some(id) = next_id else {
            return Ok(None);
        };

        if let Some(request) = state.requests.get_mut(&id) {
            request.status = JobStatus::Processing;
            request.updated_at = Utc::now().naive_utc();
        }
        debug!("Acquired job id={}", id);
        Ok(state.fib_job(id))
    }

    async fn update_job_status(&self, id: i32, status: JobStatus) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let request = state.requests.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        request.status = status;
        request.updated_at = Utc::now().naive_utc();
        Ok(())
    }

    async fn requeue_processing(&self) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let mut count = 0;
        for request in state.requests.values_mut() {
            if request.status == JobStatus::Processing {
                request.status = JobStatus::New;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn delete_request(&self, id: i32) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        if state.requests.remove(&id).is_none() {
            return Ok(false);
        }
        if let Some(fib_num) = state.fib_nums.remove(&id) {
            state.by_fib_num.remove(&fib_num);
        }
        Ok(true)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
