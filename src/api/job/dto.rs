use serde::{Deserialize, Serialize};

use crate::db::{FibJob, JobRequestRecord, JobStatus};

/// Relative URL of a job, as rendered in API responses
pub fn job_url(id: i32) -> String {
    format!("{}/", id)
}

/// A Fibonacci job as exposed to API clients
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FibJobResponse {
    pub id: i32,
    pub user: Option<String>,
    pub expected_runtime: i32,
    pub resources_ram_mb: i32,
    pub resources_cpu_cores: i32,
    pub fib_num: i64,
    pub status: JobStatus,
    pub url: String,
}

impl From<&FibJob> for FibJobResponse {
    fn from(job: &FibJob) -> Self {
        FibJobResponse {
            id: job.id(),
            user: job.user().map(str::to_string),
            expected_runtime: job.expected_runtime(),
            resources_ram_mb: job.resources_ram_mb(),
            resources_cpu_cores: job.resources_cpu_cores(),
            fib_num: job.fib_num,
            status: job.request.status,
            url: job_url(job.id()),
        }
    }
}

/// Job status together with whatever its target holds
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct JobResultResponse {
    pub id: i32,
    pub fib_num: i64,
    pub status: JobStatus,
    /// Whether the job's target exists
    pub complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}
