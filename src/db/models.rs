use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;

use crate::pipeline::JobParams;

pub const DEFAULT_EXPECTED_RUNTIME: i32 = 0;
pub const DEFAULT_CPU_CORES: i32 = 1;
pub const DEFAULT_RAM_MB: i32 = 2000;

/// Job status enum representing the state of a job
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    New,
    Processing,
    Success,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::New => "new",
            JobStatus::Processing => "processing",
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown job status '{0}'")]
pub struct UnknownStatus(String);

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(JobStatus::New),
            "processing" => Ok(JobStatus::Processing),
            "success" => Ok(JobStatus::Success),
            "failed" => Ok(JobStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl TryFrom<String> for JobStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Read access shared by every job request record, whatever its domain.
pub trait JobRequestRecord {
    fn id(&self) -> i32;
    fn user(&self) -> Option<&str>;
    fn expected_runtime(&self) -> i32;
    fn resources_cpu_cores(&self) -> i32;
    fn resources_ram_mb(&self) -> i32;
}

/// Database representation of a job request.
///
/// `user` and the resource fields are written once at creation and never
/// updated; only `status` and `updated_at` change afterwards.
#[derive(Debug, Clone, FromRow, Serialize, PartialEq, Eq)]
pub struct JobRequest {
    pub id: i32,
    #[sqlx(rename = "user_name")]
    pub user: Option<String>,
    pub kind: String,
    #[sqlx(try_from = "String")]
    pub status: JobStatus,
    pub expected_runtime: i32,
    pub resources_ram_mb: i32,
    pub resources_cpu_cores: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl JobRequestRecord for JobRequest {
    fn id(&self) -> i32 {
        self.id
    }

    fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    fn expected_runtime(&self) -> i32 {
        self.expected_runtime
    }

    fn resources_cpu_cores(&self) -> i32 {
        self.resources_cpu_cores
    }

    fn resources_ram_mb(&self) -> i32 {
        self.resources_ram_mb
    }
}

/// A Fibonacci job: one job request plus the index to compute.
/// Shares the request's id; deleting the request deletes this row.
#[derive(Debug, Clone, FromRow, Serialize, PartialEq, Eq)]
pub struct FibJob {
    #[sqlx(flatten)]
    pub request: JobRequest,
    pub fib_num: i64,
}

impl FibJob {
    pub fn params(&self) -> JobParams {
        JobParams::Fib {
            fib_num: self.fib_num,
        }
    }
}

impl JobRequestRecord for FibJob {
    fn id(&self) -> i32 {
        self.request.id
    }

    fn user(&self) -> Option<&str> {
        self.request.user()
    }

    fn expected_runtime(&self) -> i32 {
        self.request.expected_runtime
    }

    fn resources_cpu_cores(&self) -> i32 {
        self.request.resources_cpu_cores
    }

    fn resources_ram_mb(&self) -> i32 {
        self.request.resources_ram_mb
    }
}

/// Parameters for looking up or creating a Fibonacci job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFibJob {
    pub fib_num: i64,
    pub user: Option<String>,
}

impl NewFibJob {
    pub fn new(fib_num: i64) -> Self {
        Self { fib_num, user: None }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }
}

/// Result of a get-or-create lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetOrCreate {
    pub job: FibJob,
    pub created: bool,
}
