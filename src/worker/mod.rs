pub mod job_worker;

pub use job_worker::{process_job, JobWorker};
