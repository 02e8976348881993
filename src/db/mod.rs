pub mod connection;
pub mod job_repository;
pub mod memory;
pub mod migrations;
pub mod models;
pub mod postgres;

pub use job_repository::JobRepository;
pub use memory::MemoryJobRepository;
pub use models::{FibJob, GetOrCreate, JobRequest, JobRequestRecord, JobStatus, NewFibJob};
pub use postgres::PgJobRepository;
