pub mod dto;
pub mod handlers;
pub mod models;
pub mod service;

// Re-export commonly used types
pub use dto::{FibJobResponse, JobResultResponse};
pub use models::SubmitFibJob;
pub use service::{JobService, ServiceError};
