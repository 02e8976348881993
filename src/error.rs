use std::io;

use thiserror::Error;

/// Task parameter is outside the range the computation supports.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ComputationError {
    #[error("fibonacci index must be non-negative, got {0}")]
    NegativeIndex(i64),

    #[error("fibonacci index {index} exceeds the supported maximum of {max}")]
    Overflow { index: i64, max: i64 },
}

/// Failure of `Task::run`. Neither variant leaves a committed target behind.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("computation error: {0}")]
    Computation(#[from] ComputationError),

    #[error("I/O error on target {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },
}

impl TaskError {
    pub fn io(key: impl Into<String>, source: io::Error) -> Self {
        TaskError::Io {
            key: key.into(),
            source,
        }
    }

    /// I/O failures may succeed on a later attempt; bad parameters never will.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TaskError::Io { .. })
    }
}

/// Job store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// A concurrent `get_or_create` won the race on the same parameters.
    /// The row now exists, so the caller should repeat the lookup.
    #[error("duplicate job request for fib_num={fib_num}")]
    DuplicateRequest { fib_num: i64 },

    #[error("job request not found: {0}")]
    NotFound(i32),

    #[error("invalid job parameters: {0}")]
    InvalidParams(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no task registered for job kind '{0}'")]
    UnknownKind(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in .env file or environment")]
    Missing(&'static str),

    #[error("invalid value for {name}: '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_error_wraps_computation_error() {
        let err: TaskError = ComputationError::NegativeIndex(-3).into();
        assert_eq!(
            err.to_string(),
            "computation error: fibonacci index must be non-negative, got -3"
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn io_errors_are_retryable() {
        let err = TaskError::io(
            "fib_7",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.is_retryable());
        assert!(err.to_string().contains("fib_7"));
    }

    #[test]
    fn duplicate_request_names_parameter() {
        let err = StoreError::DuplicateRequest { fib_num: 10 };
        assert_eq!(err.to_string(), "duplicate job request for fib_num=10");
    }
}
