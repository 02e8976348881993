use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::NewFibJob;

/// Request body for submitting a Fibonacci job
#[derive(Deserialize, Serialize, Debug, Validate)]
pub struct SubmitFibJob {
    #[validate(range(min = 0, message = "fib_num must be a non-negative integer"))]
    pub fib_num: i64,

    #[validate(length(
        min = 1,
        max = 50,
        message = "User must be between 1 and 50 characters"
    ))]
    pub user: Option<String>,
}

impl From<&SubmitFibJob> for NewFibJob {
    fn from(req: &SubmitFibJob) -> Self {
        NewFibJob {
            fib_num: req.fib_num,
            user: req.user.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_fib_num_fails_validation() {
        let req = SubmitFibJob { fib_num: -1, user: None };
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("fib_num"));
    }

    #[test]
    fn long_user_fails_validation() {
        let req = SubmitFibJob {
            fib_num: 1,
            user: Some("x".repeat(51)),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn anonymous_request_is_valid() {
        let req = SubmitFibJob { fib_num: 0, user: None };
        assert!(req.validate().is_ok());
        assert_eq!(NewFibJob::from(&req), NewFibJob::new(0));
    }
}
