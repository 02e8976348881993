use tracing::{debug, info};

use crate::error::TaskError;
use super::target::Target;

/// A parameterized unit of work bound to one [`Target`].
///
/// Instances are built per execution attempt and hold no persisted identity;
/// everything durable goes through the target or the job store.
pub trait Task: Send + Sync {
    /// Job kind this task computes, e.g. `calc_fib`.
    fn family(&self) -> &'static str;

    /// Where the result lives. Must be a pure function of the parameters.
    fn output(&self) -> Box<dyn Target>;

    /// Compute and write the result through `output().open_for_write()`.
    ///
    /// May assume it is the only writer for its target while it runs.
    fn run(&self) -> Result<(), TaskError>;
}

/// Outcome of [`execute`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    /// Target already existed; `run` was not called.
    AlreadyComplete,
    /// `run` was called and succeeded.
    Completed,
}

/// Run a task only if its output is missing.
///
/// This is the contract every runner honors: check the target first, and call
/// `run` only when nothing has been written yet.
pub fn execute(task: &dyn Task) -> Result<Execution, TaskError> {
    let target = task.output();

    if target.exists() {
        debug!("Target {} already exists, skipping {}", target.key(), task.family());
        return Ok(Execution::AlreadyComplete);
    }

    info!("Running {} for target {}", task.family(), target.key());
    task.run()?;
    Ok(Execution::Completed)
}
