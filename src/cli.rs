use clap::{Parser, Subcommand};

use crate::error::TaskError;
use crate::pipeline::{execute, CalcFib, Execution, OutputConfig, Task};

#[derive(Parser, Debug)]
#[command(name = "fib-jobs", version, about = "Idempotent Fibonacci job service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Start the workers and the HTTP server (default)
    Serve,
    /// Apply database migrations and exit
    Migrate,
    /// Compute one Fibonacci job locally, skipping it if its result exists
    Run {
        #[arg(allow_negative_numbers = true)]
        fib_num: i64,
    },
}

/// Outcome of a local run
#[derive(Debug)]
pub struct LocalRun {
    pub execution: Execution,
    pub target_key: String,
    pub content: Option<String>,
}

/// Execute the Fibonacci task in-process, honoring the skip-if-exists contract.
pub fn run_local(fib_num: i64, output: OutputConfig) -> Result<LocalRun, TaskError> {
    let task = CalcFib::new(fib_num, output);
    let execution = execute(&task)?;

    let target = task.output();
    let content = target.read().map_err(|e| TaskError::io(target.key(), e))?;

    Ok(LocalRun {
        execution,
        target_key: target.key().to_string(),
        content,
    })
}
