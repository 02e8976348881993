use std::io::Write;

use tracing::info;

use crate::error::{ComputationError, TaskError};
use super::target::{LocalTarget, OutputConfig, Target};
use super::task::Task;

/// Largest index whose Fibonacci number fits in a `u128`.
pub const MAX_FIB_INDEX: i64 = 186;

/// Target namespace for Fibonacci results: `fib_{n}.txt`.
pub const FIB_NAMESPACE: &str = "fib";

/// The n-th term of `f(0)=0, f(1)=1, f(k)=f(k-1)+f(k-2)`, computed iteratively.
pub fn fib(n: i64) -> Result<u128, ComputationError> {
    if n < 0 {
        return Err(ComputationError::NegativeIndex(n));
    }
    if n > MAX_FIB_INDEX {
        return Err(ComputationError::Overflow {
            index: n,
            max: MAX_FIB_INDEX,
        });
    }
    if n == 0 {
        return Ok(0);
    }

    let (mut prev, mut curr) = (0u128, 1u128);
    for _ in 1..n {
        let next = prev + curr;
        prev = curr;
        curr = next;
    }
    Ok(curr)
}

/// Human-readable artifact body.
pub fn render_result(fib_num: i64, result: u128) -> String {
    format!("{} number in fib sequence is {}", fib_num, result)
}

/// Computes one Fibonacci number into `{output_path}/fib_{n}.txt`.
#[derive(Clone, Debug)]
pub struct CalcFib {
    fib_num: i64,
    config: OutputConfig,
}

impl CalcFib {
    pub const KIND: &'static str = "calc_fib";

    pub fn new(fib_num: i64, config: OutputConfig) -> Self {
        Self { fib_num, config }
    }

    pub fn fib_num(&self) -> i64 {
        self.fib_num
    }

    pub fn target(&self) -> LocalTarget {
        LocalTarget::new(&self.config, FIB_NAMESPACE, self.fib_num)
    }
}

impl Task for CalcFib {
    fn family(&self) -> &'static str {
        Self::KIND
    }

    fn output(&self) -> Box<dyn Target> {
        Box::new(self.target())
    }

    fn run(&self) -> Result<(), TaskError> {
        // Validate before touching the filesystem so a bad index never opens a writer.
        let result = fib(self.fib_num)?;
        info!("fib({}) = {}", self.fib_num, result);

        let target = self.target();
        let mut out = target
            .open_for_write()
            .map_err(|e| TaskError::io(target.key(), e))?;
        out.write_all(render_result(self.fib_num, result).as_bytes())
            .map_err(|e| TaskError::io(target.key(), e))?;
        out.commit().map_err(|e| TaskError::io(target.key(), e))?;

        Ok(())
    }
}
