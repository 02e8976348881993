pub mod fib;
pub mod registry;
pub mod target;
pub mod task;

// Re-export commonly used types
pub use fib::CalcFib;
pub use registry::{JobParams, TaskRegistry};
pub use target::{LocalTarget, OutputConfig, Target, TargetWriter};
pub use task::{execute, Execution, Task};
