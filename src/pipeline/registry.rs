use std::collections::HashMap;

use tracing::debug;

use crate::error::RegistryError;
use super::fib::CalcFib;
use super::target::OutputConfig;
use super::task::Task;

/// Domain parameters carried by a job request, one variant per job kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobParams {
    Fib { fib_num: i64 },
}

/// Builds a task for one job kind.
pub type TaskFactory = fn(&JobParams, &OutputConfig) -> Box<dyn Task>;

/// Maps a job kind to the task that computes it.
pub struct TaskRegistry {
    config: OutputConfig,
    factories: HashMap<&'static str, TaskFactory>,
}

impl TaskRegistry {
    /// Create an empty registry
    pub fn new(config: OutputConfig) -> Self {
        Self {
            config,
            factories: HashMap::new(),
        }
    }

    /// Registry with every built-in job kind bound.
    pub fn with_defaults(config: OutputConfig) -> Self {
        let mut registry = Self::new(config);
        registry.register(CalcFib::KIND, build_calc_fib);
        registry
    }

    pub fn register(&mut self, kind: &'static str, factory: TaskFactory) {
        debug!("Registering task factory for kind={}", kind);
        self.factories.insert(kind, factory);
    }

    pub fn build(&self, kind: &str, params: &JobParams) -> Result<Box<dyn Task>, RegistryError> {
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| RegistryError::UnknownKind(kind.to_string()))?;
        Ok(factory(params, &self.config))
    }
}

fn build_calc_fib(params: &JobParams, config: &OutputConfig) -> Box<dyn Task> {
    let JobParams::Fib { fib_num } = *params;
    Box::new(CalcFib::new(fib_num, config.clone()))
}
