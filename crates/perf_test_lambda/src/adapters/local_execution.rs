use async_trait::async_trait;
use perf_test_core::{BenchmarkConfig, BenchmarkReport};

use crate::adapters::invoke::{TaskInvocation, TaskInvoker};
use crate::handlers::task::{handle_task_event, TaskEvent};

/// Runs each invocation in-process on the blocking pool. Every invocation
/// loads the dataset afresh.
#[derive(Debug, Clone)]
pub struct LocalTaskInvoker {
    config: BenchmarkConfig,
}

impl LocalTaskInvoker {
    pub fn new(config: BenchmarkConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TaskInvoker for LocalTaskInvoker {
    async fn invoke(&self, invocation: &TaskInvocation) -> Result<BenchmarkReport, String> {
        let config = self.config.clone();
        let event = TaskEvent::for_branch(&invocation.path);

        let outcome = tokio::task::spawn_blocking(move || handle_task_event(&event, &config))
            .await
            .map_err(|error| format!("local task did not complete: {error}"))?;
        outcome
            .map(|response| response.report)
            .map_err(|error| error.to_string())
    }
}
