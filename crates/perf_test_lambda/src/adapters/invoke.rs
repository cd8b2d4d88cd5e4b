use async_trait::async_trait;
use perf_test_core::{BenchmarkReport, BranchPath};

/// One leaf of the fan-out: a single benchmark task invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInvocation {
    pub path: BranchPath,
}

/// Runs the benchmark task somewhere and hands back its report.
#[async_trait]
pub trait TaskInvoker: Send + Sync {
    async fn invoke(&self, invocation: &TaskInvocation) -> Result<BenchmarkReport, String>;
}
