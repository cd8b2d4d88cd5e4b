use std::time::Instant;

use perf_test_core::error::BenchmarkError;
use perf_test_core::{run_benchmark, BenchmarkConfig, BenchmarkReport, BranchPath};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::logging::REPORT_TARGET;

const COMPONENT: &str = "benchmark_task";

/// Invocation payload. Orchestrators may pass anything; only `branch` is
/// read, and only for log correlation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl TaskEvent {
    pub fn for_branch(path: &BranchPath) -> Self {
        Self {
            branch: Some(path.to_string()),
        }
    }

    pub fn from_payload(payload: Value) -> Result<Self, serde_json::Error> {
        match payload {
            Value::Object(_) => serde_json::from_value(payload),
            _ => Ok(Self::default()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskResponse {
    #[serde(flatten)]
    pub report: BenchmarkReport,
    pub load_ms: u64,
    pub process_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

/// Runs one benchmark invocation and emits its report line.
pub fn handle_task_event(
    event: &TaskEvent,
    config: &BenchmarkConfig,
) -> Result<TaskResponse, BenchmarkError> {
    let started_at = Instant::now();
    let branch = event.branch.as_deref().unwrap_or("-");
    let dataset = config.dataset_path();
    debug!(
        component = COMPONENT,
        event = "task_started",
        branch,
        dataset = %dataset.display(),
        predicate = config.rules.predicate.as_str(),
        hash_case = config.rules.hash_case.as_str(),
        separators = config.rules.separators.as_str(),
    );

    match run_benchmark(config) {
        Ok(run) => {
            info!(
                target: REPORT_TARGET,
                component = COMPONENT,
                event = "task_completed",
                branch,
                load_ms = run.load_ms,
                process_ms = run.process_ms,
                "{}",
                run.report
            );
            Ok(TaskResponse {
                report: run.report,
                load_ms: run.load_ms,
                process_ms: run.process_ms,
                branch: event.branch.clone(),
            })
        }
        Err(failure) => {
            error!(
                component = COMPONENT,
                event = "task_failed",
                branch,
                duration_ms = started_at.elapsed().as_millis() as u64,
                error = %failure,
            );
            Err(failure)
        }
    }
}
