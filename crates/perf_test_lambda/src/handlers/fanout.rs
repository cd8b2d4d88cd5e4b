//! Executes a [`FanOutTopology`]: every level spawns its branches at once and
//! waits for all of them. A failing or timed-out branch is recorded and its
//! siblings keep running.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{join_all, BoxFuture, FutureExt};
use indicatif::ProgressBar;
use perf_test_core::config::DEFAULT_TASK_TIMEOUT;
use perf_test_core::{BenchmarkReport, BranchPath, FanOutTopology};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::adapters::invoke::{TaskInvocation, TaskInvoker};

const COMPONENT: &str = "fanout";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BranchFailure {
    Task { message: String },
    TaskTimedOut { limit_secs: u64 },
    LevelTimedOut { level: usize, limit_secs: u64 },
    Aborted { message: String },
}

impl fmt::Display for BranchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Task { message } => write!(f, "task failed: {message}"),
            Self::TaskTimedOut { limit_secs } => {
                write!(f, "task exceeded its {limit_secs}s timeout")
            }
            Self::LevelTimedOut { level, limit_secs } => {
                write!(f, "level {level} exceeded its {limit_secs}s timeout")
            }
            Self::Aborted { message } => write!(f, "branch aborted: {message}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletedTask {
    pub path: BranchPath,
    pub report: BenchmarkReport,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailedBranch {
    pub path: BranchPath,
    pub failure: BranchFailure,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct BranchReport {
    completed: Vec<CompletedTask>,
    failed: Vec<FailedBranch>,
}

impl BranchReport {
    fn completed(path: BranchPath, report: BenchmarkReport) -> Self {
        Self {
            completed: vec![CompletedTask { path, report }],
            failed: Vec::new(),
        }
    }

    fn failed(path: BranchPath, failure: BranchFailure) -> Self {
        Self {
            completed: Vec::new(),
            failed: vec![FailedBranch { path, failure }],
        }
    }

    fn merge(&mut self, other: BranchReport) {
        self.completed.extend(other.completed);
        self.failed.extend(other.failed);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopologyRunSummary {
    pub expected_invocations: usize,
    pub completed: Vec<CompletedTask>,
    pub failed: Vec<FailedBranch>,
    pub elapsed_ms: u64,
}

impl TopologyRunSummary {
    pub fn reports(&self) -> Vec<BenchmarkReport> {
        self.completed.iter().map(|task| task.report.clone()).collect()
    }

    pub fn succeeded(&self) -> bool {
        self.failed.is_empty() && self.completed.len() == self.expected_invocations
    }
}

struct RunContext {
    topology: FanOutTopology,
    invoker: Arc<dyn TaskInvoker>,
    task_timeout: Duration,
    progress: Option<ProgressBar>,
}

pub struct FanOutRunner {
    topology: FanOutTopology,
    invoker: Arc<dyn TaskInvoker>,
    task_timeout: Duration,
    progress: Option<ProgressBar>,
}

impl FanOutRunner {
    pub fn new(topology: FanOutTopology, invoker: Arc<dyn TaskInvoker>) -> Self {
        Self {
            topology,
            invoker,
            task_timeout: DEFAULT_TASK_TIMEOUT,
            progress: None,
        }
    }

    pub fn with_task_timeout(mut self, task_timeout: Duration) -> Self {
        self.task_timeout = task_timeout;
        self
    }

    /// Advances `progress` by one for every finished task invocation.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn topology(&self) -> &FanOutTopology {
        &self.topology
    }

    pub async fn run(&self) -> TopologyRunSummary {
        let started_at = Instant::now();
        let expected_invocations = self.topology.total_invocations();
        info!(
            component = COMPONENT,
            event = "topology_started",
            depth = self.topology.depth(),
            expected_invocations,
        );

        let context = Arc::new(RunContext {
            topology: self.topology.clone(),
            invoker: Arc::clone(&self.invoker),
            task_timeout: self.task_timeout,
            progress: self.progress.clone(),
        });
        let mut report = run_level(context, 1, BranchPath::root()).await;
        report.completed.sort_by(|left, right| left.path.cmp(&right.path));
        report.failed.sort_by(|left, right| left.path.cmp(&right.path));

        let summary = TopologyRunSummary {
            expected_invocations,
            completed: report.completed,
            failed: report.failed,
            elapsed_ms: u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        info!(
            component = COMPONENT,
            event = "topology_completed",
            completed = summary.completed.len(),
            failed = summary.failed.len(),
            elapsed_ms = summary.elapsed_ms,
        );
        summary
    }
}

/// Runs the level-`level` node at `path` under that level's timeout.
fn run_level(
    context: Arc<RunContext>,
    level: usize,
    path: BranchPath,
) -> BoxFuture<'static, BranchReport> {
    async move {
        let Some(spec) = context.topology.level(level).cloned() else {
            return BranchReport::default();
        };

        match tokio::time::timeout(
            spec.timeout(),
            fan_out(Arc::clone(&context), level, path.clone(), spec.width),
        )
        .await
        {
            Ok(report) => {
                debug!(
                    component = COMPONENT,
                    event = "level_completed",
                    level,
                    branch = %path,
                    completed = report.completed.len(),
                    failed = report.failed.len(),
                );
                report
            }
            Err(_) => {
                let failure = BranchFailure::LevelTimedOut {
                    level,
                    limit_secs: spec.timeout_secs,
                };
                warn!(component = COMPONENT, event = "level_timed_out", branch = %path, %failure);
                BranchReport::failed(path, failure)
            }
        }
    }
    .boxed()
}

/// Aborts still-running children when the owning level is dropped, e.g. on
/// level timeout.
struct SpawnedBranches(Vec<(BranchPath, JoinHandle<BranchReport>)>);

impl Drop for SpawnedBranches {
    fn drop(&mut self) {
        for (_, handle) in &self.0 {
            handle.abort();
        }
    }
}

async fn fan_out(
    context: Arc<RunContext>,
    level: usize,
    path: BranchPath,
    width: usize,
) -> BranchReport {
    let invokes_task = level == context.topology.depth();

    let mut spawned = SpawnedBranches(Vec::with_capacity(width));
    for branch in 0..width {
        let child = path.child(branch);
        let handle = if invokes_task {
            tokio::spawn(run_task(Arc::clone(&context), child.clone()))
        } else {
            tokio::spawn(run_level(Arc::clone(&context), level + 1, child.clone()))
        };
        spawned.0.push((child, handle));
    }

    let joined = join_all(spawned.0.iter_mut().map(|(_, handle)| handle)).await;

    let mut report = BranchReport::default();
    for ((child, _), outcome) in spawned.0.iter().zip(joined) {
        match outcome {
            Ok(child_report) => report.merge(child_report),
            Err(join_error) => report.merge(BranchReport::failed(
                child.clone(),
                BranchFailure::Aborted {
                    message: join_error.to_string(),
                },
            )),
        }
    }
    report
}

async fn run_task(context: Arc<RunContext>, path: BranchPath) -> BranchReport {
    let invocation = TaskInvocation { path: path.clone() };
    let outcome =
        tokio::time::timeout(context.task_timeout, context.invoker.invoke(&invocation)).await;
    if let Some(progress) = &context.progress {
        progress.inc(1);
    }

    let failure = match outcome {
        Ok(Ok(report)) => return BranchReport::completed(path, report),
        Ok(Err(message)) => BranchFailure::Task { message },
        Err(_) => BranchFailure::TaskTimedOut {
            limit_secs: context.task_timeout.as_secs(),
        },
    };
    warn!(component = COMPONENT, event = "task_failed", branch = %path, %failure);
    BranchReport::failed(path, failure)
}
