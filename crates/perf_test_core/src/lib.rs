//! Shared benchmark domain primitives.
//!
//! This crate owns the deterministic parts of the benchmark: the vehicle
//! dataset contract, fixture generation, the benchmark task pipeline, the
//! report line format and the fan-out topology. It intentionally excludes
//! AWS SDK and Lambda runtime concerns.

pub mod analysis;
pub mod config;
pub mod contract;
pub mod error;
pub mod fixtures;
pub mod naming;
pub mod report;
pub mod state_machine;
pub mod task;
pub mod topology;

pub use config::{BenchmarkConfig, DeploymentProfile};
pub use contract::{Dataset, TaskRules, VehicleRecord};
pub use error::BenchmarkError;
pub use report::BenchmarkReport;
pub use task::{run_benchmark, BenchmarkRun};
pub use topology::{BranchPath, FanOutTopology};
