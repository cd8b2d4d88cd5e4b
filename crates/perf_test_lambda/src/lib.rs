//! Lambda-facing side of the runtime benchmark.
//!
//! This crate owns the benchmark task handler, the fan-out runner that
//! drives the nested topology, log retrieval, and the adapters that reach
//! either the local machine or AWS. Deterministic domain logic stays in
//! `perf_test_core`.

pub mod adapters;
pub mod handlers;
pub mod logging;
