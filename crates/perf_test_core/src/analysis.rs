//! Offline analysis of retrieved execution logs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::report::BenchmarkReport;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogEvent {
    pub timestamp_ms: i64,
    pub message: String,
}

/// `<timestamp>\t<message>` per event. Messages are concatenated as-is;
/// runtime log messages already carry their trailing newline.
pub fn render_log_output(events: &[LogEvent]) -> String {
    events
        .iter()
        .map(|event| format!("{}\t{}", event.timestamp_ms, event.message))
        .collect()
}

pub fn reports_in(text: &str) -> Vec<BenchmarkReport> {
    text.lines()
        .filter_map(|line| BenchmarkReport::find_in(line).ok())
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DurationStats {
    pub min_ms: u64,
    pub max_ms: u64,
    pub mean_ms: f64,
    pub p50_ms: u64,
    pub p95_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    pub invocations: usize,
    /// Result hash -> number of invocations that reported it.
    pub result_hashes: BTreeMap<String, usize>,
    pub source_counts: BTreeMap<usize, usize>,
    pub durations: Option<DurationStats>,
}

impl RunSummary {
    /// True when every invocation produced the same result hash.
    pub fn is_consistent(&self) -> bool {
        self.result_hashes.len() <= 1
    }
}

pub fn summarize(reports: &[BenchmarkReport]) -> RunSummary {
    let mut result_hashes = BTreeMap::new();
    let mut source_counts = BTreeMap::new();
    for report in reports {
        *result_hashes.entry(report.result_hash.clone()).or_insert(0) += 1;
        *source_counts.entry(report.source_count).or_insert(0) += 1;
    }

    let mut durations: Vec<u64> = reports.iter().map(|report| report.duration_ms).collect();
    durations.sort_unstable();

    RunSummary {
        invocations: reports.len(),
        result_hashes,
        source_counts,
        durations: duration_stats(&durations),
    }
}

fn duration_stats(sorted: &[u64]) -> Option<DurationStats> {
    let (first, last) = (sorted.first()?, sorted.last()?);
    let total: u128 = sorted.iter().map(|&value| u128::from(value)).sum();
    Some(DurationStats {
        min_ms: *first,
        max_ms: *last,
        mean_ms: total as f64 / sorted.len() as f64,
        p50_ms: nearest_rank(sorted, 50),
        p95_ms: nearest_rank(sorted, 95),
    })
}

fn nearest_rank(sorted: &[u64], percentile: usize) -> u64 {
    let rank = (percentile * sorted.len()).div_ceil(100).max(1);
    sorted[rank.min(sorted.len()) - 1]
}
