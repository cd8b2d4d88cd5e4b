use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ReportParseError;

const REPORT_PREFIX: &str = "Filtered ";
const SOURCE_MARKER: &str = " from ";
const HASH_MARKER: &str = " source items. Result hash: ";
const DURATION_MARKER: &str = ". Duration: ";
const REPORT_SUFFIX: &str = " ms.";

/// The one diagnostic line every invocation emits, in every runtime:
/// `Filtered <n> from <m> source items. Result hash: <hash>. Duration: <d> ms.`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BenchmarkReport {
    pub filtered_count: usize,
    pub source_count: usize,
    pub result_hash: String,
    pub duration_ms: u64,
}

impl fmt::Display for BenchmarkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{REPORT_PREFIX}{}{SOURCE_MARKER}{}{HASH_MARKER}{}{DURATION_MARKER}{}{REPORT_SUFFIX}",
            self.filtered_count, self.source_count, self.result_hash, self.duration_ms
        )
    }
}

impl BenchmarkReport {
    /// Finds a report inside an arbitrary log line (timestamps, log levels
    /// and JSON wrapping around it are ignored).
    pub fn find_in(line: &str) -> Result<Self, ReportParseError> {
        let start = line.find(REPORT_PREFIX).ok_or(ReportParseError::NotAReport)?;
        let rest = &line[start + REPORT_PREFIX.len()..];

        let (filtered, rest) = rest
            .split_once(SOURCE_MARKER)
            .ok_or(ReportParseError::NotAReport)?;
        let (source, rest) = rest
            .split_once(HASH_MARKER)
            .ok_or(ReportParseError::NotAReport)?;
        let (hash, rest) = rest
            .split_once(DURATION_MARKER)
            .ok_or(ReportParseError::NotAReport)?;
        let (duration, _) = rest
            .split_once(REPORT_SUFFIX)
            .ok_or(ReportParseError::NotAReport)?;

        if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ReportParseError::Field {
                field: "result_hash",
                value: hash.to_string(),
            });
        }

        Ok(Self {
            filtered_count: parse_field("filtered_count", filtered)?,
            source_count: parse_field("source_count", source)?,
            result_hash: hash.to_string(),
            duration_ms: parse_field("duration_ms", duration)?,
        })
    }
}

impl FromStr for BenchmarkReport {
    type Err = ReportParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        Self::find_in(line)
    }
}

fn parse_field<T: FromStr>(field: &'static str, raw: &str) -> Result<T, ReportParseError> {
    raw.trim().parse().map_err(|_| ReportParseError::Field {
        field,
        value: raw.to_string(),
    })
}
