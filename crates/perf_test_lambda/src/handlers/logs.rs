use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use perf_test_core::analysis::{render_log_output, LogEvent};
use thiserror::Error;
use tracing::info;

use crate::adapters::log_source::LogEventSource;

const COMPONENT: &str = "log_retrieval";

pub const DEFAULT_LOG_WINDOW: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_LOG_OUTPUT: &str = "log_output.txt";

#[derive(Debug, Error)]
pub enum LogRetrievalError {
    #[error("log group name cannot be empty")]
    EmptyLogGroup,
    #[error("log window of {0:?} is out of range")]
    Window(Duration),
    #[error("log window of {0} minutes is out of range")]
    WindowMinutes(u64),
    #[error("failed to fetch events from '{log_group}': {message}")]
    Fetch { log_group: String, message: String },
    #[error("unable to write log output '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub fn log_window(minutes: u64) -> Result<Duration, LogRetrievalError> {
    minutes
        .checked_mul(60)
        .map(Duration::from_secs)
        .ok_or(LogRetrievalError::WindowMinutes(minutes))
}

/// Every event of `log_group` newer than `now - window`, oldest first.
pub async fn retrieve_recent_logs(
    source: &dyn LogEventSource,
    log_group: &str,
    window: Duration,
    now: DateTime<Utc>,
) -> Result<Vec<LogEvent>, LogRetrievalError> {
    if log_group.trim().is_empty() {
        return Err(LogRetrievalError::EmptyLogGroup);
    }
    let window_ms =
        i64::try_from(window.as_millis()).map_err(|_| LogRetrievalError::Window(window))?;
    let start_time_ms = now.timestamp_millis().saturating_sub(window_ms);

    let mut events = source
        .fetch_events(log_group, start_time_ms)
        .await
        .map_err(|message| LogRetrievalError::Fetch {
            log_group: log_group.to_string(),
            message,
        })?;
    events.sort_by_key(|event| event.timestamp_ms);

    info!(
        component = COMPONENT,
        event = "events_retrieved",
        log_group,
        start_time_ms,
        count = events.len(),
    );
    Ok(events)
}

pub fn write_log_output(path: &Path, events: &[LogEvent]) -> Result<(), LogRetrievalError> {
    fs::write(path, render_log_output(events)).map_err(|source| LogRetrievalError::Write {
        path: path.to_path_buf(),
        source,
    })
}
