use async_trait::async_trait;
use perf_test_core::analysis::LogEvent;

#[async_trait]
pub trait LogEventSource: Send + Sync {
    /// All events of `log_group` at or after `start_time_ms`, across pages.
    async fn fetch_events(&self, log_group: &str, start_time_ms: i64)
        -> Result<Vec<LogEvent>, String>;
}
