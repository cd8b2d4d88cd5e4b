//! Subscriber setup for the Lambda bootstrap and the operator CLI.
//!
//! Both read `RUST_LOG` and fall back to `info`.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Target of the per-invocation report line. Log retrieval and summaries
/// depend on it, so the Lambda filter keeps it at `info` whatever `RUST_LOG`
/// says.
pub const REPORT_TARGET: &str = "benchmark_report";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn with_report_target(filter: EnvFilter) -> EnvFilter {
    match format!("{REPORT_TARGET}=info").parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    }
}

/// CloudWatch stamps every line itself, so the formatter omits time, ANSI
/// colours and targets.
pub fn init_lambda_logging() {
    let _ = tracing_subscriber::registry()
        .with(with_report_target(env_filter()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .without_time(),
        )
        .try_init();
}

/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init_cli_logging(json: bool) {
    let registry = tracing_subscriber::registry().with(env_filter());
    let _ = if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()
    };
}
