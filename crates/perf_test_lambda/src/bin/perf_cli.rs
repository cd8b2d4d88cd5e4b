use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::InvocationType;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use perf_test_core::analysis::{reports_in, summarize, LogEvent};
use perf_test_core::config::{
    DEFAULT_DEPLOYED_RECORD_COUNT, DEFAULT_MEMORY_SIZE_MB, DEFAULT_RECORD_COUNT,
};
use perf_test_core::fixtures::{generate_dataset, write_dataset, ReferenceData};
use perf_test_core::state_machine::render_definitions;
use perf_test_core::topology::STANDARD_LEVEL_TIMEOUT;
use perf_test_core::{BenchmarkConfig, BenchmarkReport, DeploymentProfile, FanOutTopology};
use perf_test_lambda::adapters::invoke::{TaskInvocation, TaskInvoker};
use perf_test_lambda::adapters::local_execution::LocalTaskInvoker;
use perf_test_lambda::adapters::log_source::LogEventSource;
use perf_test_lambda::handlers::fanout::FanOutRunner;
use perf_test_lambda::handlers::logs::{
    log_window, retrieve_recent_logs, write_log_output, DEFAULT_LOG_OUTPUT,
};
use perf_test_lambda::handlers::task::{handle_task_event, TaskEvent, TaskResponse};
use perf_test_lambda::logging::init_cli_logging;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use serde_json::json;
use tracing::info;

const PROGRESS_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})";

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "perf_cli",
    about = "Operator CLI for the Lambda runtime benchmark",
    long_about = "Generates fixtures, runs the benchmark task locally or on Lambda,\n\
                  drives the nested fan-out, and retrieves and summarizes logs."
)]
struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    json_logs: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a vehicle dataset fixture (test_data_<N>.json)
    GenerateFixtures {
        /// Number of records to generate
        #[arg(long, default_value_t = DEFAULT_RECORD_COUNT)]
        count: usize,
        /// JSON list of {"make", "model"} pairs
        #[arg(long, default_value = "fixtures/make_models.json")]
        make_models: PathBuf,
        /// JSON list of country names
        #[arg(long, default_value = "fixtures/countries.json")]
        countries: PathBuf,
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
        /// Seed for a reproducible dataset
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Run the benchmark task once in-process
    RunTask {
        #[command(flatten)]
        dataset: DatasetArgs,
    },
    /// Execute the nested fan-out and summarize every task report
    RunTopology(TopologyArgs),
    /// Render the Step Functions definitions for the fan-out
    StateMachines {
        /// ARN of the deployed benchmark task function
        #[arg(long)]
        function_arn: String,
        /// ARNs of the level 2..=depth state machines, outermost first
        #[arg(long = "nested-arn")]
        nested_arns: Vec<String>,
        #[arg(long, default_value_t = 3)]
        depth: usize,
        #[arg(long, default_value_t = 10)]
        width: usize,
        /// Write one <id>.json per level instead of printing
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Print the function name, layer file and environment of a deployment
    Deployment(DeploymentArgs),
    /// Download recent events of a log group to a file
    RetrieveLogs {
        log_group: String,
        /// Trailing window to fetch
        #[arg(long, default_value_t = 10)]
        minutes: u64,
        #[arg(long, default_value = DEFAULT_LOG_OUTPUT)]
        output: PathBuf,
    },
    /// Summarize the report lines of a retrieved log file
    SummarizeLogs {
        #[arg(long, default_value = DEFAULT_LOG_OUTPUT)]
        input: PathBuf,
    },
}

#[derive(Args)]
struct DatasetArgs {
    /// Directory holding the dataset (overrides TEST_DATA_DIR)
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Dataset file name (overrides TEST_DATA_FILE)
    #[arg(long)]
    data_file: Option<String>,
}

impl DatasetArgs {
    fn config(&self) -> Result<BenchmarkConfig> {
        let mut config = BenchmarkConfig::from_env().context("invalid task configuration")?;
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(data_file) = &self.data_file {
            config.data_file = data_file.clone();
        }
        Ok(config)
    }
}

#[derive(Args)]
struct DeploymentArgs {
    /// Runtime label used in the function name
    #[arg(long, default_value = "rust")]
    runtime: String,
    #[arg(long, default_value_t = DEFAULT_MEMORY_SIZE_MB)]
    memory: u32,
    #[arg(long, default_value_t = DEFAULT_DEPLOYED_RECORD_COUNT)]
    records: usize,
}

impl DeploymentArgs {
    fn profile(&self) -> Result<DeploymentProfile> {
        Ok(DeploymentProfile::new(self.runtime.as_str())?
            .with_memory_size_mb(self.memory)
            .with_record_count(self.records))
    }
}

#[derive(Args)]
struct TopologyArgs {
    #[arg(long, default_value_t = 3)]
    depth: usize,
    #[arg(long, default_value_t = 10)]
    width: usize,
    #[arg(long, default_value_t = STANDARD_LEVEL_TIMEOUT.as_secs())]
    level_timeout_secs: u64,
    #[arg(long)]
    task_timeout_secs: Option<u64>,
    /// Run every leaf in-process instead of invoking Lambda; ignores --function
    #[arg(long)]
    local: bool,
    /// Function to invoke; derived from the deployment flags when omitted
    #[arg(long, env = "PERF_TEST_FUNCTION")]
    function: Option<String>,
    #[command(flatten)]
    deployment: DeploymentArgs,
    #[command(flatten)]
    dataset: DatasetArgs,
}

// ── AWS adapters ───────────────────────────────────────────────────

struct AwsLambdaTaskInvoker {
    lambda_client: aws_sdk_lambda::Client,
    function_name: String,
}

#[async_trait]
impl TaskInvoker for AwsLambdaTaskInvoker {
    async fn invoke(&self, invocation: &TaskInvocation) -> Result<BenchmarkReport, String> {
        let payload = serde_json::to_vec(&TaskEvent::for_branch(&invocation.path))
            .map_err(|error| format!("failed to encode task payload: {error}"))?;

        let output = self
            .lambda_client
            .invoke()
            .function_name(&self.function_name)
            .invocation_type(InvocationType::RequestResponse)
            .payload(Blob::new(payload))
            .send()
            .await
            .map_err(|error| format!("failed to invoke task lambda: {error}"))?;

        let body = output
            .payload()
            .map(|blob| String::from_utf8_lossy(blob.as_ref()).into_owned())
            .unwrap_or_default();
        if let Some(function_error) = output.function_error() {
            return Err(format!("task lambda reported {function_error}: {body}"));
        }

        serde_json::from_str::<TaskResponse>(&body)
            .map(|response| response.report)
            .map_err(|error| format!("invalid task response '{body}': {error}"))
    }
}

struct CloudWatchLogSource {
    logs_client: aws_sdk_cloudwatchlogs::Client,
}

#[async_trait]
impl LogEventSource for CloudWatchLogSource {
    async fn fetch_events(
        &self,
        log_group: &str,
        start_time_ms: i64,
    ) -> Result<Vec<LogEvent>, String> {
        let mut pages = self
            .logs_client
            .filter_log_events()
            .log_group_name(log_group)
            .start_time(start_time_ms)
            .into_paginator()
            .send();

        let mut events = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|error| format!("failed to filter log events: {error}"))?;
            events.extend(page.events().iter().map(|event| LogEvent {
                timestamp_ms: event.timestamp().unwrap_or_default(),
                message: event.message().unwrap_or_default().to_string(),
            }));
        }
        Ok(events)
    }
}

// ── Commands ───────────────────────────────────────────────────────

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn generate_fixtures(
    count: usize,
    make_models: PathBuf,
    countries: PathBuf,
    output_dir: PathBuf,
    seed: Option<u64>,
) -> Result<()> {
    let reference = ReferenceData::load(&make_models, &countries)?;
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let dataset = generate_dataset(&mut rng, &reference, count)?;
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("unable to create {}", output_dir.display()))?;
    let path = write_dataset(&dataset, &output_dir)?;
    info!(event = "fixture_written", path = %path.display(), count);
    println!("{}", path.display());
    Ok(())
}

fn run_task(dataset: DatasetArgs) -> Result<()> {
    let config = dataset.config()?;
    let response = handle_task_event(&TaskEvent::default(), &config)?;
    println!("{}", response.report);
    Ok(())
}

async fn run_topology(args: TopologyArgs) -> Result<()> {
    let topology = FanOutTopology::uniform(
        args.depth,
        args.width,
        Duration::from_secs(args.level_timeout_secs),
    )?;
    let profile = args.deployment.profile()?;
    let task_timeout = args
        .task_timeout_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| profile.task_timeout());

    let invoker: Arc<dyn TaskInvoker> = if args.local {
        Arc::new(LocalTaskInvoker::new(args.dataset.config()?))
    } else {
        let function_name = args.function.unwrap_or_else(|| profile.function_name());
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        info!(event = "lambda_target", function = %function_name);
        Arc::new(AwsLambdaTaskInvoker {
            lambda_client: aws_sdk_lambda::Client::new(&aws_config),
            function_name,
        })
    };

    let bar = ProgressBar::new(topology.total_invocations() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template(PROGRESS_TEMPLATE)?
            .progress_chars("#>-"),
    );

    let summary = FanOutRunner::new(topology, invoker)
        .with_task_timeout(task_timeout)
        .with_progress(bar.clone())
        .run()
        .await;
    bar.finish();

    print_json(&json!({
        "expected_invocations": summary.expected_invocations,
        "completed": summary.completed.len(),
        "elapsed_ms": summary.elapsed_ms,
        "failed": summary.failed,
        "reports": summarize(&summary.reports()),
    }))?;
    if !summary.succeeded() {
        bail!(
            "{} of {} invocations did not complete",
            summary.expected_invocations - summary.completed.len(),
            summary.expected_invocations
        );
    }
    Ok(())
}

fn state_machines(
    function_arn: String,
    nested_arns: Vec<String>,
    depth: usize,
    width: usize,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let topology = FanOutTopology::uniform(depth, width, STANDARD_LEVEL_TIMEOUT)?;
    let definitions = render_definitions(&topology, &function_arn, &nested_arns)?;

    let Some(output_dir) = output_dir else {
        return print_json(&definitions);
    };
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("unable to create {}", output_dir.display()))?;
    for definition in &definitions {
        let path = output_dir.join(format!("{}.json", definition.id));
        fs::write(&path, serde_json::to_string_pretty(&definition.definition)?)
            .with_context(|| format!("unable to write {}", path.display()))?;
        println!("{}", path.display());
    }
    Ok(())
}

fn deployment(args: DeploymentArgs) -> Result<()> {
    let profile = args.profile()?;
    let environment: serde_json::Map<String, serde_json::Value> = profile
        .function_environment()
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.into()))
        .collect();
    print_json(&json!({
        "function_name": profile.function_name(),
        "memory_size_mb": profile.memory_size_mb,
        "timeout_secs": profile.task_timeout_secs,
        "data_file": profile.data_file(),
        "environment": environment,
    }))
}

async fn retrieve_logs(log_group: String, minutes: u64, output: PathBuf) -> Result<()> {
    let window = log_window(minutes)?;
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let source = CloudWatchLogSource {
        logs_client: aws_sdk_cloudwatchlogs::Client::new(&aws_config),
    };

    let events = retrieve_recent_logs(&source, &log_group, window, Utc::now()).await?;
    write_log_output(&output, &events)?;
    println!("{} events written to {}", events.len(), output.display());
    Ok(())
}

fn summarize_logs(input: PathBuf) -> Result<()> {
    let text = fs::read_to_string(&input)
        .with_context(|| format!("unable to read {}", input.display()))?;
    print_json(&summarize(&reports_in(&text)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_cli_logging(cli.json_logs);

    match cli.command {
        Commands::GenerateFixtures {
            count,
            make_models,
            countries,
            output_dir,
            seed,
        } => generate_fixtures(count, make_models, countries, output_dir, seed),
        Commands::RunTask { dataset } => run_task(dataset),
        Commands::RunTopology(args) => run_topology(args).await,
        Commands::StateMachines {
            function_arn,
            nested_arns,
            depth,
            width,
            output_dir,
        } => state_machines(function_arn, nested_arns, depth, width, output_dir),
        Commands::Deployment(args) => deployment(args),
        Commands::RetrieveLogs {
            log_group,
            minutes,
            output,
        } => retrieve_logs(log_group, minutes, output).await,
        Commands::SummarizeLogs { input } => summarize_logs(input),
    }
}
