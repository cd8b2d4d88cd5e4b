use lambda_runtime::{service_fn, Error, LambdaEvent};
use perf_test_core::BenchmarkConfig;
use perf_test_lambda::handlers::task::{handle_task_event, TaskEvent, TaskResponse};
use perf_test_lambda::logging::init_lambda_logging;
use serde_json::Value;

async fn handle_request(event: LambdaEvent<Value>) -> Result<TaskResponse, Error> {
    let config = BenchmarkConfig::from_env()
        .map_err(|error| Error::from(format!("invalid task configuration: {error}")))?;
    let task_event = TaskEvent::from_payload(event.payload)
        .map_err(|error| Error::from(format!("invalid task payload: {error}")))?;

    handle_task_event(&task_event, &config).map_err(|error| Error::from(error.to_string()))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_lambda_logging();
    lambda_runtime::run(service_fn(handle_request)).await
}
