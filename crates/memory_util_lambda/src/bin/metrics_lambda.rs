use lambda_runtime::{service_fn, Error, LambdaEvent};
use memory_util_lambda::adapters::aws::{CloudWatchLogsQueryService, FirehoseRecordSink};
use memory_util_lambda::adapters::clock::{Clock, SystemClock};
use memory_util_lambda::config::{MetricsConfig, PollSettings};
use memory_util_lambda::handlers::metrics::{handle_metrics_event, MetricsHandlerConfig};
use memory_util_lambda::telemetry::init_tracing;
use serde_json::Value;

struct MetricsDependencies {
    poll: PollSettings,
    logs: CloudWatchLogsQueryService,
    sink: FirehoseRecordSink,
}

async fn handle_request(
    event: LambdaEvent<Value>,
    deps: &MetricsDependencies,
) -> Result<bool, Error> {
    let clock = SystemClock;
    let config = MetricsHandlerConfig::for_invocation(clock.now(), deps.poll);

    handle_metrics_event(&event.payload, &config, &clock, &deps.logs, &deps.sink)?;
    Ok(true)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();
    let config = MetricsConfig::from_env()?;

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let deps = MetricsDependencies {
        poll: config.poll,
        logs: CloudWatchLogsQueryService::new(&aws_config),
        sink: FirehoseRecordSink::new(&aws_config, config.delivery_stream),
    };

    let deps = &deps;
    lambda_runtime::run(service_fn(move |event| async move {
        handle_request(event, deps).await
    }))
    .await
}
