//! Single deployment artifact for both stages: SQS batches run the metrics
//! stage, any other payload runs discovery.

use lambda_runtime::{service_fn, Error, LambdaEvent};
use memory_util_lambda::adapters::aws::{
    AccountRegionDirectory, CloudWatchLogsQueryService, FirehoseRecordSink,
    LambdaFunctionCatalog, SqsWorkQueue,
};
use memory_util_lambda::adapters::clock::{Clock, SystemClock};
use memory_util_lambda::config::{DiscoveryConfig, MetricsConfig, PollSettings};
use memory_util_lambda::handlers::discovery::handle_discovery_event;
use memory_util_lambda::handlers::metrics::{
    handle_metrics_event, is_sqs_event, MetricsHandlerConfig,
};
use memory_util_lambda::telemetry::init_tracing;
use serde_json::Value;
use tracing::info;

struct RuntimeDependencies {
    poll: PollSettings,
    regions: AccountRegionDirectory,
    catalog: LambdaFunctionCatalog,
    queue: SqsWorkQueue,
    logs: CloudWatchLogsQueryService,
    sink: FirehoseRecordSink,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Discovery,
    Metrics,
}

fn select_stage(event: &Value) -> Stage {
    if is_sqs_event(event) {
        Stage::Metrics
    } else {
        Stage::Discovery
    }
}

async fn handle_request(
    event: LambdaEvent<Value>,
    deps: &RuntimeDependencies,
) -> Result<bool, Error> {
    let stage = select_stage(&event.payload);
    info!(stage = ?stage, request_id = %event.context.request_id, "dispatching invocation");

    match stage {
        Stage::Metrics => {
            let clock = SystemClock;
            let config = MetricsHandlerConfig::for_invocation(clock.now(), deps.poll);
            handle_metrics_event(&event.payload, &config, &clock, &deps.logs, &deps.sink)?;
        }
        Stage::Discovery => {
            handle_discovery_event(event.payload, &deps.regions, &deps.catalog, &deps.queue)?;
        }
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();
    let discovery = DiscoveryConfig::from_env()?;
    let metrics = MetricsConfig::from_env()?;

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let deps = RuntimeDependencies {
        poll: metrics.poll,
        regions: AccountRegionDirectory::new(&aws_config),
        catalog: LambdaFunctionCatalog::new(&aws_config),
        queue: SqsWorkQueue::new(&aws_config, discovery.queue_url),
        logs: CloudWatchLogsQueryService::new(&aws_config),
        sink: FirehoseRecordSink::new(&aws_config, metrics.delivery_stream),
    };

    let deps = &deps;
    lambda_runtime::run(service_fn(move |event| async move {
        handle_request(event, deps).await
    }))
    .await
}
