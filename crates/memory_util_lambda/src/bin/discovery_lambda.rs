use lambda_runtime::{service_fn, Error, LambdaEvent};
use memory_util_lambda::adapters::aws::{
    AccountRegionDirectory, LambdaFunctionCatalog, SqsWorkQueue,
};
use memory_util_lambda::config::DiscoveryConfig;
use memory_util_lambda::handlers::discovery::handle_discovery_event;
use memory_util_lambda::telemetry::init_tracing;
use serde_json::Value;

struct DiscoveryDependencies {
    regions: AccountRegionDirectory,
    catalog: LambdaFunctionCatalog,
    queue: SqsWorkQueue,
}

async fn handle_request(
    event: LambdaEvent<Value>,
    deps: &DiscoveryDependencies,
) -> Result<bool, Error> {
    handle_discovery_event(event.payload, &deps.regions, &deps.catalog, &deps.queue)?;
    Ok(true)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();
    let config = DiscoveryConfig::from_env()?;

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let deps = DiscoveryDependencies {
        regions: AccountRegionDirectory::new(&aws_config),
        catalog: LambdaFunctionCatalog::new(&aws_config),
        queue: SqsWorkQueue::new(&aws_config, config.queue_url),
    };

    let deps = &deps;
    lambda_runtime::run(service_fn(move |event| async move {
        handle_request(event, deps).await
    }))
    .await
}
