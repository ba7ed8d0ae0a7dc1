use memory_util_core::contract::{
    normalize_request, stable_contract_json, Architecture, DiscoveryRequest, RegionSelection,
    WorkItem,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::info;

use crate::adapters::functions::{FunctionCatalog, FunctionDescriptor};
use crate::adapters::queue::WorkQueue;
use crate::adapters::regions::RegionDirectory;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("invalid discovery request: {0}")]
    InvalidRequest(String),
    #[error("{0}")]
    RegionLookup(String),
    #[error("{0}")]
    FunctionListing(String),
    #[error("function listing in {region} returned an entry without a name")]
    MissingFunctionName { region: String },
    #[error("function '{function_name}' in {region} has no log group in its logging configuration")]
    MissingLogGroup {
        function_name: String,
        region: String,
    },
    #[error("failed to serialize work item: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{message} (function '{function_name}' in {region})")]
    Enqueue {
        function_name: String,
        region: String,
        message: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscoverySummary {
    pub regions_scanned: usize,
    pub work_items_enqueued: usize,
}

/// Enqueues one work item per function in every target region.
///
/// Any listing or enqueue failure aborts the whole invocation; items already
/// sent stay on the queue.
pub fn handle_discovery_event(
    event: Value,
    region_directory: &dyn RegionDirectory,
    catalog: &dyn FunctionCatalog,
    queue: &dyn WorkQueue,
) -> Result<DiscoverySummary, DiscoveryError> {
    info!(event = %event, "discovery invoked");

    let payload = normalize_invocation_payload(event).map_err(DiscoveryError::InvalidRequest)?;
    let request = serde_json::from_value::<DiscoveryRequest>(payload)
        .map_err(|error| DiscoveryError::InvalidRequest(format!("Malformed request: {error}")))?;
    let normalized = normalize_request(request)
        .map_err(|error| DiscoveryError::InvalidRequest(error.message().to_string()))?;

    let regions = match normalized.regions {
        RegionSelection::Explicit(regions) => regions,
        RegionSelection::AllEnabled => region_directory
            .enabled_regions()
            .map_err(DiscoveryError::RegionLookup)?,
    };

    let mut work_items_enqueued = 0usize;
    for region in &regions {
        info!(region = %region, "fetching lambda log groups");
        let functions = catalog
            .list_functions(region)
            .map_err(DiscoveryError::FunctionListing)?;
        info!(region = %region, functions = functions.len(), "listed functions");

        for function in functions {
            let item = build_work_item(function, region, normalized.days)?;
            let body = stable_contract_json(&item)?;
            queue
                .send_message(&body)
                .map_err(|message| DiscoveryError::Enqueue {
                    function_name: item.function_name.clone(),
                    region: region.clone(),
                    message,
                })?;
            work_items_enqueued += 1;
        }
    }

    let summary = DiscoverySummary {
        regions_scanned: regions.len(),
        work_items_enqueued,
    };
    info!(
        regions_scanned = summary.regions_scanned,
        work_items_enqueued = summary.work_items_enqueued,
        "discovery completed"
    );
    Ok(summary)
}

/// The first listed architecture is the one priced. Functions report an
/// empty list only when they predate multi-architecture support, which means
/// x86_64.
fn build_work_item(
    function: FunctionDescriptor,
    region: &str,
    days: u32,
) -> Result<WorkItem, DiscoveryError> {
    let Some(function_name) = function.function_name else {
        return Err(DiscoveryError::MissingFunctionName {
            region: region.to_string(),
        });
    };
    let Some(log_group_name) = function.log_group_name else {
        return Err(DiscoveryError::MissingLogGroup {
            function_name,
            region: region.to_string(),
        });
    };

    let architecture = function
        .architectures
        .into_iter()
        .next()
        .map(Architecture::from)
        .unwrap_or_default();

    Ok(WorkItem {
        function_name,
        log_group_name,
        architecture,
        region: region.to_string(),
        days,
    })
}

fn normalize_invocation_payload(event: Value) -> Result<Value, String> {
    match event {
        Value::Null => Ok(json!({})),
        Value::Object(_) => Ok(event),
        _ => Err("Request payload must be a JSON object".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct CapturingQueue {
        bodies: Mutex<Vec<String>>,
    }

    impl CapturingQueue {
        fn new() -> Self {
            Self {
                bodies: Mutex::new(Vec::new()),
            }
        }

        fn items(&self) -> Vec<WorkItem> {
            self.bodies
                .lock()
                .expect("poisoned mutex")
                .iter()
                .map(|body| serde_json::from_str(body).expect("body should parse"))
                .collect()
        }
    }

    impl WorkQueue for CapturingQueue {
        fn send_message(&self, body: &str) -> Result<(), String> {
            self.bodies
                .lock()
                .expect("poisoned mutex")
                .push(body.to_string());
            Ok(())
        }
    }

    struct CountingRegions {
        regions: Vec<String>,
        calls: Mutex<usize>,
    }

    impl CountingRegions {
        fn new(regions: &[&str]) -> Self {
            Self {
                regions: regions.iter().map(|region| region.to_string()).collect(),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().expect("poisoned mutex")
        }
    }

    impl RegionDirectory for CountingRegions {
        fn enabled_regions(&self) -> Result<Vec<String>, String> {
            *self.calls.lock().expect("poisoned mutex") += 1;
            Ok(self.regions.clone())
        }
    }

    struct StaticCatalog;

    impl FunctionCatalog for StaticCatalog {
        fn list_functions(&self, region: &str) -> Result<Vec<FunctionDescriptor>, String> {
            if region == "ap-south-2" {
                return Err(format!("failed to list functions in {region}: AccessDenied"));
            }
            Ok(vec![
                FunctionDescriptor {
                    function_name: Some(format!("{region}-api")),
                    log_group_name: Some(format!("/custom/{region}-api")),
                    architectures: vec!["arm64".to_string(), "x86_64".to_string()],
                },
                FunctionDescriptor {
                    function_name: Some(format!("{region}-worker")),
                    log_group_name: Some(format!("/aws/lambda/{region}-worker")),
                    architectures: Vec::new(),
                },
            ])
        }
    }

    #[test]
    fn explicit_regions_skip_enabled_region_lookup() {
        let regions = CountingRegions::new(&["eu-west-1"]);
        let queue = CapturingQueue::new();

        let summary = handle_discovery_event(
            json!({"regions": "us-east-1,us-west-2", "days": 14}),
            &regions,
            &StaticCatalog,
            &queue,
        )
        .expect("discovery should succeed");

        assert_eq!(regions.calls(), 0);
        assert_eq!(summary.regions_scanned, 2);
        assert_eq!(summary.work_items_enqueued, 4);

        let items = queue.items();
        let item_regions: Vec<&str> = items.iter().map(|item| item.region.as_str()).collect();
        assert_eq!(
            item_regions,
            vec!["us-east-1", "us-east-1", "us-west-2", "us-west-2"]
        );
        assert!(items.iter().all(|item| item.days == 14));
    }

    #[test]
    fn missing_regions_resolve_enabled_regions_with_default_window() {
        let regions = CountingRegions::new(&["eu-central-1"]);
        let queue = CapturingQueue::new();

        handle_discovery_event(json!({}), &regions, &StaticCatalog, &queue)
            .expect("discovery should succeed");

        assert_eq!(regions.calls(), 1);
        let items = queue.items();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|item| item.region == "eu-central-1"));
        assert!(items.iter().all(|item| item.days == 30));
    }

    #[test]
    fn null_event_behaves_like_empty_payload() {
        let regions = CountingRegions::new(&["sa-east-1"]);
        let queue = CapturingQueue::new();

        let summary = handle_discovery_event(Value::Null, &regions, &StaticCatalog, &queue)
            .expect("discovery should succeed");

        assert_eq!(summary.work_items_enqueued, 2);
    }

    #[test]
    fn log_group_comes_from_logging_config_and_first_architecture_wins() {
        let regions = CountingRegions::new(&[]);
        let queue = CapturingQueue::new();

        handle_discovery_event(
            json!({"regions": "us-east-1"}),
            &regions,
            &StaticCatalog,
            &queue,
        )
        .expect("discovery should succeed");

        let items = queue.items();
        assert_eq!(items[0].log_group_name, "/custom/us-east-1-api");
        assert_eq!(items[0].architecture, Architecture::Arm64);
        assert_eq!(items[1].architecture, Architecture::X86_64);
    }

    #[test]
    fn region_listing_failure_stops_remaining_regions() {
        let regions = CountingRegions::new(&[]);
        let queue = CapturingQueue::new();

        let error = handle_discovery_event(
            json!({"regions": "us-east-1,ap-south-2,eu-west-1"}),
            &regions,
            &StaticCatalog,
            &queue,
        )
        .expect_err("listing failure should abort");

        assert!(matches!(error, DiscoveryError::FunctionListing(_)));
        let items = queue.items();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|item| item.region == "us-east-1"));
    }

    #[test]
    fn enqueue_failure_is_fatal() {
        let regions = CountingRegions::new(&[]);
        let failing_queue = |_: &str| -> Result<(), String> { Err("throttled".to_string()) };

        let error = handle_discovery_event(
            json!({"regions": "us-east-1"}),
            &regions,
            &StaticCatalog,
            &failing_queue,
        )
        .expect_err("enqueue failure should abort");

        assert!(matches!(error, DiscoveryError::Enqueue { .. }));
        assert!(error.to_string().contains("throttled"));
    }

    #[test]
    fn function_without_log_group_is_rejected() {
        struct NoLoggingCatalog;

        impl FunctionCatalog for NoLoggingCatalog {
            fn list_functions(&self, _region: &str) -> Result<Vec<FunctionDescriptor>, String> {
                Ok(vec![FunctionDescriptor {
                    function_name: Some("legacy".to_string()),
                    log_group_name: None,
                    architectures: vec!["x86_64".to_string()],
                }])
            }
        }

        let regions = CountingRegions::new(&[]);
        let queue = CapturingQueue::new();
        let error = handle_discovery_event(
            json!({"regions": "us-east-1"}),
            &regions,
            &NoLoggingCatalog,
            &queue,
        )
        .expect_err("missing log group should fail");

        assert!(matches!(error, DiscoveryError::MissingLogGroup { .. }));
        assert!(queue.items().is_empty());
    }

    #[test]
    fn unnamed_function_is_rejected() {
        struct UnnamedCatalog;

        impl FunctionCatalog for UnnamedCatalog {
            fn list_functions(&self, _region: &str) -> Result<Vec<FunctionDescriptor>, String> {
                Ok(vec![FunctionDescriptor {
                    function_name: None,
                    log_group_name: Some("/aws/lambda/ghost".to_string()),
                    architectures: vec!["arm64".to_string()],
                }])
            }
        }

        let regions = CountingRegions::new(&[]);
        let queue = CapturingQueue::new();
        let error = handle_discovery_event(
            json!({"regions": "eu-north-1"}),
            &regions,
            &UnnamedCatalog,
            &queue,
        )
        .expect_err("unnamed function should fail");

        assert!(matches!(
            error,
            DiscoveryError::MissingFunctionName { ref region } if region == "eu-north-1"
        ));
        assert!(queue.items().is_empty());
    }

    #[test]
    fn days_beyond_log_retention_are_rejected() {
        let regions = CountingRegions::new(&[]);
        let queue = CapturingQueue::new();

        let error = handle_discovery_event(
            json!({"regions": "us-east-1", "days": 100_000_000}),
            &regions,
            &StaticCatalog,
            &queue,
        )
        .expect_err("oversized lookback should fail");

        assert!(matches!(error, DiscoveryError::InvalidRequest(_)));
        assert!(queue.items().is_empty());
    }

    #[test]
    fn rejects_invalid_days_without_listing() {
        let regions = CountingRegions::new(&["us-east-1"]);
        let queue = CapturingQueue::new();

        let error = handle_discovery_event(json!({"days": -3}), &regions, &StaticCatalog, &queue)
            .expect_err("negative days should fail");

        assert!(matches!(error, DiscoveryError::InvalidRequest(_)));
        assert_eq!(regions.calls(), 0);
        assert!(queue.items().is_empty());
    }
}
