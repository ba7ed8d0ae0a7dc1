//! AWS SDK implementations of the adapter traits.
//!
//! Handlers are synchronous, so every call parks the current worker with
//! `block_in_place` and drives the SDK future on the ambient runtime. This
//! requires the multi-threaded tokio runtime.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use aws_config::SdkConfig;
use aws_sdk_account::types::RegionOptStatus;
use aws_sdk_cloudwatchlogs::types::QueryStatus as SdkQueryStatus;
use aws_sdk_firehose::primitives::Blob;
use aws_sdk_firehose::types::Record;
use memory_util_core::contract::{ENABLED_REGION_STATUSES, MAX_REGION_RESULTS};
use memory_util_core::query::{QueryWindow, ResultField};
use tracing::debug;

use super::functions::{FunctionCatalog, FunctionDescriptor};
use super::log_insights::{LogQueryService, QueryResultsPage, QueryStatus, StartQueryError};
use super::queue::WorkQueue;
use super::regions::RegionDirectory;
use super::sink::RecordSink;

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

pub struct AccountRegionDirectory {
    client: aws_sdk_account::Client,
}

impl AccountRegionDirectory {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_account::Client::new(sdk_config),
        }
    }
}

impl RegionDirectory for AccountRegionDirectory {
    fn enabled_regions(&self) -> Result<Vec<String>, String> {
        let mut request = self.client.list_regions().max_results(MAX_REGION_RESULTS);
        for status in ENABLED_REGION_STATUSES {
            request = request.region_opt_status_contains(RegionOptStatus::from(status));
        }

        let output = block_on(request.send()).map_err(|error| {
            format!(
                "failed to list enabled regions: {}",
                aws_sdk_account::error::DisplayErrorContext(&error)
            )
        })?;

        Ok(output
            .regions()
            .iter()
            .filter_map(|region| region.region_name().map(str::to_string))
            .collect())
    }
}

/// Lists functions with a client pinned to the region being scanned.
pub struct LambdaFunctionCatalog {
    sdk_config: SdkConfig,
}

impl LambdaFunctionCatalog {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            sdk_config: sdk_config.clone(),
        }
    }

    fn client_for(&self, region: &str) -> aws_sdk_lambda::Client {
        let config = aws_sdk_lambda::config::Builder::from(&self.sdk_config)
            .region(aws_sdk_lambda::config::Region::new(region.to_string()))
            .build();
        aws_sdk_lambda::Client::from_conf(config)
    }
}

impl FunctionCatalog for LambdaFunctionCatalog {
    fn list_functions(&self, region: &str) -> Result<Vec<FunctionDescriptor>, String> {
        let client = self.client_for(region);
        let functions = block_on(async move {
            client
                .list_functions()
                .into_paginator()
                .items()
                .send()
                .try_collect()
                .await
        })
        .map_err(|error| {
            format!(
                "failed to list functions in {region}: {}",
                aws_sdk_lambda::error::DisplayErrorContext(&error)
            )
        })?;

        Ok(functions
            .iter()
            .map(|function| FunctionDescriptor {
                function_name: function.function_name().map(str::to_string),
                log_group_name: function
                    .logging_config()
                    .and_then(|logging| logging.log_group())
                    .map(str::to_string),
                architectures: function
                    .architectures()
                    .iter()
                    .map(|architecture| architecture.as_str().to_string())
                    .collect(),
            })
            .collect())
    }
}

pub struct SqsWorkQueue {
    client: aws_sdk_sqs::Client,
    queue_url: String,
}

impl SqsWorkQueue {
    pub fn new(sdk_config: &SdkConfig, queue_url: impl Into<String>) -> Self {
        Self {
            client: aws_sdk_sqs::Client::new(sdk_config),
            queue_url: queue_url.into(),
        }
    }
}

impl WorkQueue for SqsWorkQueue {
    fn send_message(&self, body: &str) -> Result<(), String> {
        let request = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body);

        block_on(request.send()).map(|_| ()).map_err(|error| {
            format!(
                "failed to enqueue work item: {}",
                aws_sdk_sqs::error::DisplayErrorContext(&error)
            )
        })
    }
}

/// Runs Logs Insights queries in the region that owns each log group.
pub struct CloudWatchLogsQueryService {
    sdk_config: SdkConfig,
    clients: Mutex<HashMap<String, aws_sdk_cloudwatchlogs::Client>>,
}

impl CloudWatchLogsQueryService {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            sdk_config: sdk_config.clone(),
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn client_for(&self, region: &str) -> aws_sdk_cloudwatchlogs::Client {
        let mut clients = self
            .clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        clients
            .entry(region.to_string())
            .or_insert_with(|| {
                debug!(region, "creating cloudwatch logs client");
                let config = aws_sdk_cloudwatchlogs::config::Builder::from(&self.sdk_config)
                    .region(aws_sdk_cloudwatchlogs::config::Region::new(
                        region.to_string(),
                    ))
                    .build();
                aws_sdk_cloudwatchlogs::Client::from_conf(config)
            })
            .clone()
    }
}

impl LogQueryService for CloudWatchLogsQueryService {
    fn start_query(
        &self,
        region: &str,
        log_group_name: &str,
        query: &str,
        window: QueryWindow,
    ) -> Result<String, StartQueryError> {
        let request = self
            .client_for(region)
            .start_query()
            .log_group_name(log_group_name)
            .query_string(query)
            .start_time(window.start_time)
            .end_time(window.end_time);

        match block_on(request.send()) {
            Ok(output) => output.query_id().map(str::to_string).ok_or_else(|| {
                StartQueryError::Service("StartQuery response did not include a queryId".to_string())
            }),
            Err(error) => {
                let not_found = error
                    .as_service_error()
                    .is_some_and(|service_error| service_error.is_resource_not_found_exception());
                if not_found {
                    Err(StartQueryError::LogGroupNotFound {
                        log_group_name: log_group_name.to_string(),
                    })
                } else {
                    Err(StartQueryError::Service(format!(
                        "failed to start query on {log_group_name}: {}",
                        aws_sdk_cloudwatchlogs::error::DisplayErrorContext(&error)
                    )))
                }
            }
        }
    }

    fn query_results(&self, region: &str, query_id: &str) -> Result<QueryResultsPage, String> {
        let request = self.client_for(region).get_query_results().query_id(query_id);
        let output = block_on(request.send()).map_err(|error| {
            format!(
                "failed to fetch results for query {query_id}: {}",
                aws_sdk_cloudwatchlogs::error::DisplayErrorContext(&error)
            )
        })?;

        let status = match output.status() {
            Some(SdkQueryStatus::Scheduled) => QueryStatus::Scheduled,
            Some(SdkQueryStatus::Running) => QueryStatus::Running,
            Some(SdkQueryStatus::Complete) => QueryStatus::Complete,
            Some(SdkQueryStatus::Failed) => QueryStatus::Failed,
            Some(SdkQueryStatus::Cancelled) => QueryStatus::Cancelled,
            Some(SdkQueryStatus::Timeout) => QueryStatus::Timeout,
            _ => QueryStatus::Unknown,
        };

        let rows = output
            .results()
            .iter()
            .map(|row| {
                row.iter()
                    .filter_map(|cell| match (cell.field(), cell.value()) {
                        (Some(field), Some(value)) => Some(ResultField::new(field, value)),
                        _ => None,
                    })
                    .collect()
            })
            .collect();

        Ok(QueryResultsPage { status, rows })
    }
}

pub struct FirehoseRecordSink {
    client: aws_sdk_firehose::Client,
    delivery_stream: String,
}

impl FirehoseRecordSink {
    pub fn new(sdk_config: &SdkConfig, delivery_stream: impl Into<String>) -> Self {
        Self {
            client: aws_sdk_firehose::Client::new(sdk_config),
            delivery_stream: delivery_stream.into(),
        }
    }
}

impl RecordSink for FirehoseRecordSink {
    fn put_record(&self, data: &[u8]) -> Result<(), String> {
        let record = Record::builder()
            .data(Blob::new(data.to_vec()))
            .build()
            .map_err(|error| format!("failed to build firehose record: {error}"))?;
        let request = self
            .client
            .put_record()
            .delivery_stream_name(&self.delivery_stream)
            .record(record);

        block_on(request.send()).map(|_| ()).map_err(|error| {
            format!(
                "failed to put record on {}: {}",
                self.delivery_stream,
                aws_sdk_firehose::error::DisplayErrorContext(&error)
            )
        })
    }
}
