use chrono::{DateTime, Utc};
use memory_util_core::contract::WorkItem;
use memory_util_core::estimate::{build_metrics_record, UnsupportedArchitecture};
use memory_util_core::query::{
    LookbackOutOfRange, MemoryUtilization, QueryWindow, ResultField, ResultFieldError,
    MEMORY_UTILIZATION_QUERY,
};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::adapters::clock::Clock;
use crate::adapters::log_insights::{LogQueryService, QueryStatus, StartQueryError};
use crate::adapters::sink::RecordSink;
use crate::config::PollSettings;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("invalid SQS event: {0}")]
    InvalidEvent(String),
    #[error("invalid work item in record {index}: {message}")]
    InvalidWorkItem { index: usize, message: String },
    #[error("cannot query function '{function_name}': {source}")]
    LookbackWindow {
        function_name: String,
        #[source]
        source: LookbackOutOfRange,
    },
    #[error("{0}")]
    QuerySubmission(String),
    #[error("{0}")]
    QueryResults(String),
    #[error("query {query_id} on {log_group_name} still running after {attempts} polls")]
    QueryTimeout {
        query_id: String,
        log_group_name: String,
        attempts: u32,
    },
    #[error("results for {log_group_name}: {source}")]
    ResultField {
        log_group_name: String,
        #[source]
        source: ResultFieldError,
    },
    #[error("cannot price function '{function_name}': {source}")]
    UnsupportedArchitecture {
        function_name: String,
        #[source]
        source: UnsupportedArchitecture,
    },
    #[error("failed to serialize metrics record: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{0}")]
    SinkDelivery(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsHandlerConfig {
    pub metric_collection_date: String,
    pub poll: PollSettings,
}

impl MetricsHandlerConfig {
    pub fn for_invocation(now: DateTime<Utc>, poll: PollSettings) -> Self {
        Self {
            metric_collection_date: now.format("%Y-%m-%d").to_string(),
            poll,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Delivered,
    LogGroupNotFound,
    NoResults,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub records_received: usize,
    pub records_delivered: usize,
    pub items_skipped: usize,
}

/// True when every record in the event came from an SQS event source.
pub fn is_sqs_event(event: &Value) -> bool {
    event
        .get("Records")
        .and_then(Value::as_array)
        .map(|records| {
            !records.is_empty()
                && records.iter().all(|record| {
                    record
                        .get("eventSource")
                        .and_then(Value::as_str)
                        .map(|source| source == "aws:sqs")
                        .unwrap_or(false)
                })
        })
        .unwrap_or(false)
}

/// Processes a batch of queued work items in delivery order.
///
/// The first fatal error aborts the batch; unprocessed records are left to
/// the queue's redelivery policy.
pub fn handle_metrics_event(
    event: &Value,
    config: &MetricsHandlerConfig,
    clock: &dyn Clock,
    logs: &dyn LogQueryService,
    sink: &dyn RecordSink,
) -> Result<BatchSummary, MetricsError> {
    let records = event
        .get("Records")
        .and_then(Value::as_array)
        .ok_or_else(|| MetricsError::InvalidEvent("event must include a Records array".into()))?;

    let mut summary = BatchSummary {
        records_received: records.len(),
        ..BatchSummary::default()
    };

    for (index, record) in records.iter().enumerate() {
        let item = decode_work_item(index, record)?;
        match process_work_item(&item, config, clock, logs, sink)? {
            ItemOutcome::Delivered => summary.records_delivered += 1,
            ItemOutcome::LogGroupNotFound | ItemOutcome::NoResults => summary.items_skipped += 1,
        }
    }

    info!(
        records_received = summary.records_received,
        records_delivered = summary.records_delivered,
        items_skipped = summary.items_skipped,
        "metrics batch completed"
    );
    Ok(summary)
}

fn decode_work_item(index: usize, record: &Value) -> Result<WorkItem, MetricsError> {
    let body = record
        .get("body")
        .and_then(Value::as_str)
        .ok_or_else(|| MetricsError::InvalidWorkItem {
            index,
            message: "SQS record body must be a string".to_string(),
        })?;

    serde_json::from_str(body).map_err(|error| MetricsError::InvalidWorkItem {
        index,
        message: error.to_string(),
    })
}

pub fn process_work_item(
    item: &WorkItem,
    config: &MetricsHandlerConfig,
    clock: &dyn Clock,
    logs: &dyn LogQueryService,
    sink: &dyn RecordSink,
) -> Result<ItemOutcome, MetricsError> {
    let window = QueryWindow::lookback(clock.now(), item.days).map_err(|source| {
        MetricsError::LookbackWindow {
            function_name: item.function_name.clone(),
            source,
        }
    })?;

    let query_id = match logs.start_query(
        &item.region,
        &item.log_group_name,
        MEMORY_UTILIZATION_QUERY,
        window,
    ) {
        Ok(query_id) => query_id,
        Err(StartQueryError::LogGroupNotFound { .. }) => {
            info!(
                log_group_name = %item.log_group_name,
                region = %item.region,
                "log group has no logs, skipping"
            );
            return Ok(ItemOutcome::LogGroupNotFound);
        }
        Err(StartQueryError::Service(message)) => {
            return Err(MetricsError::QuerySubmission(message));
        }
    };

    let Some(row) = await_first_row(item, &query_id, config.poll, clock, logs)? else {
        info!(
            function_name = %item.function_name,
            days = item.days,
            "no results returned from logs insights (try increasing days), skipping"
        );
        return Ok(ItemOutcome::NoResults);
    };

    let utilization =
        MemoryUtilization::from_row(&row).map_err(|source| MetricsError::ResultField {
            log_group_name: item.log_group_name.clone(),
            source,
        })?;
    let record = build_metrics_record(item, &utilization, &config.metric_collection_date)
        .map_err(|source| MetricsError::UnsupportedArchitecture {
            function_name: item.function_name.clone(),
            source,
        })?;

    let mut body = serde_json::to_vec(&record)?;
    body.push(b'\n');
    info!(
        function_name = %record.function_name,
        over_provisioned_memory_mb = record.over_provisioned_memory_mb,
        potential_savings = record.potential_savings,
        "computed memory metrics"
    );

    if let Err(message) = sink.put_record(&body) {
        error!(
            function_name = %record.function_name,
            error = %message,
            "failed putting record into delivery stream"
        );
        return Err(MetricsError::SinkDelivery(message));
    }
    info!(function_name = %record.function_name, "sent memory metrics to delivery stream");

    Ok(ItemOutcome::Delivered)
}

/// Waits out the query, then returns its first row if it produced any.
fn await_first_row(
    item: &WorkItem,
    query_id: &str,
    poll: PollSettings,
    clock: &dyn Clock,
    logs: &dyn LogQueryService,
) -> Result<Option<Vec<ResultField>>, MetricsError> {
    for attempt in 1..=poll.max_attempts {
        clock.sleep(poll.interval);
        info!(
            query_id,
            attempt,
            interval_secs = poll.interval.as_secs(),
            "waiting for query results"
        );

        let page = logs
            .query_results(&item.region, query_id)
            .map_err(MetricsError::QueryResults)?;
        if page.status.is_pending() {
            continue;
        }

        if page.status != QueryStatus::Complete {
            warn!(query_id, status = ?page.status, "query ended without completing");
        }
        return Ok(page.rows.into_iter().next());
    }

    Err(MetricsError::QueryTimeout {
        query_id: query_id.to_string(),
        log_group_name: item.log_group_name.clone(),
        attempts: poll.max_attempts,
    })
}
