use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use memory_util_lambda::adapters::clock::Clock;
use memory_util_lambda::adapters::functions::{FunctionCatalog, FunctionDescriptor};
use memory_util_lambda::adapters::log_insights::{
    LogQueryService, QueryResultsPage, QueryStatus, StartQueryError,
};
use memory_util_lambda::adapters::queue::WorkQueue;
use memory_util_lambda::adapters::regions::RegionDirectory;
use memory_util_lambda::adapters::sink::RecordSink;
use memory_util_lambda::config::PollSettings;
use memory_util_lambda::handlers::discovery::handle_discovery_event;
use memory_util_lambda::handlers::metrics::{handle_metrics_event, MetricsHandlerConfig};
use memory_util_lambda::runtime::contract::{Architecture, MetricsRecord, WorkItem};
use memory_util_lambda::runtime::query::{QueryWindow, ResultField};
use serde_json::{json, Value};

struct NoRegionLookup;

impl RegionDirectory for NoRegionLookup {
    fn enabled_regions(&self) -> Result<Vec<String>, String> {
        panic!("explicit regions must not trigger a region lookup")
    }
}

struct FleetCatalog;

impl FunctionCatalog for FleetCatalog {
    fn list_functions(&self, region: &str) -> Result<Vec<FunctionDescriptor>, String> {
        let functions = match region {
            "us-east-1" => vec![
                ("payments", Some("/aws/lambda/payments"), "x86_64"),
                ("thumbnails", Some("/teams/media/thumbnails"), "arm64"),
            ],
            "us-west-2" => vec![
                ("nightly-report", Some("/aws/lambda/nightly-report"), "x86_64"),
                ("retired", Some("/aws/lambda/retired"), "x86_64"),
            ],
            _ => Vec::new(),
        };

        Ok(functions
            .into_iter()
            .map(|(name, log_group, architecture)| FunctionDescriptor {
                function_name: Some(name.to_string()),
                log_group_name: log_group.map(str::to_string),
                architectures: vec![architecture.to_string()],
            })
            .collect())
    }
}

#[derive(Default)]
struct MemoryQueue {
    bodies: Mutex<Vec<String>>,
}

impl WorkQueue for MemoryQueue {
    fn send_message(&self, body: &str) -> Result<(), String> {
        self.bodies.lock().expect("poisoned mutex").push(body.to_string());
        Ok(())
    }
}

impl MemoryQueue {
    fn as_sqs_event(&self) -> Value {
        let records: Vec<Value> = self
            .bodies
            .lock()
            .expect("poisoned mutex")
            .iter()
            .enumerate()
            .map(|(index, body)| {
                json!({
                    "messageId": format!("msg-{index}"),
                    "eventSource": "aws:sqs",
                    "body": body,
                })
            })
            .collect();
        json!({ "Records": records })
    }

    fn items(&self) -> Vec<WorkItem> {
        self.bodies
            .lock()
            .expect("poisoned mutex")
            .iter()
            .map(|body| serde_json::from_str(body).expect("work item parses"))
            .collect()
    }
}

/// Completes every query on first poll. `retired` never logged anything and
/// `nightly-report` had no invocations in the window.
struct FleetLogs;

impl LogQueryService for FleetLogs {
    fn start_query(
        &self,
        _region: &str,
        log_group_name: &str,
        _query: &str,
        _window: QueryWindow,
    ) -> Result<String, StartQueryError> {
        if log_group_name == "/aws/lambda/retired" {
            return Err(StartQueryError::LogGroupNotFound {
                log_group_name: log_group_name.to_string(),
            });
        }
        Ok(log_group_name.to_string())
    }

    fn query_results(&self, _region: &str, query_id: &str) -> Result<QueryResultsPage, String> {
        let rows = match query_id {
            "/aws/lambda/payments" => vec![stats_row(512, 100, "2000.0", 1000)],
            "/teams/media/thumbnails" => vec![stats_row(256, 200, "150.5", 40_000)],
            _ => Vec::new(),
        };
        Ok(QueryResultsPage {
            status: QueryStatus::Complete,
            rows,
        })
    }
}

fn stats_row(provisioned: i64, over: i64, duration: &str, invocations: i64) -> Vec<ResultField> {
    vec![
        ResultField::new("provisioned_memory_mb", provisioned.to_string()),
        ResultField::new("min_memory_used_mb", "40"),
        ResultField::new("avg_memory_used_mb", "51.75"),
        ResultField::new("max_memory_used_mb", (provisioned - over).to_string()),
        ResultField::new("over_provisioned_memory_mb", over.to_string()),
        ResultField::new("avg_billed_duration_ms", duration),
        ResultField::new("invocations", invocations.to_string()),
    ]
}

#[derive(Default)]
struct MemorySink {
    bodies: Mutex<Vec<Vec<u8>>>,
}

impl RecordSink for MemorySink {
    fn put_record(&self, data: &[u8]) -> Result<(), String> {
        self.bodies.lock().expect("poisoned mutex").push(data.to_vec());
        Ok(())
    }
}

impl MemorySink {
    fn records(&self) -> Vec<MetricsRecord> {
        self.bodies
            .lock()
            .expect("poisoned mutex")
            .iter()
            .map(|body| {
                assert_eq!(body.last(), Some(&b'\n'), "records are newline-delimited");
                serde_json::from_slice(body).expect("record parses")
            })
            .collect()
    }
}

struct FrozenClock(DateTime<Utc>);

impl Clock for FrozenClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }

    fn sleep(&self, _duration: Duration) {}
}

#[test]
fn discovery_output_drives_metrics_stage_end_to_end() {
    let queue = MemoryQueue::default();
    let summary = handle_discovery_event(
        json!({"regions": "us-east-1,us-west-2", "days": 14}),
        &NoRegionLookup,
        &FleetCatalog,
        &queue,
    )
    .expect("discovery should succeed");
    assert_eq!(summary.work_items_enqueued, 4);

    let clock = FrozenClock(Utc.with_ymd_and_hms(2026, 10, 19, 23, 59, 0).unwrap());
    let config = MetricsHandlerConfig::for_invocation(clock.now(), PollSettings::default());
    let sink = MemorySink::default();

    let batch = handle_metrics_event(&queue.as_sqs_event(), &config, &clock, &FleetLogs, &sink)
        .expect("metrics batch should succeed");

    assert_eq!(batch.records_received, 4);
    assert_eq!(batch.records_delivered, 2);
    assert_eq!(batch.items_skipped, 2);

    let records = sink.records();
    let names: Vec<&str> = records
        .iter()
        .map(|record| record.function_name.as_str())
        .collect();
    assert_eq!(names, vec!["payments", "thumbnails"]);

    let payments = &records[0];
    assert_eq!(payments.metric_collection_date, "2026-10-19");
    assert_eq!(payments.architecture, Architecture::X86_64);
    assert!((payments.potential_savings - 0.003333).abs() < 1e-6);

    let thumbnails = &records[1];
    assert_eq!(thumbnails.log_group_name, "/teams/media/thumbnails");
    assert_eq!(thumbnails.architecture, Architecture::Arm64);
    assert_eq!(thumbnails.over_provisioned_memory_mb, 128);
    let expected = (128.0 / 1000.0) * (150.5 / 1000.0) * 0.0000133334 * 40_000.0;
    assert!((thumbnails.potential_savings - expected).abs() < 1e-12);
}

#[test]
fn queued_work_items_round_trip_unchanged() {
    let queue = MemoryQueue::default();
    handle_discovery_event(
        json!({"regions": "us-east-1", "days": 3}),
        &NoRegionLookup,
        &FleetCatalog,
        &queue,
    )
    .expect("discovery should succeed");

    let items = queue.items();
    assert_eq!(
        items[1],
        WorkItem {
            function_name: "thumbnails".to_string(),
            log_group_name: "/teams/media/thumbnails".to_string(),
            architecture: Architecture::Arm64,
            region: "us-east-1".to_string(),
            days: 3,
        }
    );
}
