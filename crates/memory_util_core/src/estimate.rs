use thiserror::Error;

use crate::contract::{Architecture, MetricsRecord, WorkItem};
use crate::query::MemoryUtilization;

/// Smallest memory size Lambda will allocate.
pub const MIN_PROVISIONED_MEMORY_MB: i64 = 128;
pub const X86_64_COST_PER_GB_SECOND: f64 = 0.0000166667;
pub const ARM64_COST_PER_GB_SECOND: f64 = 0.0000133334;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no GB-second price for architecture '{architecture}'")]
pub struct UnsupportedArchitecture {
    pub architecture: String,
}

impl Architecture {
    pub fn cost_per_gb_second(&self) -> Result<f64, UnsupportedArchitecture> {
        match self {
            Self::X86_64 => Ok(X86_64_COST_PER_GB_SECOND),
            Self::Arm64 => Ok(ARM64_COST_PER_GB_SECOND),
            Self::Other(value) => Err(UnsupportedArchitecture {
                architecture: value.clone(),
            }),
        }
    }
}

/// Caps over-provisioning so the remaining allocation never drops below the
/// platform minimum.
pub fn clamp_over_provisioned(provisioned_memory_mb: i64, over_provisioned_memory_mb: i64) -> i64 {
    if provisioned_memory_mb - over_provisioned_memory_mb < MIN_PROVISIONED_MEMORY_MB {
        provisioned_memory_mb - MIN_PROVISIONED_MEMORY_MB
    } else {
        over_provisioned_memory_mb
    }
}

/// Over-provisioned GB x billed seconds x unit cost x invocations.
pub fn potential_savings(
    over_provisioned_memory_mb: i64,
    avg_billed_duration_ms: f64,
    cost_per_gb_second: f64,
    invocations: i64,
) -> f64 {
    ((over_provisioned_memory_mb as f64 / 1000.0) * (avg_billed_duration_ms / 1000.0))
        * cost_per_gb_second
        * invocations as f64
}

/// Clamps the raw query result, prices it, and assembles the sink record.
pub fn build_metrics_record(
    item: &WorkItem,
    utilization: &MemoryUtilization,
    metric_collection_date: &str,
) -> Result<MetricsRecord, UnsupportedArchitecture> {
    let cost = item.architecture.cost_per_gb_second()?;
    let over_provisioned_memory_mb = clamp_over_provisioned(
        utilization.provisioned_memory_mb,
        utilization.over_provisioned_memory_mb,
    );

    Ok(MetricsRecord {
        function_name: item.function_name.clone(),
        log_group_name: item.log_group_name.clone(),
        architecture: item.architecture.clone(),
        metric_collection_date: metric_collection_date.to_string(),
        provisioned_memory_mb: utilization.provisioned_memory_mb,
        min_memory_used_mb: utilization.min_memory_used_mb,
        avg_memory_used_mb: utilization.avg_memory_used_mb,
        max_memory_used_mb: utilization.max_memory_used_mb,
        over_provisioned_memory_mb,
        avg_billed_duration_ms: utilization.avg_billed_duration_ms,
        invocations: utilization.invocations,
        potential_savings: potential_savings(
            over_provisioned_memory_mb,
            utilization.avg_billed_duration_ms,
            cost,
            utilization.invocations,
        ),
    })
}
