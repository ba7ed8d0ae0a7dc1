use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_LOOKBACK_DAYS: u32 = 30;
/// Longest CloudWatch Logs retention period.
pub const MAX_LOOKBACK_DAYS: u32 = 3653;
pub const MAX_REGION_RESULTS: i32 = 50;
pub const ENABLED_REGION_STATUSES: [&str; 2] = ["ENABLED", "ENABLED_BY_DEFAULT"];

/// Instruction set a function runs on.
///
/// Values other than `x86_64` and `arm64` are kept verbatim so discovery can
/// forward every function; pricing rejects them later.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Architecture {
    #[default]
    X86_64,
    Arm64,
    Other(String),
}

impl Architecture {
    pub fn as_str(&self) -> &str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Arm64 => "arm64",
            Self::Other(value) => value,
        }
    }
}

impl From<String> for Architecture {
    fn from(value: String) -> Self {
        match value.as_str() {
            "x86_64" => Self::X86_64,
            "arm64" => Self::Arm64,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for Architecture {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<Architecture> for String {
    fn from(value: Architecture) -> Self {
        match value {
            Architecture::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One (function, region) unit of deferred analysis, carried as an SQS body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkItem {
    pub function_name: String,
    pub log_group_name: String,
    pub architecture: Architecture,
    pub region: String,
    pub days: u32,
}

/// Discovery invocation payload as delivered by the scheduler.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscoveryRequest {
    #[serde(default)]
    pub regions: Option<String>,
    #[serde(default)]
    pub days: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionSelection {
    AllEnabled,
    Explicit(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedDiscoveryRequest {
    pub regions: RegionSelection,
    pub days: u32,
}

/// Output row forwarded to the delivery stream, one per analysed function.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsRecord {
    pub function_name: String,
    pub log_group_name: String,
    pub architecture: Architecture,
    pub metric_collection_date: String,
    pub provisioned_memory_mb: i64,
    pub min_memory_used_mb: i64,
    pub avg_memory_used_mb: f64,
    pub max_memory_used_mb: i64,
    pub over_provisioned_memory_mb: i64,
    pub avg_billed_duration_ms: f64,
    pub invocations: i64,
    pub potential_savings: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn normalize_request(
    payload: DiscoveryRequest,
) -> Result<NormalizedDiscoveryRequest, ValidationError> {
    let days = match payload.days {
        None => DEFAULT_LOOKBACK_DAYS,
        Some(value) if value <= 0 => {
            return Err(ValidationError::new("days must be a positive integer"));
        }
        Some(value) => u32::try_from(value)
            .ok()
            .filter(|days| *days <= MAX_LOOKBACK_DAYS)
            .ok_or_else(|| {
                ValidationError::new(format!(
                    "days={value} exceeds the maximum lookback of {MAX_LOOKBACK_DAYS} days"
                ))
            })?,
    };

    let regions = match payload.regions.as_deref().map(str::trim) {
        None | Some("") => RegionSelection::AllEnabled,
        Some(raw) => {
            let regions: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|region| !region.is_empty())
                .map(str::to_string)
                .collect();
            if regions.is_empty() {
                return Err(ValidationError::new(
                    "regions must name at least one region",
                ));
            }
            RegionSelection::Explicit(regions)
        }
    };

    Ok(NormalizedDiscoveryRequest { regions, days })
}

pub fn stable_contract_json(value: impl Serialize) -> Result<String, serde_json::Error> {
    serde_json::to_string(&value)
}
