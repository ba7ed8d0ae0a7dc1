use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// Logs Insights query over Lambda `REPORT` lines.
pub const MEMORY_UTILIZATION_QUERY: &str = r#"filter @type = "REPORT"
| stats max(@memorySize / 1000 / 1000) as provisioned_memory_mb,
min(@maxMemoryUsed / 1000 / 1000) as min_memory_used_mb,
avg(@maxMemoryUsed / 1000 / 1000) as avg_memory_used_mb,
max(@maxMemoryUsed / 1000 / 1000) as max_memory_used_mb,
provisioned_memory_mb - max_memory_used_mb as over_provisioned_memory_mb,
avg(@billedDuration) as avg_billed_duration_ms,
count(@requestId) as invocations"#;

pub const PROVISIONED_MEMORY_MB: &str = "provisioned_memory_mb";
pub const MIN_MEMORY_USED_MB: &str = "min_memory_used_mb";
pub const AVG_MEMORY_USED_MB: &str = "avg_memory_used_mb";
pub const MAX_MEMORY_USED_MB: &str = "max_memory_used_mb";
pub const OVER_PROVISIONED_MEMORY_MB: &str = "over_provisioned_memory_mb";
pub const AVG_BILLED_DURATION_MS: &str = "avg_billed_duration_ms";
pub const INVOCATIONS: &str = "invocations";

/// Inclusive query range in epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    pub start_time: i64,
    pub end_time: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("a {days}-day lookback from {now} falls outside the representable date range")]
pub struct LookbackOutOfRange {
    pub now: DateTime<Utc>,
    pub days: u32,
}

impl QueryWindow {
    pub fn lookback(now: DateTime<Utc>, days: u32) -> Result<Self, LookbackOutOfRange> {
        let start = now
            .checked_sub_signed(Duration::days(i64::from(days)))
            .ok_or(LookbackOutOfRange { now, days })?;
        Ok(Self {
            start_time: start.timestamp(),
            end_time: now.timestamp(),
        })
    }
}

/// One result cell as returned by `GetQueryResults`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultField {
    pub field: String,
    pub value: String,
}

impl ResultField {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResultFieldError {
    #[error("query result is missing field '{field}'")]
    Missing { field: &'static str },
    #[error("query result field '{field}' has non-numeric value '{value}'")]
    Invalid { field: &'static str, value: String },
}

/// Raw per-function statistics, before the minimum-memory clamp.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryUtilization {
    pub provisioned_memory_mb: i64,
    pub min_memory_used_mb: i64,
    pub avg_memory_used_mb: f64,
    pub max_memory_used_mb: i64,
    pub over_provisioned_memory_mb: i64,
    pub avg_billed_duration_ms: f64,
    pub invocations: i64,
}

impl MemoryUtilization {
    pub fn from_row(row: &[ResultField]) -> Result<Self, ResultFieldError> {
        Ok(Self {
            provisioned_memory_mb: integer_field(row, PROVISIONED_MEMORY_MB)?,
            min_memory_used_mb: integer_field(row, MIN_MEMORY_USED_MB)?,
            avg_memory_used_mb: float_field(row, AVG_MEMORY_USED_MB)?,
            max_memory_used_mb: integer_field(row, MAX_MEMORY_USED_MB)?,
            over_provisioned_memory_mb: integer_field(row, OVER_PROVISIONED_MEMORY_MB)?,
            avg_billed_duration_ms: float_field(row, AVG_BILLED_DURATION_MS)?,
            invocations: integer_field(row, INVOCATIONS)?,
        })
    }
}

fn raw_field<'a>(row: &'a [ResultField], field: &'static str) -> Result<&'a str, ResultFieldError> {
    row.iter()
        .find(|cell| cell.field == field)
        .map(|cell| cell.value.trim())
        .ok_or(ResultFieldError::Missing { field })
}

fn float_field(row: &[ResultField], field: &'static str) -> Result<f64, ResultFieldError> {
    let value = raw_field(row, field)?;
    value
        .parse::<f64>()
        .ok()
        .filter(|parsed| parsed.is_finite())
        .ok_or_else(|| ResultFieldError::Invalid {
            field,
            value: value.to_string(),
        })
}

// Insights renders some integer aggregates with a trailing ".0".
fn integer_field(row: &[ResultField], field: &'static str) -> Result<i64, ResultFieldError> {
    let value = raw_field(row, field)?;
    if let Ok(parsed) = value.parse::<i64>() {
        return Ok(parsed);
    }
    value
        .parse::<f64>()
        .ok()
        .filter(|parsed| parsed.is_finite() && parsed.fract() == 0.0)
        // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
        .filter(|parsed| *parsed >= i64::MIN as f64 && *parsed < i64::MAX as f64)
        .map(|parsed| parsed as i64)
        .ok_or_else(|| ResultFieldError::Invalid {
            field,
            value: value.to_string(),
        })
}
