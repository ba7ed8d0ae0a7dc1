//! Environment configuration, resolved once when a binary starts.

use std::time::Duration;

use thiserror::Error;

pub const QUEUE_URL_VAR: &str = "SQS_QUEUE_URL";
pub const DELIVERY_STREAM_VAR: &str = "FIREHOSE_STREAM";
pub const POLL_INTERVAL_VAR: &str = "QUERY_POLL_INTERVAL_SECONDS";
pub const POLL_MAX_ATTEMPTS_VAR: &str = "QUERY_POLL_MAX_ATTEMPTS";

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{name} must be configured")]
    Missing { name: &'static str },
    #[error("{name}='{value}' is invalid: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// How long the metrics stage waits for a Logs Insights query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
        }
    }
}

impl PollSettings {
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let interval = match optional(lookup, POLL_INTERVAL_VAR) {
            None => DEFAULT_POLL_INTERVAL,
            Some(raw) => Duration::from_secs(parse_number(POLL_INTERVAL_VAR, &raw)?),
        };
        let max_attempts = match optional(lookup, POLL_MAX_ATTEMPTS_VAR) {
            None => DEFAULT_POLL_MAX_ATTEMPTS,
            Some(raw) => {
                let value: u32 = parse_number(POLL_MAX_ATTEMPTS_VAR, &raw)?;
                if value == 0 {
                    return Err(ConfigError::Invalid {
                        name: POLL_MAX_ATTEMPTS_VAR,
                        value: raw,
                        reason: "must be at least 1".to_string(),
                    });
                }
                value
            }
        };

        Ok(Self {
            interval,
            max_attempts,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    pub queue_url: String,
}

impl DiscoveryConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|name: &str| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            queue_url: required(lookup, QUEUE_URL_VAR)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsConfig {
    pub delivery_stream: String,
    pub poll: PollSettings,
}

impl MetricsConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|name: &str| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            delivery_stream: required(lookup, DELIVERY_STREAM_VAR)?,
            poll: PollSettings::from_lookup(lookup)?,
        })
    }
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    optional(lookup, name).ok_or(ConfigError::Missing { name })
}

fn parse_number<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|error: T::Err| ConfigError::Invalid {
        name,
        value: raw.to_string(),
        reason: error.to_string(),
    })
}
