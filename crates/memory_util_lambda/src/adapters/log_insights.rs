use memory_util_core::query::{QueryWindow, ResultField};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Scheduled,
    Running,
    Complete,
    Failed,
    Cancelled,
    Timeout,
    Unknown,
}

impl QueryStatus {
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Scheduled | Self::Running)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResultsPage {
    pub status: QueryStatus,
    pub rows: Vec<Vec<ResultField>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartQueryError {
    #[error("log group '{log_group_name}' does not exist")]
    LogGroupNotFound { log_group_name: String },
    #[error("{0}")]
    Service(String),
}

pub trait LogQueryService {
    /// Submits `query` and returns the service-assigned query id.
    fn start_query(
        &self,
        region: &str,
        log_group_name: &str,
        query: &str,
        window: QueryWindow,
    ) -> Result<String, StartQueryError>;

    fn query_results(&self, region: &str, query_id: &str) -> Result<QueryResultsPage, String>;
}
