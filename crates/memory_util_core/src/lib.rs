//! Shared memory-utilization domain primitives.
//!
//! This crate owns the queue and sink contracts, the Logs Insights query and
//! its result extraction, and the savings arithmetic. It intentionally
//! excludes AWS SDK and Lambda runtime concerns.

pub mod contract;
pub mod estimate;
pub mod query;
pub mod schema;
