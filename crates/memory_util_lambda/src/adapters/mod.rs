//! Service seams the handlers depend on.
//!
//! Handlers only see these synchronous traits; `aws` provides the SDK-backed
//! implementations used by the Lambda binaries.

pub mod aws;
pub mod clock;
pub mod functions;
pub mod log_insights;
pub mod queue;
pub mod regions;
pub mod sink;
