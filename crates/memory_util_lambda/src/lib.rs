//! AWS-oriented adapters and handlers for the memory-utilization pipeline.
//!
//! This crate owns runtime integration details (Lambda handlers, service
//! adapters, environment configuration) and re-exports the domain crate as
//! `runtime` so binaries reach contracts through one module boundary.

pub mod adapters;
pub mod config;
pub mod handlers;
pub mod telemetry;

pub use memory_util_core as runtime;
