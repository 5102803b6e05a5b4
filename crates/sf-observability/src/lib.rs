//! # sf-observability
//!
//! Logging and metrics infrastructure for Sentinel Fuse.
//!
//! Provides structured logging built on the tracing ecosystem and metric
//! registration for the fusion, prioritization, and hunting engines.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, init_logging_with_config, LoggingConfig};
pub use metrics::register_metrics;
