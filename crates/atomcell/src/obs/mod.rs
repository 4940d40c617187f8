//! Observability: thread-local counters and the failure sink boundary.
//!
//! This module never touches cell internals directly; commit and watch logic
//! report into it and nothing flows back.

pub(crate) mod metrics;
pub(crate) mod sink;

// re-exports
pub use metrics::{MetricsReport, OpCounters, WatchCounters, metrics_report, metrics_reset};
pub use sink::{FailureSink, with_sink};
