//! Observability
//!
//! - Structured logging through `tracing`
//! - Diagnostic sinks for corruption reports
//! - Monotonic counters for the read path, transactions and checkpoints
//!
//! Observability is read-only: nothing here influences what a read returns.

mod logger;
mod metrics;

pub use logger::{init_tracing, DiagnosticSink, MemorySink, TracingSink, LOG_FILTER_ENV};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
