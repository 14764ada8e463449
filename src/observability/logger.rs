//! Logging setup and the corruption diagnostic sink
//!
//! The library logs through `tracing` and never installs a subscriber; the
//! binary calls `init_tracing` once at startup. Corruption dumps go through a
//! `DiagnosticSink` so callers and tests can capture them.

use std::sync::Once;

use parking_lot::Mutex;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the configured log filter.
pub const LOG_FILTER_ENV: &str = "KEEL_LOG";

static INIT: Once = Once::new();

/// Installs a global fmt subscriber filtered by `KEEL_LOG`, falling back to `default_filter`.
///
/// Only the first call has any effect.
pub fn init_tracing(default_filter: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
            .or_else(|_| EnvFilter::try_new(default_filter))
            .unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    });
}

/// Receives formatted corruption-report lines.
pub trait DiagnosticSink: Send + Sync {
    /// Accepts one report line.
    fn report(&self, line: &str);
}

/// Emits report lines as `error!` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, line: &str) {
        error!(target: "keelstore::corruption", "{}", line);
    }
}

/// Collects report lines in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines reported so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Returns true if nothing was reported.
    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }
}

impl DiagnosticSink for MemorySink {
    fn report(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}
