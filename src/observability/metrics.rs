//! Engine counters
//!
//! Counters only, monotonically increasing, reset only on process start.
//! Relaxed ordering throughout.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Read-path and transaction counters.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    block_reads: AtomicU64,
    block_bytes_read: AtomicU64,
    checksum_failures: AtomicU64,
    cache_stale_retries: AtomicU64,
    transactions_committed: AtomicU64,
    transactions_rolled_back: AtomicU64,
    checkpoints_created: AtomicU64,
}

impl MetricsRegistry {
    /// Create a registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one block read of `bytes`
    pub fn record_block_read(&self, bytes: u64) {
        self.block_reads.fetch_add(1, Ordering::Relaxed);
        self.block_bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Count a block that failed checksum validation
    pub fn increment_checksum_failures(&self) {
        self.checksum_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a direct re-read after a stale chunk-cache hit
    pub fn increment_cache_stale_retries(&self) {
        self.cache_stale_retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a committed transaction
    pub fn increment_commits(&self) {
        self.transactions_committed.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a rolled back transaction
    pub fn increment_rollbacks(&self) {
        self.transactions_rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a created checkpoint
    pub fn increment_checkpoints(&self) {
        self.checkpoints_created.fetch_add(1, Ordering::Relaxed);
    }

    /// All counters at this instant
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            block_reads: self.block_reads.load(Ordering::Relaxed),
            block_bytes_read: self.block_bytes_read.load(Ordering::Relaxed),
            checksum_failures: self.checksum_failures.load(Ordering::Relaxed),
            cache_stale_retries: self.cache_stale_retries.load(Ordering::Relaxed),
            transactions_committed: self.transactions_committed.load(Ordering::Relaxed),
            transactions_rolled_back: self.transactions_rolled_back.load(Ordering::Relaxed),
            checkpoints_created: self.checkpoints_created.load(Ordering::Relaxed),
        }
    }

    /// Counters as a JSON object
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A point-in-time copy of all counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub block_reads: u64,
    pub block_bytes_read: u64,
    pub checksum_failures: u64,
    pub cache_stale_retries: u64,
    pub transactions_committed: u64,
    pub transactions_rolled_back: u64,
    pub checkpoints_created: u64,
}
