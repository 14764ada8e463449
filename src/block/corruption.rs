//! Corruption state and diagnostic dumps
//!
//! Detecting a bad block flips a sticky, process-wide flag. The flag is an
//! explicit shared handle injected into every reader, so tests can observe
//! corruption without touching global state. There is no reset.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::cookie::AddressCookie;
use crate::observability::DiagnosticSink;

/// Bytes of block content per dump line.
pub const DUMP_CHUNK_SIZE: usize = 1024;

/// Shared "data corruption observed" flag.
#[derive(Debug, Clone, Default)]
pub struct CorruptionState {
    observed: Arc<AtomicBool>,
}

impl CorruptionState {
    /// Creates a clean state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that corruption was observed. One-way.
    pub fn mark(&self) {
        self.observed.store(true, Ordering::SeqCst);
    }

    /// Returns true once any reader sharing this state has seen corruption.
    pub fn is_corrupted(&self) -> bool {
        self.observed.load(Ordering::SeqCst)
    }
}

/// Writes `block` to `sink` as hex in 1KB chunks.
///
/// Each line is prefixed with the block location and `(chunk i of n)`.
pub fn dump_block(sink: &dyn DiagnosticSink, cookie: &AddressCookie, block: &[u8]) {
    if block.is_empty() {
        sink.report(&format!("{}: empty buffer, no dump available", cookie));
        return;
    }
    let nchunks = block.len().div_ceil(DUMP_CHUNK_SIZE);
    for (index, chunk) in block.chunks(DUMP_CHUNK_SIZE).enumerate() {
        sink.report(&format!(
            "{}: (chunk {} of {}): {}",
            cookie,
            index + 1,
            nchunks,
            hex::encode(chunk)
        ));
    }
}
