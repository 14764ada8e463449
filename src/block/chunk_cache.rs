//! Chunk cache
//!
//! An optional read-through cache of block content keyed by
//! `(object_id, offset, size)`, independent of the block handles themselves.
//!
//! The cache never blocks a reader. Lock contention is reported as a decline
//! and the caller reads directly; a chunk that can never fit is reported as
//! `CacheCapacityExceeded`, which the reader also downgrades to a direct read.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use super::errors::{BlockError, BlockResult};
use super::handle::BlockHandle;

/// Cache key for one block's content.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChunkKey {
    /// Object holding the block
    pub object_id: u32,
    /// Byte offset of the block
    pub offset: i64,
    /// Block size
    pub size: u32,
}

struct ChunkState {
    chunks: LruCache<ChunkKey, Arc<[u8]>>,
    used_bytes: u64,
}

/// Byte-bounded LRU chunk cache.
pub struct ChunkCache {
    state: Mutex<ChunkState>,
    capacity_bytes: u64,
    hits: AtomicU64,
    misses: AtomicU64,
    declined: AtomicU64,
    full: AtomicU64,
    invalidations: AtomicU64,
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkCacheStats {
    /// Reads served from cached chunks
    pub hits: u64,
    /// Reads sourced from the backing handle and inserted
    pub misses: u64,
    /// Reads declined because the cache was busy
    pub declined: u64,
    /// Reads rejected because the chunk cannot fit
    pub full: u64,
    /// Chunks dropped after failing validation
    pub invalidations: u64,
    /// Bytes currently cached
    pub used_bytes: u64,
    /// Chunks currently cached
    pub chunks: usize,
}

impl ChunkCache {
    /// Creates a cache holding at most `capacity_bytes` of chunk content.
    pub fn new(capacity_bytes: u64) -> Self {
        Self {
            state: Mutex::new(ChunkState {
                chunks: LruCache::unbounded(),
                used_bytes: 0,
            }),
            capacity_bytes,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            declined: AtomicU64::new(0),
            full: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    /// Configured capacity.
    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }

    /// Fills `dest` with the block at `(object_id, offset, size)`.
    ///
    /// Returns `Ok(true)` when `dest` was filled, either from a cached chunk
    /// or by sourcing the bytes from `handle` and caching them. Returns
    /// `Ok(false)` when the cache is busy and the caller must read directly.
    pub fn get(
        &self,
        handle: &BlockHandle,
        object_id: u32,
        offset: i64,
        size: u32,
        dest: &mut [u8],
    ) -> BlockResult<bool> {
        let key = ChunkKey {
            object_id,
            offset,
            size,
        };
        if u64::from(size) > self.capacity_bytes {
            self.full.fetch_add(1, Ordering::Relaxed);
            return Err(BlockError::cache_capacity_exceeded(size, self.capacity_bytes));
        }

        match self.state.try_lock() {
            Some(mut state) => {
                if let Some(chunk) = state.chunks.get(&key) {
                    dest.copy_from_slice(chunk);
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(true);
                }
            }
            None => {
                self.declined.fetch_add(1, Ordering::Relaxed);
                return Ok(false);
            }
        }

        // Source outside the lock; a concurrent insert of the same chunk is harmless.
        handle.read_at(offset as u64, dest)?;
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.insert(key, dest);
        Ok(true)
    }

    fn insert(&self, key: ChunkKey, bytes: &[u8]) {
        let Some(mut state) = self.state.try_lock() else {
            self.declined.fetch_add(1, Ordering::Relaxed);
            return;
        };
        let chunk: Arc<[u8]> = Arc::from(bytes);
        if let Some(old) = state.chunks.put(key, chunk) {
            state.used_bytes -= old.len() as u64;
        }
        state.used_bytes += bytes.len() as u64;
        while state.used_bytes > self.capacity_bytes {
            match state.chunks.pop_lru() {
                Some((evicted, chunk)) => {
                    state.used_bytes -= chunk.len() as u64;
                    debug!(
                        object_id = evicted.object_id,
                        offset = evicted.offset,
                        size = evicted.size,
                        "chunk_cache.evict"
                    );
                }
                None => break,
            }
        }
    }

    /// Drops the cached chunk for `(object_id, offset, size)`, if any.
    ///
    /// Waits for the cache lock: a stale chunk must not survive invalidation.
    pub fn invalidate(&self, object_id: u32, offset: i64, size: u32) -> bool {
        let key = ChunkKey {
            object_id,
            offset,
            size,
        };
        let mut state = self.state.lock();
        match state.chunks.pop(&key) {
            Some(chunk) => {
                state.used_bytes -= chunk.len() as u64;
                self.invalidations.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Returns true if the chunk is cached.
    pub fn contains(&self, object_id: u32, offset: i64, size: u32) -> bool {
        self.state.lock().chunks.contains(&ChunkKey {
            object_id,
            offset,
            size,
        })
    }

    /// Current counters.
    pub fn stats(&self) -> ChunkCacheStats {
        let state = self.state.lock();
        ChunkCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            declined: self.declined.load(Ordering::Relaxed),
            full: self.full.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            used_bytes: state.used_bytes,
            chunks: state.chunks.len(),
        }
    }
}
