//! Block reader
//!
//! Turns an address cookie into a verified block:
//!
//! 1. decode the cookie and resolve the owning handle
//! 2. fill the buffer from the chunk cache or a direct positioned read
//! 3. compare the header checksum with the cookie, then recompute the
//!    content checksum with the header field zeroed
//! 4. on success normalize the page header in place
//!
//! A content mismatch on bytes served by the chunk cache is treated as a
//! stale chunk: the chunk is invalidated and the block re-read directly, once.
//! Anything else that fails verification is corruption. Corruption is
//! recoverable only for handles in verify mode or quiet sessions; an ordinary
//! read of a corrupt block panics.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, warn};

use super::buffer::BlockBuffer;
use super::checksum::{Checksum, Crc32};
use super::chunk_cache::ChunkCache;
use super::cookie::AddressCookie;
use super::corruption::{dump_block, CorruptionState};
use super::errors::{BlockError, BlockErrorCode, BlockResult};
use super::handle::{BlockHandle, HandleGuard, HandleProvider, HandleRegistry};
use super::header::{BlockHeader, PageHeader};
use crate::config::EngineConfig;
use crate::observability::{DiagnosticSink, MetricsRegistry, TracingSink};

/// Per-caller read context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadSession {
    quiet_corrupt: bool,
}

impl ReadSession {
    /// An ordinary session: corruption is reported and fatal.
    pub fn new() -> Self {
        Self::default()
    }

    /// A session that suppresses corruption reports and gets `ChecksumError` back instead.
    pub fn quiet() -> Self {
        Self { quiet_corrupt: true }
    }

    pub fn with_quiet_corrupt(mut self, quiet: bool) -> Self {
        self.quiet_corrupt = quiet;
        self
    }

    pub fn is_quiet_corrupt(&self) -> bool {
        self.quiet_corrupt
    }
}

enum Verdict {
    Verified,
    HeaderMismatch(String),
    ContentMismatch(String),
}

/// Verified block reads over one or more block stores.
pub struct BlockManager {
    handle: Arc<BlockHandle>,
    provider: Option<Arc<dyn HandleProvider>>,
    cache: Option<Arc<ChunkCache>>,
    checksum: Arc<dyn Checksum>,
    corruption: CorruptionState,
    sink: Arc<dyn DiagnosticSink>,
    metrics: Arc<MetricsRegistry>,
}

impl BlockManager {
    /// Creates a single-handle reader with CRC32 checksums and no chunk cache.
    pub fn new(handle: Arc<BlockHandle>) -> Self {
        Self {
            handle,
            provider: None,
            cache: None,
            checksum: Arc::new(Crc32),
            corruption: CorruptionState::new(),
            sink: Arc::new(TracingSink),
            metrics: Arc::new(MetricsRegistry::new()),
        }
    }

    /// Opens the block file at `path` as `object_id` and applies `config`.
    ///
    /// In multi-handle mode, other object ids resolve to sibling files named
    /// `<file name>.<object id, ten digits>`.
    pub fn open(path: &Path, object_id: u32, config: &EngineConfig) -> BlockResult<Self> {
        let unit = config.allocation_unit_size;
        let handle = BlockHandle::open_file(path, object_id, unit)?;
        let mut manager = if config.multi_handle {
            let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
            let prefix = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let registry = HandleRegistry::directory(dir, prefix, unit);
            let primary = registry.register(handle);
            Self::new(primary).with_provider(Arc::new(registry))
        } else {
            Self::new(Arc::new(handle))
        };
        if config.chunk_cache.enabled {
            manager = manager.with_chunk_cache(Arc::new(ChunkCache::new(
                config.chunk_cache.capacity_bytes,
            )));
        }
        Ok(manager)
    }

    /// Resolves handles per cookie through `provider`.
    pub fn with_provider(mut self, provider: Arc<dyn HandleProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Consults `cache` before reading directly.
    pub fn with_chunk_cache(mut self, cache: Arc<ChunkCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_checksum(mut self, checksum: Arc<dyn Checksum>) -> Self {
        self.checksum = checksum;
        self
    }

    /// Shares a corruption flag with other components.
    pub fn with_corruption_state(mut self, state: CorruptionState) -> Self {
        self.corruption = state;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    /// The primary handle.
    pub fn handle(&self) -> &Arc<BlockHandle> {
        &self.handle
    }

    /// Puts the primary handle, and in multi-handle mode every handle the
    /// provider serves, into or out of verify mode.
    pub fn set_verify(&self, verify: bool) {
        self.handle.set_verify(verify);
        if let Some(provider) = &self.provider {
            provider.set_verify(verify);
        }
    }

    pub fn chunk_cache(&self) -> Option<&Arc<ChunkCache>> {
        self.cache.as_ref()
    }

    pub fn corruption_state(&self) -> &CorruptionState {
        &self.corruption
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Returns true when reads resolve handles per object id.
    pub fn is_multi_handle(&self) -> bool {
        self.provider.is_some()
    }

    /// Reads and verifies the block addressed by the encoded `cookie` into `buf`.
    pub fn read(&self, session: &ReadSession, cookie: &[u8], buf: &mut BlockBuffer) -> BlockResult<()> {
        let cookie = AddressCookie::decode(cookie)?;
        self.read_cookie(session, &cookie, buf)
    }

    /// `read` for an already decoded cookie.
    pub fn read_cookie(
        &self,
        session: &ReadSession,
        cookie: &AddressCookie,
        buf: &mut BlockBuffer,
    ) -> BlockResult<()> {
        if cookie.offset < 0 {
            return Err(BlockError::malformed_cookie(format!(
                "negative block offset {}",
                cookie.offset
            )));
        }
        self.with_handle(cookie.object_id, |handle| {
            self.read_from(handle, session, cookie, buf)
        })
    }

    /// Re-reads the block and dumps its content whatever the session settings.
    ///
    /// The read itself runs quietly so a corrupt block is reported rather
    /// than fatal; its error, if any, is returned after the dump.
    pub fn read_corrupt_report(&self, cookie: &[u8]) -> BlockResult<()> {
        let cookie = AddressCookie::decode(cookie)?;
        let mut buf = BlockBuffer::new();
        let result = self.read_cookie(&ReadSession::quiet(), &cookie, &mut buf);
        dump_block(self.sink.as_ref(), &cookie, buf.as_slice());
        result
    }

    /// Reads the leading allocation unit at a raw `offset` and returns the
    /// header's declared `(disk_size, checksum)` without verifying anything.
    #[cfg(any(test, feature = "diagnostic"))]
    pub fn read_raw_header_probe(&self, object_id: u32, offset: u64) -> BlockResult<(u32, u32)> {
        self.with_handle(object_id, |handle| {
            let mut buf = BlockBuffer::new();
            buf.prepare(handle.allocation_unit_size() as usize);
            handle.read_at(offset, buf.as_mut_slice())?;
            let header = BlockHeader::from_canonical(buf.as_slice());
            debug!(
                store = handle.name(),
                offset,
                disk_size = header.disk_size,
                checksum = header.checksum,
                "block.probe"
            );
            Ok((header.disk_size, header.checksum))
        })
    }

    fn with_handle<T>(
        &self,
        object_id: u32,
        f: impl FnOnce(&BlockHandle) -> BlockResult<T>,
    ) -> BlockResult<T> {
        match &self.provider {
            Some(provider) => {
                let guard = HandleGuard::acquire(provider.as_ref(), object_id)?;
                f(&guard)
            }
            None => f(&self.handle),
        }
    }

    fn read_from(
        &self,
        handle: &BlockHandle,
        session: &ReadSession,
        cookie: &AddressCookie,
        buf: &mut BlockBuffer,
    ) -> BlockResult<()> {
        debug!(
            store = handle.name(),
            off = cookie.offset,
            size = cookie.size,
            checksum = cookie.checksum,
            "block.read"
        );

        let unit = handle.allocation_unit_size();
        if cookie.size < unit {
            return Err(BlockError::invalid_block_size(handle.name(), cookie.size, unit));
        }

        buf.prepare(cookie.size as usize);
        let from_cache = self.fill(handle, cookie, buf)?;
        self.metrics.record_block_read(u64::from(cookie.size));

        let message = match (self.verify(handle, cookie, buf), &self.cache) {
            (Verdict::Verified, _) => {
                PageHeader::byteswap_in_place(buf.as_mut_slice());
                return Ok(());
            }
            // A content mismatch on cached bytes is a stale chunk: retry directly, once.
            (Verdict::ContentMismatch(_), Some(cache)) if from_cache => {
                cache.invalidate(cookie.object_id, cookie.offset, cookie.size);
                self.metrics.increment_cache_stale_retries();
                warn!(
                    store = handle.name(),
                    off = cookie.offset,
                    size = cookie.size,
                    "block.cache_stale"
                );
                handle.read_at(cookie.offset as u64, buf.as_mut_slice())?;
                match self.verify(handle, cookie, buf) {
                    Verdict::Verified => {
                        PageHeader::byteswap_in_place(buf.as_mut_slice());
                        return Ok(());
                    }
                    Verdict::HeaderMismatch(message) | Verdict::ContentMismatch(message) => message,
                }
            }
            (Verdict::HeaderMismatch(message), _) | (Verdict::ContentMismatch(message), _) => message,
        };

        self.corrupt(handle, session, cookie, buf, &message)
    }

    /// Returns true if `buf` was filled by the chunk cache.
    fn fill(&self, handle: &BlockHandle, cookie: &AddressCookie, buf: &mut BlockBuffer) -> BlockResult<bool> {
        if let Some(cache) = &self.cache {
            match cache.get(
                handle,
                cookie.object_id,
                cookie.offset,
                cookie.size,
                buf.as_mut_slice(),
            ) {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) if e.code() == BlockErrorCode::CacheCapacityExceeded => {
                    debug!(size = cookie.size, "chunk_cache.full");
                }
                Err(e) => return Err(e),
            }
        }
        handle.read_at(cookie.offset as u64, buf.as_mut_slice())?;
        Ok(false)
    }

    fn verify(&self, handle: &BlockHandle, cookie: &AddressCookie, buf: &mut BlockBuffer) -> Verdict {
        let header = BlockHeader::from_canonical(buf.as_slice());
        if header.checksum != cookie.checksum {
            return Verdict::HeaderMismatch(format!(
                "{}: read checksum error for {}B block at offset {}: block header checksum of {:#x} doesn't match expected checksum of {:#x}",
                handle.name(),
                cookie.size,
                cookie.offset,
                header.checksum,
                cookie.checksum
            ));
        }

        let block = buf.as_mut_slice();
        BlockHeader::clear_checksum(block);
        let len = header.checksum_len(block.len());
        if self.checksum.matches(&block[..len], cookie.checksum) {
            return Verdict::Verified;
        }
        Verdict::ContentMismatch(format!(
            "{}: read checksum error for {}B block at offset {}: calculated block checksum of {:#x} doesn't match expected checksum of {:#x}",
            handle.name(),
            cookie.size,
            cookie.offset,
            self.checksum.compute(&block[..len]),
            cookie.checksum
        ))
    }

    fn corrupt(
        &self,
        handle: &BlockHandle,
        session: &ReadSession,
        cookie: &AddressCookie,
        buf: &BlockBuffer,
        message: &str,
    ) -> BlockResult<()> {
        if !session.is_quiet_corrupt() {
            error!(
                store = handle.name(),
                off = cookie.offset,
                size = cookie.size,
                checksum = cookie.checksum,
                "block.corrupt"
            );
            self.sink.report(message);
            dump_block(self.sink.as_ref(), cookie, buf.as_slice());
        }
        self.corruption.mark();
        self.metrics.increment_checksum_failures();

        if handle.is_verifying() || session.is_quiet_corrupt() {
            return Err(BlockError::checksum_error(
                handle.name(),
                cookie.offset,
                cookie.size,
                cookie.checksum,
            ));
        }
        panic!(
            "{}: fatal read error: [{}] block {}",
            handle.name(),
            BlockErrorCode::FatalCorruption.code(),
            cookie
        );
    }
}

impl std::fmt::Debug for BlockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockManager")
            .field("handle", &self.handle)
            .field("multi_handle", &self.provider.is_some())
            .field("chunk_cache", &self.cache.is_some())
            .finish()
    }
}
