//! Block storage read path
//!
//! Maps address cookies to physical extents on one or more block stores and
//! returns checksum-verified block content.
//!
//! # Design Principles
//!
//! - Every read is checksum-verified, twice: header checksum against the
//!   cookie, then content checksum against the header
//! - The chunk cache is an optional accelerator; it never blocks and never
//!   turns a miss into an error
//! - Corruption is sticky and, outside verify or quiet mode, fatal
//! - Handle references are scoped and released on every exit path

mod buffer;
mod checksum;
mod chunk_cache;
mod cookie;
mod corruption;
mod errors;
mod handle;
mod header;
mod image;
mod reader;

pub use buffer::BlockBuffer;
pub use checksum::{Checksum, Crc32};
pub use chunk_cache::{ChunkCache, ChunkCacheStats, ChunkKey};
pub use cookie::AddressCookie;
pub use corruption::{dump_block, CorruptionState, DUMP_CHUNK_SIZE};
pub use errors::{BlockError, BlockErrorCode, BlockResult, Severity};
pub use handle::{
    BlockHandle, BlockIo, FileIo, HandleGuard, HandleProvider, HandleRegistry, MemoryIo,
};
pub use header::{
    BlockHeader, PageHeader, BLOCK_DATA_CKSUM, BLOCK_HEADER_AREA, BLOCK_HEADER_SIZE,
    CHECKSUM_SKIP, MIN_ALLOCATION_UNIT, PAGE_HEADER_SIZE,
};
pub use image::{BlockImage, BlockImageBuilder};
pub use reader::{BlockManager, ReadSession};
