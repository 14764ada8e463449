//! On-disk block and page headers
//!
//! Every block starts with two fixed-size headers, always stored
//! little-endian regardless of the host:
//!
//! ```text
//! offset  0  BlockHeader  disk_size u32 | checksum u32 | flags u8 | unused [3] | compressed_size u32
//! offset 16  PageHeader   recno u64 | write_gen u64 | mem_size u32 | entries u32
//! offset 40  payload
//! ```
//!
//! Byte-order normalization happens in two separate passes. The block header
//! is decoded into a native copy before checksum comparison; the page header
//! is rewritten in place only after the block has verified.

/// Size of the block header in bytes.
pub const BLOCK_HEADER_SIZE: usize = 16;
/// Size of the page header in bytes.
pub const PAGE_HEADER_SIZE: usize = 24;
/// Bytes taken by both headers at the front of every block.
pub const BLOCK_HEADER_AREA: usize = BLOCK_HEADER_SIZE + PAGE_HEADER_SIZE;
/// Leading bytes checksummed when the block does not checksum its whole content.
pub const CHECKSUM_SKIP: usize = 64;
/// Smallest allocation unit a block store may use.
pub const MIN_ALLOCATION_UNIT: u32 = 512;

/// Flag bit 0: the checksum covers the whole block.
pub const BLOCK_DATA_CKSUM: u8 = 0x01;

const CHECKSUM_FIELD: std::ops::Range<usize> = 4..8;

/// Block header in native byte order.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockHeader {
    /// On-disk size of the block, including headers and padding
    pub disk_size: u32,
    /// Checksum of the block, computed with this field zeroed
    pub checksum: u32,
    /// Block flags
    pub flags: u8,
    /// Size of the block before padding
    pub compressed_size: u32,
}

impl BlockHeader {
    /// Decodes a native copy from the canonical bytes at the front of `buf`.
    ///
    /// The buffer is left untouched.
    pub fn from_canonical(buf: &[u8]) -> Self {
        Self {
            disk_size: le_u32(buf, 0),
            checksum: le_u32(buf, 4),
            flags: buf[8],
            compressed_size: le_u32(buf, 12),
        }
    }

    /// Writes the header in canonical order to the front of `buf`.
    pub fn write_canonical(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.disk_size.to_le_bytes());
        buf[4..8].copy_from_slice(&self.checksum.to_le_bytes());
        buf[8] = self.flags;
        buf[9..12].fill(0);
        buf[12..16].copy_from_slice(&self.compressed_size.to_le_bytes());
    }

    /// Rewrites the canonical header at the front of `buf` into native order.
    pub fn byteswap_in_place(buf: &mut [u8]) {
        swap_u32(buf, 0);
        swap_u32(buf, 4);
        swap_u32(buf, 12);
    }

    /// Zeroes the checksum field in place.
    pub fn clear_checksum(buf: &mut [u8]) {
        buf[CHECKSUM_FIELD].fill(0);
    }

    /// Returns true if the checksum covers the whole block.
    pub fn checksums_data(&self) -> bool {
        self.flags & BLOCK_DATA_CKSUM != 0
    }

    /// Number of leading bytes of a `size`-byte block covered by the checksum.
    pub fn checksum_len(&self, size: usize) -> usize {
        if self.checksums_data() {
            size
        } else {
            CHECKSUM_SKIP.min(size)
        }
    }
}

/// Logical page header following the block header.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PageHeader {
    /// First record number on the page
    pub recno: u64,
    /// Write generation of the page
    pub write_gen: u64,
    /// In-memory size of the page
    pub mem_size: u32,
    /// Number of entries on the page
    pub entries: u32,
}

impl PageHeader {
    /// Writes the header in canonical order into the page header slot of `block`.
    pub fn write_canonical(&self, block: &mut [u8]) {
        let buf = &mut block[BLOCK_HEADER_SIZE..BLOCK_HEADER_AREA];
        buf[0..8].copy_from_slice(&self.recno.to_le_bytes());
        buf[8..16].copy_from_slice(&self.write_gen.to_le_bytes());
        buf[16..20].copy_from_slice(&self.mem_size.to_le_bytes());
        buf[20..24].copy_from_slice(&self.entries.to_le_bytes());
    }

    /// Rewrites the canonical page header in `block` into native order.
    pub fn byteswap_in_place(block: &mut [u8]) {
        let buf = &mut block[BLOCK_HEADER_SIZE..BLOCK_HEADER_AREA];
        swap_u64(buf, 0);
        swap_u64(buf, 8);
        swap_u32(buf, 16);
        swap_u32(buf, 20);
    }

    /// Reads a page header already normalized to native order.
    pub fn read_native(block: &[u8]) -> Self {
        let buf = &block[BLOCK_HEADER_SIZE..BLOCK_HEADER_AREA];
        Self {
            recno: u64::from_ne_bytes(array(buf, 0)),
            write_gen: u64::from_ne_bytes(array(buf, 8)),
            mem_size: u32::from_ne_bytes(array(buf, 16)),
            entries: u32::from_ne_bytes(array(buf, 20)),
        }
    }
}

fn array<const N: usize>(buf: &[u8], at: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[at..at + N]);
    out
}

fn le_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(array(buf, at))
}

fn swap_u32(buf: &mut [u8], at: usize) {
    let value = u32::from_le_bytes(array(buf, at));
    buf[at..at + 4].copy_from_slice(&value.to_ne_bytes());
}

fn swap_u64(buf: &mut [u8], at: usize) {
    let value = u64::from_le_bytes(array(buf, at));
    buf[at..at + 8].copy_from_slice(&value.to_ne_bytes());
}
