//! Block image builder
//!
//! Produces valid on-disk blocks: headers in canonical order, payload, zero
//! padding to the allocation unit, and the checksum stamped into the block
//! header. Used by tooling and tests to lay down blocks the reader accepts.

use super::checksum::Checksum;
use super::cookie::AddressCookie;
use super::errors::{BlockError, BlockResult};
use super::header::{BlockHeader, PageHeader, BLOCK_DATA_CKSUM, BLOCK_HEADER_AREA, MIN_ALLOCATION_UNIT};

/// A fully formed block ready to be written at some offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockImage {
    bytes: Vec<u8>,
    checksum: u32,
}

impl BlockImage {
    /// Canonical block bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Checksum stamped into the header.
    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    /// On-disk size, a multiple of the allocation unit.
    pub fn size(&self) -> u32 {
        self.bytes.len() as u32
    }

    /// Cookie addressing this block at `offset` in `object_id`.
    pub fn cookie(&self, object_id: u32, offset: i64) -> AddressCookie {
        AddressCookie::new(object_id, offset, self.size(), self.checksum)
    }

    /// Consumes the image, returning its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Builder for `BlockImage`.
#[derive(Debug, Clone)]
pub struct BlockImageBuilder {
    allocation_unit_size: u32,
    page: PageHeader,
    checksum_data: bool,
    payload: Vec<u8>,
}

impl BlockImageBuilder {
    /// Starts a block for a store with the given allocation unit.
    pub fn new(allocation_unit_size: u32) -> Self {
        Self {
            allocation_unit_size,
            page: PageHeader::default(),
            checksum_data: true,
            payload: Vec::new(),
        }
    }

    /// Sets the page header.
    pub fn page(mut self, page: PageHeader) -> Self {
        self.page = page;
        self
    }

    /// Whether the checksum covers the whole block (default) or only its leading bytes.
    pub fn checksum_data(mut self, enabled: bool) -> Self {
        self.checksum_data = enabled;
        self
    }

    /// Sets the payload following the headers.
    pub fn payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Lays out the block and stamps its checksum.
    pub fn build(self, checksum: &dyn Checksum) -> BlockResult<BlockImage> {
        let unit = self.allocation_unit_size;
        if unit < MIN_ALLOCATION_UNIT || !unit.is_power_of_two() {
            return Err(BlockError::invalid_block_size("image", unit, MIN_ALLOCATION_UNIT));
        }
        let used = BLOCK_HEADER_AREA + self.payload.len();
        let size = used.div_ceil(unit as usize) * unit as usize;
        let disk_size = u32::try_from(size)
            .map_err(|_| BlockError::invalid_block_size("image", u32::MAX, unit))?;

        let mut bytes = vec![0u8; size];
        let mut header = BlockHeader {
            disk_size,
            checksum: 0,
            flags: if self.checksum_data { BLOCK_DATA_CKSUM } else { 0 },
            compressed_size: used as u32,
        };
        header.write_canonical(&mut bytes);
        self.page.write_canonical(&mut bytes);
        bytes[BLOCK_HEADER_AREA..used].copy_from_slice(&self.payload);

        header.checksum = checksum.compute(&bytes[..header.checksum_len(size)]);
        header.write_canonical(&mut bytes);

        Ok(BlockImage {
            bytes,
            checksum: header.checksum,
        })
    }
}
