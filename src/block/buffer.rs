//! Read buffers
//!
//! A `BlockBuffer` is reused across reads. The first read into a buffer marks
//! it aligned and sizes it with some headroom; later reads only grow it when
//! the block does not fit the existing capacity.

/// Reusable destination buffer for block reads.
#[derive(Debug, Default)]
pub struct BlockBuffer {
    data: Vec<u8>,
    aligned: bool,
}

impl BlockBuffer {
    /// Creates an empty, unaligned buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepares the buffer to receive exactly `size` bytes.
    ///
    /// Returns true if the backing allocation had to grow.
    pub fn prepare(&mut self, size: usize) -> bool {
        let wanted = if self.aligned {
            size
        } else {
            self.aligned = true;
            size.max(self.data.capacity() + 10)
        };
        let grew = wanted > self.data.capacity();
        if grew {
            self.data.reserve_exact(wanted - self.data.len());
        }
        self.data.clear();
        self.data.resize(size, 0);
        grew
    }

    /// Returns true once the buffer has been sized for a block read.
    pub fn is_aligned(&self) -> bool {
        self.aligned
    }

    /// Current allocation size.
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Logical length of the buffered block.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if no block is buffered.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Block bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Mutable block bytes.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consumes the buffer, returning the block bytes.
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl AsRef<[u8]> for BlockBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_prepare_aligns_and_sizes() {
        let mut buf = BlockBuffer::new();
        assert!(!buf.is_aligned());
        assert!(buf.prepare(4096));
        assert!(buf.is_aligned());
        assert_eq!(buf.len(), 4096);
        assert!(buf.capacity() >= 4096);
    }

    #[test]
    fn test_reuse_does_not_reallocate() {
        let mut buf = BlockBuffer::new();
        buf.prepare(8192);
        let capacity = buf.capacity();
        assert!(!buf.prepare(4096));
        assert_eq!(buf.len(), 4096);
        assert!(!buf.prepare(8192));
        assert_eq!(buf.capacity(), capacity);
    }

    #[test]
    fn test_grows_for_larger_block() {
        let mut buf = BlockBuffer::new();
        buf.prepare(512);
        assert!(buf.prepare(16384));
        assert_eq!(buf.len(), 16384);
    }

    #[test]
    fn test_prepare_zeroes_previous_content() {
        let mut buf = BlockBuffer::new();
        buf.prepare(16);
        buf.as_mut_slice().fill(0xaa);
        buf.prepare(16);
        assert!(buf.as_slice().iter().all(|&b| b == 0));
    }
}
