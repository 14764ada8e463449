//! Block checksums
//!
//! The checksum algorithm is pluggable. Whatever the implementation, it must
//! be deterministic and sensitive to single-bit flips. The default is CRC32
//! (IEEE polynomial).

use crc32fast::Hasher;

/// A 32-bit block checksum algorithm.
pub trait Checksum: Send + Sync {
    /// Computes the checksum of `data`.
    fn compute(&self, data: &[u8]) -> u32;

    /// Returns true if `data` checksums to `expected`.
    fn matches(&self, data: &[u8], expected: u32) -> bool {
        self.compute(data) == expected
    }
}

/// CRC32 checksum backed by `crc32fast`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Crc32;

impl Checksum for Crc32 {
    fn compute(&self, data: &[u8]) -> u32 {
        let mut hasher = Hasher::new();
        hasher.update(data);
        hasher.finalize()
    }
}
