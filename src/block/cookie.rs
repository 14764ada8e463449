//! Block address cookies
//!
//! A cookie is the opaque locator stored by higher layers for every block:
//!
//! ```text
//! +-----------+--------------------+---------+-------------+
//! | object_id | offset (zigzag)    | size    | checksum    |
//! | varint    | varint             | varint  | varint      |
//! +-----------+--------------------+---------+-------------+
//! ```
//!
//! Every integer is packed LEB128-style in the minimal number of bytes, so
//! encoding is deterministic. Decoding is strict: truncation, non-minimal
//! integers, out-of-range fields and trailing bytes are all rejected.

use std::fmt;

use super::errors::{BlockError, BlockResult};

/// Longest possible varint for a u64.
const MAX_VARINT_LEN: usize = 10;

/// Decoded block address.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct AddressCookie {
    /// Backing object (file or tiered object) holding the block
    pub object_id: u32,
    /// Byte offset of the block within the object
    pub offset: i64,
    /// Block size in bytes, a multiple of the allocation unit
    pub size: u32,
    /// Expected checksum of the block
    pub checksum: u32,
}

impl AddressCookie {
    /// Creates a cookie from its parts.
    pub fn new(object_id: u32, offset: i64, size: u32, checksum: u32) -> Self {
        Self {
            object_id,
            offset,
            size,
            checksum,
        }
    }

    /// Packs the cookie into its minimal byte form.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 * 5);
        put_varint(&mut out, u64::from(self.object_id));
        put_varint(&mut out, zigzag(self.offset));
        put_varint(&mut out, u64::from(self.size));
        put_varint(&mut out, u64::from(self.checksum));
        out
    }

    /// Unpacks a cookie, rejecting anything but an exact encoding.
    pub fn decode(bytes: &[u8]) -> BlockResult<Self> {
        if bytes.is_empty() {
            return Err(BlockError::malformed_cookie("empty address cookie"));
        }
        let mut pos = 0;
        let object_id = get_u32(bytes, &mut pos, "object_id")?;
        let offset = unzigzag(get_varint(bytes, &mut pos, "offset")?);
        let size = get_u32(bytes, &mut pos, "size")?;
        let checksum = get_u32(bytes, &mut pos, "checksum")?;
        if pos != bytes.len() {
            return Err(BlockError::malformed_cookie(format!(
                "{} trailing bytes after address cookie",
                bytes.len() - pos
            )));
        }
        Ok(Self::new(object_id, offset, size, checksum))
    }
}

impl fmt::Display for AddressCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{}: {}, {}, {:#x}}}",
            self.object_id, self.offset, self.size, self.checksum
        )
    }
}

fn zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

fn unzigzag(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

fn put_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

fn get_varint(bytes: &[u8], pos: &mut usize, field: &str) -> BlockResult<u64> {
    let mut value = 0u64;
    for i in 0..MAX_VARINT_LEN {
        let byte = *bytes.get(*pos + i).ok_or_else(|| {
            BlockError::malformed_cookie(format!("truncated address cookie in {}", field))
        })?;
        if i == MAX_VARINT_LEN - 1 && byte > 1 {
            return Err(BlockError::malformed_cookie(format!(
                "{} overflows 64 bits",
                field
            )));
        }
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            if i > 0 && byte == 0 {
                return Err(BlockError::malformed_cookie(format!(
                    "{} is not minimally encoded",
                    field
                )));
            }
            *pos += i + 1;
            return Ok(value);
        }
    }
    Err(BlockError::malformed_cookie(format!("{} varint too long", field)))
}

fn get_u32(bytes: &[u8], pos: &mut usize, field: &str) -> BlockResult<u32> {
    let value = get_varint(bytes, pos, field)?;
    u32::try_from(value).map_err(|_| {
        BlockError::malformed_cookie(format!("{} value {} exceeds 32 bits", field, value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockErrorCode;
    use proptest::prelude::*;

    #[test]
    fn test_small_cookie_is_compact() {
        let cookie = AddressCookie::new(0, 4096, 4096, 0x7f);
        let bytes = cookie.encode();
        // 1 + 2 + 2 + 1 bytes
        assert_eq!(bytes.len(), 6);
        assert_eq!(AddressCookie::decode(&bytes).unwrap(), cookie);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let cookie = AddressCookie::new(3, 1 << 40, 65536, 0xdeadbeef);
        assert_eq!(cookie.encode(), cookie.encode());
    }

    #[test]
    fn test_empty_cookie_rejected() {
        let err = AddressCookie::decode(&[]).unwrap_err();
        assert_eq!(err.code(), BlockErrorCode::MalformedCookie);
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        let mut bytes = AddressCookie::new(1, 512, 512, 9).encode();
        bytes.push(0);
        let err = AddressCookie::decode(&bytes).unwrap_err();
        assert_eq!(err.code(), BlockErrorCode::MalformedCookie);
        assert!(err.message().contains("trailing"));
    }

    #[test]
    fn test_non_minimal_varint_rejected() {
        // object_id 1 encoded in two bytes
        let bytes = [0x81, 0x00, 0x00, 0x00, 0x00];
        let err = AddressCookie::decode(&bytes).unwrap_err();
        assert!(err.message().contains("minimally"));
    }

    #[test]
    fn test_u32_overflow_rejected() {
        let mut bytes = Vec::new();
        put_varint(&mut bytes, u64::from(u32::MAX) + 1);
        put_varint(&mut bytes, 0);
        put_varint(&mut bytes, 0);
        put_varint(&mut bytes, 0);
        let err = AddressCookie::decode(&bytes).unwrap_err();
        assert!(err.message().contains("exceeds 32 bits"));
    }

    #[test]
    fn test_negative_offset_survives_codec() {
        let cookie = AddressCookie::new(0, -4096, 4096, 1);
        assert_eq!(AddressCookie::decode(&cookie.encode()).unwrap(), cookie);
    }

    #[test]
    fn test_display_format() {
        let cookie = AddressCookie::new(2, 8192, 4096, 0xabc);
        assert_eq!(cookie.to_string(), "{2: 8192, 4096, 0xabc}");
    }

    proptest! {
        #[test]
        fn cookie_roundtrip(object_id in any::<u32>(), offset in any::<i64>(), size in any::<u32>(), checksum in any::<u32>()) {
            let cookie = AddressCookie::new(object_id, offset, size, checksum);
            prop_assert_eq!(AddressCookie::decode(&cookie.encode()).unwrap(), cookie);
        }

        #[test]
        fn truncated_cookie_always_rejected(object_id in any::<u32>(), offset in any::<i64>(), size in any::<u32>(), checksum in any::<u32>(), cut in any::<prop::sample::Index>()) {
            let bytes = AddressCookie::new(object_id, offset, size, checksum).encode();
            let len = cut.index(bytes.len());
            let err = AddressCookie::decode(&bytes[..len]).unwrap_err();
            prop_assert_eq!(err.code(), BlockErrorCode::MalformedCookie);
        }
    }
}
