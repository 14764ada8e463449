//! Address Cookie Codec Tests
//!
//! - Only canonical encodings are accepted
//! - Reader-level cookie validation

use std::sync::Arc;

use keelstore::block::{
    AddressCookie, BlockBuffer, BlockErrorCode, BlockHandle, BlockImageBuilder, BlockManager,
    Crc32, MemoryIo, ReadSession,
};
use proptest::prelude::*;

// =============================================================================
// Canonical Encoding
// =============================================================================

proptest! {
    /// Any byte string the decoder accepts is exactly what the encoder would produce.
    #[test]
    fn test_accepted_bytes_are_canonical(bytes in prop::collection::vec(any::<u8>(), 0..24)) {
        match AddressCookie::decode(&bytes) {
            Ok(cookie) => prop_assert_eq!(cookie.encode(), bytes),
            Err(e) => prop_assert_eq!(e.code(), BlockErrorCode::MalformedCookie),
        }
    }

    /// Appending anything to a valid cookie makes it invalid.
    #[test]
    fn test_suffix_rejected(offset in any::<i64>(), extra in prop::collection::vec(any::<u8>(), 1..8)) {
        let mut bytes = AddressCookie::new(1, offset, 4096, 7).encode();
        bytes.extend_from_slice(&extra);
        prop_assert!(AddressCookie::decode(&bytes).is_err());
    }
}

/// Zero fields take one byte each.
#[test]
fn test_zero_cookie_is_four_bytes() {
    assert_eq!(AddressCookie::new(0, 0, 0, 0).encode(), vec![0, 0, 0, 0]);
}

/// Offsets are zigzag encoded: small negatives stay small.
#[test]
fn test_zigzag_offsets() {
    assert_eq!(AddressCookie::new(0, -1, 0, 0).encode(), vec![0, 1, 0, 0]);
    assert_eq!(AddressCookie::new(0, 1, 0, 0).encode(), vec![0, 2, 0, 0]);
    assert_eq!(AddressCookie::new(0, -64, 0, 0).encode(), vec![0, 0x7f, 0, 0]);
}

// =============================================================================
// Reader Validation
// =============================================================================

fn manager() -> BlockManager {
    let io = Arc::new(MemoryIo::new(vec![0u8; 4096]));
    BlockManager::new(Arc::new(BlockHandle::new("mem", 0, 512, io).unwrap()))
}

/// A cookie with a negative offset never reaches storage.
#[test]
fn test_reader_rejects_negative_offset() {
    let img = BlockImageBuilder::new(512).build(&Crc32).unwrap();
    let mut buf = BlockBuffer::new();
    let err = manager()
        .read(&ReadSession::new(), &img.cookie(0, -512).encode(), &mut buf)
        .unwrap_err();
    assert_eq!(err.code(), BlockErrorCode::MalformedCookie);
}

/// A block smaller than the allocation unit is rejected before any I/O.
#[test]
fn test_reader_rejects_undersized_block() {
    let mut buf = BlockBuffer::new();
    let cookie = AddressCookie::new(0, 0, 256, 0).encode();
    let err = manager()
        .read(&ReadSession::new(), &cookie, &mut buf)
        .unwrap_err();
    assert_eq!(err.code(), BlockErrorCode::InvalidBlockSize);
}

/// Garbage cookies are malformed, not corrupt.
#[test]
fn test_reader_rejects_garbage_cookie() {
    let manager = manager();
    let mut buf = BlockBuffer::new();
    let err = manager
        .read(&ReadSession::new(), &[0xff, 0xff], &mut buf)
        .unwrap_err();
    assert_eq!(err.code(), BlockErrorCode::MalformedCookie);
    assert!(!manager.corruption_state().is_corrupted());
}
