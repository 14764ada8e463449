//! Block-store handles
//!
//! A `BlockHandle` is one backing file or tiered object. Reads go through the
//! `BlockIo` positioned-read primitive, so the same read path works against
//! files and in-memory images.
//!
//! In multi-handle mode handles are resolved by object id through a
//! `HandleProvider`. Acquisition hands back a `HandleGuard` whose drop
//! releases the reference, so no exit path (including unwinding) can leak one.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::errors::{BlockError, BlockResult};
use super::header::MIN_ALLOCATION_UNIT;

/// Positioned-read primitive over a backing object.
pub trait BlockIo: Send + Sync {
    /// Fills `dst` with the bytes at `offset`, failing on a short read.
    fn read_at(&self, offset: u64, dst: &mut [u8]) -> io::Result<()>;

    /// Current length of the object in bytes.
    fn len(&self) -> io::Result<u64>;

    /// Returns true if the object holds no bytes.
    fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// File-backed block I/O using positioned reads.
#[derive(Debug)]
pub struct FileIo {
    file: File,
}

impl FileIo {
    /// Opens `path` read-only.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).open(path)?;
        Ok(Self { file })
    }

    #[cfg(unix)]
    fn read_exact_at(&self, mut offset: u64, mut dst: &mut [u8]) -> io::Result<()> {
        use std::os::unix::fs::FileExt;
        while !dst.is_empty() {
            let read = self.file.read_at(dst, offset)?;
            if read == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "read_at reached EOF",
                ));
            }
            dst = &mut dst[read..];
            offset += read as u64;
        }
        Ok(())
    }

    #[cfg(windows)]
    fn read_exact_at(&self, mut offset: u64, mut dst: &mut [u8]) -> io::Result<()> {
        use std::os::windows::fs::FileExt;
        while !dst.is_empty() {
            let read = self.file.seek_read(dst, offset)?;
            if read == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "seek_read reached EOF",
                ));
            }
            dst = &mut dst[read..];
            offset += read as u64;
        }
        Ok(())
    }

    #[cfg(not(any(unix, windows)))]
    fn read_exact_at(&self, _offset: u64, _dst: &mut [u8]) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "positioned reads unsupported on this platform",
        ))
    }
}

impl BlockIo for FileIo {
    fn read_at(&self, offset: u64, dst: &mut [u8]) -> io::Result<()> {
        self.read_exact_at(offset, dst)
    }

    fn len(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}

/// In-memory block object. Supports out-of-band writes for tooling and tests.
#[derive(Debug, Default)]
pub struct MemoryIo {
    bytes: RwLock<Vec<u8>>,
}

impl MemoryIo {
    /// Wraps an existing image.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: RwLock::new(bytes),
        }
    }

    /// Overwrites bytes at `offset`, extending the image if needed.
    pub fn write_at(&self, offset: u64, src: &[u8]) {
        let mut bytes = self.bytes.write();
        let start = offset as usize;
        let end = start + src.len();
        if bytes.len() < end {
            bytes.resize(end, 0);
        }
        bytes[start..end].copy_from_slice(src);
    }

    /// Returns a copy of the whole image.
    pub fn snapshot(&self) -> Vec<u8> {
        self.bytes.read().clone()
    }
}

impl BlockIo for MemoryIo {
    fn read_at(&self, offset: u64, dst: &mut [u8]) -> io::Result<()> {
        let bytes = self.bytes.read();
        let start = usize::try_from(offset)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset out of range"))?;
        let end = start.checked_add(dst.len()).filter(|&end| end <= bytes.len());
        match end {
            Some(end) => {
                dst.copy_from_slice(&bytes[start..end]);
                Ok(())
            }
            None => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read past end of memory object",
            )),
        }
    }

    fn len(&self) -> io::Result<u64> {
        Ok(self.bytes.read().len() as u64)
    }
}

/// One open block store.
pub struct BlockHandle {
    name: String,
    object_id: u32,
    allocation_unit_size: u32,
    io: Arc<dyn BlockIo>,
    verify: AtomicBool,
}

impl BlockHandle {
    /// Creates a handle over an I/O object.
    pub fn new(
        name: impl Into<String>,
        object_id: u32,
        allocation_unit_size: u32,
        io: Arc<dyn BlockIo>,
    ) -> BlockResult<Self> {
        let name = name.into();
        if allocation_unit_size < MIN_ALLOCATION_UNIT || !allocation_unit_size.is_power_of_two() {
            return Err(BlockError::io_error(
                format!("{}: invalid allocation unit size", name),
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!(
                        "allocation unit {} must be a power of two >= {}",
                        allocation_unit_size, MIN_ALLOCATION_UNIT
                    ),
                ),
            ));
        }
        Ok(Self {
            name,
            object_id,
            allocation_unit_size,
            io,
            verify: AtomicBool::new(false),
        })
    }

    /// Opens a file-backed handle.
    pub fn open_file(path: &Path, object_id: u32, allocation_unit_size: u32) -> BlockResult<Self> {
        let io = FileIo::open(path).map_err(|e| {
            BlockError::io_error(format!("failed to open block file {}", path.display()), e)
        })?;
        debug!(path = %path.display(), object_id, "block.handle.open");
        Self::new(
            path.display().to_string(),
            object_id,
            allocation_unit_size,
            Arc::new(io),
        )
    }

    /// Store name used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Object id served by this handle.
    pub fn object_id(&self) -> u32 {
        self.object_id
    }

    /// Minimum I/O granularity.
    pub fn allocation_unit_size(&self) -> u32 {
        self.allocation_unit_size
    }

    /// Marks the handle as being verified; checksum failures become recoverable.
    pub fn set_verify(&self, verify: bool) {
        self.verify.store(verify, Ordering::Release);
    }

    /// Returns true while the handle is being verified.
    pub fn is_verifying(&self) -> bool {
        self.verify.load(Ordering::Acquire)
    }

    /// Positioned read of exactly `dst.len()` bytes.
    pub fn read_at(&self, offset: u64, dst: &mut [u8]) -> BlockResult<()> {
        self.io.read_at(offset, dst).map_err(|e| {
            BlockError::io_error(
                format!(
                    "{}: read of {}B at offset {} failed",
                    self.name,
                    dst.len(),
                    offset
                ),
                e,
            )
        })
    }

    /// Size of the backing object.
    pub fn len(&self) -> BlockResult<u64> {
        self.io
            .len()
            .map_err(|e| BlockError::io_error(format!("{}: cannot stat", self.name), e))
    }

    /// Returns true if the backing object is empty.
    pub fn is_empty(&self) -> BlockResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl std::fmt::Debug for BlockHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockHandle")
            .field("name", &self.name)
            .field("object_id", &self.object_id)
            .field("allocation_unit_size", &self.allocation_unit_size)
            .finish()
    }
}

/// Resolves object ids to reference-counted handles.
pub trait HandleProvider: Send + Sync {
    /// Takes a reference on the handle for `object_id`, opening it if needed.
    fn acquire(&self, object_id: u32) -> BlockResult<Arc<BlockHandle>>;

    /// Drops a reference taken by `acquire`.
    fn release(&self, handle: &BlockHandle);

    /// Puts every handle the provider serves into or out of verify mode,
    /// including handles opened later.
    fn set_verify(&self, _verify: bool) {}
}

/// Scoped handle reference; releases on drop.
pub struct HandleGuard<'a> {
    provider: &'a dyn HandleProvider,
    handle: Arc<BlockHandle>,
}

impl<'a> HandleGuard<'a> {
    /// Acquires a reference from `provider`.
    pub fn acquire(provider: &'a dyn HandleProvider, object_id: u32) -> BlockResult<Self> {
        let handle = provider.acquire(object_id)?;
        Ok(Self { provider, handle })
    }
}

impl Deref for HandleGuard<'_> {
    type Target = BlockHandle;

    fn deref(&self) -> &BlockHandle {
        &self.handle
    }
}

impl Drop for HandleGuard<'_> {
    fn drop(&mut self) {
        self.provider.release(&self.handle);
    }
}

type Opener = dyn Fn(u32) -> BlockResult<BlockHandle> + Send + Sync;

struct RegistryEntry {
    handle: Arc<BlockHandle>,
    refs: usize,
    pinned: bool,
}

/// Multi-handle registry for tiered or split storage.
///
/// Handles are opened on first reference and closed when the last reference
/// is released, unless they were registered up front. The opener runs
/// without the registry lock held.
pub struct HandleRegistry {
    entries: Mutex<HashMap<u32, RegistryEntry>>,
    opener: Option<Box<Opener>>,
    verify: AtomicBool,
}

impl HandleRegistry {
    /// Creates a registry that only serves registered handles.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            opener: None,
            verify: AtomicBool::new(false),
        }
    }

    /// Creates a registry that opens unknown object ids with `opener`.
    pub fn with_opener<F>(opener: F) -> Self
    where
        F: Fn(u32) -> BlockResult<BlockHandle> + Send + Sync + 'static,
    {
        Self {
            entries: Mutex::new(HashMap::new()),
            opener: Some(Box::new(opener)),
            verify: AtomicBool::new(false),
        }
    }

    /// Creates a registry that opens `<dir>/<prefix>.<object_id>` on demand.
    pub fn directory(dir: impl Into<PathBuf>, prefix: impl Into<String>, allocation_unit_size: u32) -> Self {
        let dir = dir.into();
        let prefix = prefix.into();
        Self::with_opener(move |object_id| {
            let path = dir.join(format!("{}.{:010}", prefix, object_id));
            BlockHandle::open_file(&path, object_id, allocation_unit_size)
        })
    }

    /// Registers a handle that stays open for the registry's lifetime.
    pub fn register(&self, handle: BlockHandle) -> Arc<BlockHandle> {
        let handle = Arc::new(handle);
        self.entries.lock().insert(
            handle.object_id(),
            RegistryEntry {
                handle: Arc::clone(&handle),
                refs: 0,
                pinned: true,
            },
        );
        handle
    }

    /// Outstanding references on `object_id`.
    pub fn refs(&self, object_id: u32) -> usize {
        self.entries.lock().get(&object_id).map_or(0, |e| e.refs)
    }

    /// Returns true if a handle for `object_id` is currently open.
    pub fn is_open(&self, object_id: u32) -> bool {
        self.entries.lock().contains_key(&object_id)
    }
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleProvider for HandleRegistry {
    fn acquire(&self, object_id: u32) -> BlockResult<Arc<BlockHandle>> {
        if let Some(entry) = self.entries.lock().get_mut(&object_id) {
            entry.refs += 1;
            return Ok(Arc::clone(&entry.handle));
        }
        let opener = self
            .opener
            .as_ref()
            .ok_or_else(|| BlockError::unknown_object(object_id))?;
        let opened = opener(object_id)?;

        // A concurrent acquire may have opened the same object meanwhile.
        let mut entries = self.entries.lock();
        let entry = entries.entry(object_id).or_insert_with(|| {
            opened.set_verify(self.verify.load(Ordering::Acquire));
            debug!(object_id, "block.handle.open");
            RegistryEntry {
                handle: Arc::new(opened),
                refs: 0,
                pinned: false,
            }
        });
        entry.refs += 1;
        Ok(Arc::clone(&entry.handle))
    }

    fn release(&self, handle: &BlockHandle) {
        let mut entries = self.entries.lock();
        let object_id = handle.object_id();
        let close = match entries.get_mut(&object_id) {
            Some(entry) => {
                entry.refs = entry.refs.saturating_sub(1);
                entry.refs == 0 && !entry.pinned
            }
            None => false,
        };
        if close {
            entries.remove(&object_id);
            debug!(object_id, "block.handle.close");
        }
    }

    fn set_verify(&self, verify: bool) {
        let entries = self.entries.lock();
        self.verify.store(verify, Ordering::Release);
        for entry in entries.values() {
            entry.handle.set_verify(verify);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn memory_handle(object_id: u32, bytes: Vec<u8>) -> BlockHandle {
        BlockHandle::new("mem", object_id, 512, Arc::new(MemoryIo::new(bytes))).unwrap()
    }

    #[test]
    fn test_memory_io_read_and_short_read() {
        let io = MemoryIo::new(vec![1, 2, 3, 4]);
        let mut buf = [0u8; 2];
        io.read_at(1, &mut buf).unwrap();
        assert_eq!(buf, [2, 3]);

        let mut big = [0u8; 8];
        let err = io.read_at(0, &mut big).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_file_io_positioned_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blocks.keel");
        let mut file = File::create(&path).unwrap();
        file.write_all(b"0123456789").unwrap();
        file.sync_all().unwrap();

        let handle = BlockHandle::open_file(&path, 0, 512).unwrap();
        let mut buf = [0u8; 4];
        handle.read_at(3, &mut buf).unwrap();
        assert_eq!(&buf, b"3456");
        assert_eq!(handle.len().unwrap(), 10);

        let mut past = [0u8; 4];
        assert!(handle.read_at(8, &mut past).is_err());
    }

    #[test]
    fn test_invalid_allocation_unit_rejected() {
        let io: Arc<dyn BlockIo> = Arc::new(MemoryIo::default());
        assert!(BlockHandle::new("mem", 0, 100, Arc::clone(&io)).is_err());
        assert!(BlockHandle::new("mem", 0, 768, Arc::clone(&io)).is_err());
        assert!(BlockHandle::new("mem", 0, 4096, io).is_ok());
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let registry = HandleRegistry::new();
        registry.register(memory_handle(7, vec![0; 512]));
        {
            let guard = HandleGuard::acquire(&registry, 7).unwrap();
            assert_eq!(guard.object_id(), 7);
            assert_eq!(registry.refs(7), 1);
        }
        assert_eq!(registry.refs(7), 0);
        assert!(registry.is_open(7));
    }

    #[test]
    fn test_guard_releases_on_error_path() {
        let registry = HandleRegistry::new();
        registry.register(memory_handle(1, vec![0; 16]));

        fn failing_read(registry: &HandleRegistry) -> BlockResult<()> {
            let guard = HandleGuard::acquire(registry, 1)?;
            let mut buf = [0u8; 64];
            guard.read_at(0, &mut buf)?;
            Ok(())
        }

        assert!(failing_read(&registry).is_err());
        assert_eq!(registry.refs(1), 0);
    }

    #[test]
    fn test_guard_releases_on_panic() {
        let registry = HandleRegistry::new();
        registry.register(memory_handle(2, vec![0; 16]));

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = HandleGuard::acquire(&registry, 2).unwrap();
            panic!("boom");
        }));
        assert!(result.is_err());
        assert_eq!(registry.refs(2), 0);
    }

    #[test]
    fn test_open_runs_outside_registry_lock() {
        use std::sync::{mpsc, Barrier};
        use std::thread;
        use std::time::Duration;

        let entered = Arc::new(Barrier::new(2));
        let resume = Arc::new(Barrier::new(2));
        let registry = {
            let (entered, resume) = (Arc::clone(&entered), Arc::clone(&resume));
            Arc::new(HandleRegistry::with_opener(move |object_id| {
                entered.wait();
                resume.wait();
                Ok(memory_handle(object_id, vec![0; 512]))
            }))
        };
        registry.register(memory_handle(7, vec![0; 512]));

        let opening = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || registry.acquire(9).map(|h| h.object_id()))
        };
        entered.wait();

        let (tx, rx) = mpsc::channel();
        let pinned = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let handle = registry.acquire(7).unwrap();
                tx.send(handle.object_id()).unwrap();
                registry.release(&handle);
            })
        };
        let served = rx.recv_timeout(Duration::from_secs(5));
        resume.wait();

        assert_eq!(served, Ok(7));
        assert_eq!(opening.join().unwrap().unwrap(), 9);
        pinned.join().unwrap();
        assert_eq!(registry.refs(9), 1);
        assert_eq!(registry.refs(7), 0);
    }

    #[test]
    fn test_concurrent_open_adopts_existing_entry() {
        use std::sync::atomic::AtomicUsize;
        use std::sync::Barrier;
        use std::thread;

        let opens = Arc::new(AtomicUsize::new(0));
        let both_opening = Arc::new(Barrier::new(2));
        let registry = {
            let (opens, both_opening) = (Arc::clone(&opens), Arc::clone(&both_opening));
            Arc::new(HandleRegistry::with_opener(move |object_id| {
                opens.fetch_add(1, Ordering::SeqCst);
                both_opening.wait();
                Ok(memory_handle(object_id, vec![0; 512]))
            }))
        };

        let workers: Vec<_> = (0..2)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.acquire(3).unwrap())
            })
            .collect();
        let handles: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();

        assert_eq!(opens.load(Ordering::SeqCst), 2);
        assert!(Arc::ptr_eq(&handles[0], &handles[1]));
        assert_eq!(registry.refs(3), 2);

        for handle in &handles {
            registry.release(handle);
        }
        assert!(!registry.is_open(3));
    }

    #[test]
    fn test_opened_handles_inherit_verify_mode() {
        let registry =
            HandleRegistry::with_opener(|object_id| Ok(memory_handle(object_id, vec![0; 512])));
        let primary = registry.register(memory_handle(0, vec![0; 512]));
        let held = registry.acquire(1).unwrap();
        assert!(!held.is_verifying());

        registry.set_verify(true);
        assert!(primary.is_verifying());
        assert!(held.is_verifying());
        {
            let guard = HandleGuard::acquire(&registry, 4).unwrap();
            assert!(guard.is_verifying());
        }

        registry.set_verify(false);
        assert!(!primary.is_verifying());
        assert!(!held.is_verifying());
        registry.release(&held);
    }

    #[test]
    fn test_unknown_object_without_opener() {
        let registry = HandleRegistry::new();
        let err = registry.acquire(99).unwrap_err();
        assert_eq!(err.code(), crate::block::BlockErrorCode::UnknownObject);
    }

    #[test]
    fn test_opened_handles_close_after_last_release() {
        let registry = HandleRegistry::with_opener(|object_id| {
            Ok(memory_handle(object_id, vec![0; 512]))
        });
        let a = HandleGuard::acquire(&registry, 5).unwrap();
        let b = HandleGuard::acquire(&registry, 5).unwrap();
        assert_eq!(registry.refs(5), 2);
        drop(a);
        assert!(registry.is_open(5));
        drop(b);
        assert!(!registry.is_open(5));
    }

    #[test]
    fn test_directory_registry_opens_object_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("tier.0000000003"), vec![9u8; 1024]).unwrap();
        let registry = HandleRegistry::directory(dir.path(), "tier", 512);

        let guard = HandleGuard::acquire(&registry, 3).unwrap();
        assert_eq!(guard.len().unwrap(), 1024);
        drop(guard);

        assert!(registry.acquire(4).is_err());
    }
}
