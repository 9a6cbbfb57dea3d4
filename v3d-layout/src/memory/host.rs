//! A [`MemoryAllocator`] backed by host memory.
//!
//! Useful for running the layout and transfer code without a GPU, for instance in a simulator or
//! in tests. Exported handles are kept in a registry shared by all clones of the allocator, so
//! that an exported allocation can be imported again.

use super::{Allocation, ExternalHandleType, MemoryAllocator, MemoryAllocatorError, MemoryBlock};
use crate::DeviceSize;
use foldhash::HashMap;
use parking_lot::Mutex;
use std::{
    alloc::{self, Layout},
    fmt::{Debug, Formatter, Result as FmtResult},
    ptr::NonNull,
    sync::{
        atomic::{AtomicU32, AtomicU64, Ordering},
        Arc, Weak,
    },
};

/// Allocates image memory on the host heap.
#[derive(Clone, Debug)]
pub struct HostMemoryAllocator {
    state: Arc<HostState>,
}

#[derive(Debug)]
struct HostState {
    capacity: DeviceSize,
    used: Arc<AtomicU64>,
    next_handle: AtomicU32,
    exports: Mutex<HashMap<(ExternalHandleType, u32), Weak<HostBuffer>>>,
}

impl HostMemoryAllocator {
    /// Creates an allocator without a size limit.
    #[inline]
    pub fn new() -> Self {
        Self::with_capacity(DeviceSize::MAX)
    }

    /// Creates an allocator that fails with [`MemoryAllocatorError::OutOfDeviceMemory`] once more
    /// than `capacity` bytes are live.
    pub fn with_capacity(capacity: DeviceSize) -> Self {
        HostMemoryAllocator {
            state: Arc::new(HostState {
                capacity,
                used: Arc::new(AtomicU64::new(0)),
                next_handle: AtomicU32::new(1),
                exports: Mutex::new(HashMap::default()),
            }),
        }
    }

    /// Returns the number of bytes currently allocated.
    #[inline]
    pub fn used(&self) -> DeviceSize {
        self.state.used.load(Ordering::Acquire)
    }

    fn reserve(&self, size: DeviceSize) -> Result<(), MemoryAllocatorError> {
        let capacity = self.state.capacity;

        self.state
            .used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(size).filter(|&total| total <= capacity)
            })
            .map(|_| ())
            .map_err(|_| MemoryAllocatorError::OutOfDeviceMemory)
    }
}

impl Default for HostMemoryAllocator {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAllocator for HostMemoryAllocator {
    fn allocate(
        &self,
        size: DeviceSize,
        name: &'static str,
    ) -> Result<Arc<Allocation>, MemoryAllocatorError> {
        self.reserve(size)?;

        let buffer = match HostBuffer::new(size, self.state.used.clone()) {
            Ok(buffer) => buffer,
            Err(err) => {
                self.state.used.fetch_sub(size, Ordering::AcqRel);
                return Err(err);
            }
        };
        let block = HostBlock {
            buffer: Arc::new(buffer),
            state: Arc::downgrade(&self.state),
            gem_handle: self.state.next_handle.fetch_add(1, Ordering::Relaxed),
        };

        Ok(Arc::new(Allocation::new(Box::new(block), name)))
    }

    fn import(
        &self,
        handle_type: ExternalHandleType,
        handle: u32,
    ) -> Result<Arc<Allocation>, MemoryAllocatorError> {
        if handle_type == ExternalHandleType::Kms {
            return Err(MemoryAllocatorError::UnsupportedHandleType);
        }

        let buffer = self
            .state
            .exports
            .lock()
            .get(&(handle_type, handle))
            .and_then(Weak::upgrade)
            .ok_or(MemoryAllocatorError::UnknownHandle)?;
        let block = HostBlock {
            buffer,
            state: Arc::downgrade(&self.state),
            gem_handle: self.state.next_handle.fetch_add(1, Ordering::Relaxed),
        };

        Ok(Arc::new(Allocation::new_imported(Box::new(block), "import")))
    }
}

struct HostBlock {
    buffer: Arc<HostBuffer>,
    state: Weak<HostState>,
    gem_handle: u32,
}

impl Debug for HostBlock {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("HostBlock")
            .field("size", &self.buffer.size)
            .field("gem_handle", &self.gem_handle)
            .finish_non_exhaustive()
    }
}

unsafe impl MemoryBlock for HostBlock {
    #[inline]
    fn size(&self) -> DeviceSize {
        self.buffer.size
    }

    #[inline]
    fn map(&self, _synchronized: bool) -> Result<NonNull<u8>, MemoryAllocatorError> {
        // Host memory is never in use by a GPU, so there is nothing to wait for.
        Ok(self.buffer.ptr)
    }

    fn export(&self, handle_type: ExternalHandleType) -> Result<u32, MemoryAllocatorError> {
        if handle_type == ExternalHandleType::Kms {
            return Ok(self.gem_handle);
        }

        let state = self
            .state
            .upgrade()
            .ok_or(MemoryAllocatorError::UnsupportedHandleType)?;
        let handle = state.next_handle.fetch_add(1, Ordering::Relaxed);
        let mut exports = state.exports.lock();
        exports.retain(|_, buffer| buffer.strong_count() != 0);
        exports.insert((handle_type, handle), Arc::downgrade(&self.buffer));

        Ok(handle)
    }
}

/// Zero-initialized heap memory, shared between the allocations that import it.
struct HostBuffer {
    ptr: NonNull<u8>,
    size: DeviceSize,
    layout: Layout,
    used: Arc<AtomicU64>,
}

// SAFETY: the buffer is plain heap memory, and accesses through the mapping are synchronized by
// the users of `MemoryBlock::map`.
unsafe impl Send for HostBuffer {}
unsafe impl Sync for HostBuffer {}

impl HostBuffer {
    fn new(size: DeviceSize, used: Arc<AtomicU64>) -> Result<Self, MemoryAllocatorError> {
        let len = usize::try_from(size).map_err(|_| MemoryAllocatorError::OutOfHostMemory)?;
        let layout = Layout::from_size_align(len.max(1), 64)
            .map_err(|_| MemoryAllocatorError::OutOfHostMemory)?;

        // SAFETY: `layout` has a non-zero size.
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or(MemoryAllocatorError::OutOfHostMemory)?;

        Ok(HostBuffer {
            ptr,
            size,
            layout,
            used,
        })
    }
}

impl Drop for HostBuffer {
    fn drop(&mut self) {
        // SAFETY: `ptr` was allocated with `layout` in `HostBuffer::new`.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) };
        self.used.fetch_sub(self.size, Ordering::AcqRel);
    }
}
