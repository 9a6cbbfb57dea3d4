//! Backing memory for images.
//!
//! Every [`Image`] is backed by exactly one [`Allocation`], a fixed-size block of GPU-visible
//! memory that holds all of its mip levels, array layers and cube faces. Allocations are handed
//! out by a [`MemoryAllocator`]. This crate does not implement a real kernel allocator; it only
//! describes the contract one has to satisfy. [`HostMemoryAllocator`] is a heap-backed
//! implementation for simulation and tests.
//!
//! # Private allocations
//!
//! An allocation starts out *private*: nothing outside of the driver holds a reference to it. As
//! soon as a handle to it is exported, or when the allocation was imported in the first place,
//! it is no longer private. The transfer engine only swaps out the allocation of an image being
//! fully overwritten when it is private, since another process could otherwise still be looking
//! at the old one.
//!
//! [`Image`]: crate::image::Image
//! [`HostMemoryAllocator`]: host::HostMemoryAllocator

use crate::DeviceSize;
use std::{
    error::Error,
    fmt::{Debug, Display, Error as FmtError, Formatter},
    ptr::NonNull,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

pub mod host;

/// Allocates and imports the blocks of memory that back images.
///
/// Implementations are provided by the embedder, typically on top of the kernel's buffer
/// object interface.
pub trait MemoryAllocator {
    /// Allocates a new block of at least `size` bytes.
    ///
    /// `name` is a short label for debugging tools.
    fn allocate(
        &self,
        size: DeviceSize,
        name: &'static str,
    ) -> Result<Arc<Allocation>, MemoryAllocatorError>;

    /// Opens a block that was exported, possibly by another process.
    ///
    /// The returned allocation must not be private.
    fn import(
        &self,
        handle_type: ExternalHandleType,
        handle: u32,
    ) -> Result<Arc<Allocation>, MemoryAllocatorError>;
}

/// The memory behind an [`Allocation`].
///
/// # Safety
///
/// - [`map`] must return a pointer to [`size`] bytes that stays valid, and at the same address,
///   until `self` is dropped.
/// - The same memory may be mapped several times. Synchronizing the accesses is the caller's
///   responsibility.
///
/// [`map`]: MemoryBlock::map
/// [`size`]: MemoryBlock::size
pub unsafe trait MemoryBlock: Debug + Send + Sync {
    /// Returns the size of the block in bytes.
    fn size(&self) -> DeviceSize;

    /// Maps the block into the address space of the process.
    ///
    /// If `synchronized` is `true`, the call must wait until the GPU has finished any access to
    /// the block that the kernel knows about.
    fn map(&self, synchronized: bool) -> Result<NonNull<u8>, MemoryAllocatorError>;

    /// Creates a handle through which the block can be opened by someone else.
    fn export(&self, handle_type: ExternalHandleType) -> Result<u32, MemoryAllocatorError>;
}

/// A block of memory backing an image.
#[derive(Debug)]
pub struct Allocation {
    block: Box<dyn MemoryBlock>,
    name: &'static str,
    private: AtomicBool,
}

impl Allocation {
    /// Wraps a freshly allocated block. The allocation starts out private.
    #[inline]
    pub fn new(block: Box<dyn MemoryBlock>, name: &'static str) -> Self {
        Allocation {
            block,
            name,
            private: AtomicBool::new(true),
        }
    }

    /// Wraps a block that was opened from an external handle. The allocation is not private.
    #[inline]
    pub fn new_imported(block: Box<dyn MemoryBlock>, name: &'static str) -> Self {
        Allocation {
            block,
            name,
            private: AtomicBool::new(false),
        }
    }

    /// Returns the size of the allocation in bytes.
    #[inline]
    pub fn size(&self) -> DeviceSize {
        self.block.size()
    }

    /// Returns the debug label the allocation was created with.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns whether no reference to this allocation exists outside of the driver.
    #[inline]
    pub fn is_private(&self) -> bool {
        self.private.load(Ordering::Acquire)
    }

    /// Marks the allocation as referenced from outside of the driver. This cannot be undone.
    #[inline]
    pub fn mark_shared(&self) {
        self.private.store(false, Ordering::Release);
    }

    /// Maps the whole allocation and returns the mapped bytes.
    ///
    /// The returned pointer is valid for as long as `self` is alive. Reads and writes through it
    /// are not synchronized with the GPU beyond what `synchronized` provides.
    pub fn map(&self, synchronized: bool) -> Result<NonNull<[u8]>, MemoryAllocatorError> {
        let ptr = self.block.map(synchronized)?;
        let len = usize::try_from(self.size()).map_err(|_| MemoryAllocatorError::MemoryMapFailed)?;

        Ok(NonNull::slice_from_raw_parts(ptr, len))
    }

    /// Exports a handle to the allocation and marks it as shared.
    pub fn export(&self, handle_type: ExternalHandleType) -> Result<u32, MemoryAllocatorError> {
        self.mark_shared();
        self.block.export(handle_type)
    }
}

/// The kind of handle an allocation is exported as or imported from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExternalHandleType {
    /// A global name that any process on the same device can open.
    Shared,
    /// A handle local to the device file descriptor, for the display driver.
    Kms,
    /// A dma-buf file descriptor.
    Fd,
}

/// A handle to an image's memory that crosses a process or driver boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExternalHandle {
    /// The kind of `handle`.
    pub handle_type: ExternalHandleType,

    /// The name, KMS handle or file descriptor.
    pub handle: u32,

    /// The row stride in bytes of the first mip level.
    pub stride: u32,

    /// The byte offset of the image within the memory.
    pub offset: u32,

    /// The DRM format modifier describing the layout.
    pub modifier: u64,
}

/// Error that can be returned by a [`MemoryAllocator`] or when mapping an [`Allocation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryAllocatorError {
    /// There is not enough memory on the host.
    OutOfHostMemory,

    /// There is not enough memory on the device.
    OutOfDeviceMemory,

    /// Mapping the memory into the process failed.
    MemoryMapFailed,

    /// The handle to import doesn't refer to any exported memory.
    UnknownHandle,

    /// The allocator cannot export or import this kind of handle.
    UnsupportedHandleType,
}

impl Error for MemoryAllocatorError {}

impl Display for MemoryAllocatorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        let msg = match self {
            Self::OutOfHostMemory => "out of host memory",
            Self::OutOfDeviceMemory => "out of device memory",
            Self::MemoryMapFailed => "failed to map memory",
            Self::UnknownHandle => "the handle doesn't refer to any exported memory",
            Self::UnsupportedHandleType => "the handle type is not supported by the allocator",
        };

        write!(f, "{msg}")
    }
}

/// Rounds `val` up to a multiple of `alignment`, which must be a power of two.
#[inline]
pub(crate) const fn align_up(val: u32, alignment: u32) -> u32 {
    debug_assert!(alignment.is_power_of_two());

    (val + alignment - 1) & !(alignment - 1)
}
