//! Memory layout and CPU access for images stored in the native layout of the Broadcom V3D GPU.
//!
//! # Brief summary
//!
//! The V3D rasterizer and texture unit read images in one of several hardware tiling schemes.
//! Which scheme a mip level uses depends on its size, and every level of every array layer must
//! live at an exact byte offset inside a single backing allocation. This crate computes that
//! geometry and lets the CPU read and write pixels through a plain row-major view.
//!
//! - The [*layout planner*](crate::image::layout) turns an image description into a
//!   [`SubresourceSlice`](crate::image::layout::SubresourceSlice) per mip level plus a layer
//!   stride. The result is immutable for the lifetime of the image.
//!
//! - An [`Image`](crate::image::Image) owns one [`Allocation`](crate::memory::Allocation)
//!   covering all of its levels and layers. Allocations come from a
//!   [`MemoryAllocator`](crate::memory::MemoryAllocator), which is provided by the embedder.
//!
//! - The [*transfer engine*](crate::image::transfer) maps a box of one level for CPU access. Raster
//!   images are mapped directly; tiled images go through a temporary linear buffer that is
//!   converted by a [`TiledImageCodec`](crate::image::tiling::TiledImageCodec) on map and unmap.
//!
//! - Before touching memory the GPU may still be using, the transfer engine asks a
//!   [`JobTracker`](crate::sync::JobTracker) to finish the submitted work that reads or writes the
//!   image.
//!
//! - The [`ResourceManager`](crate::resource::ResourceManager) ties these together and decides
//!   at creation or import time whether an image may be tiled at all.
//!
//! # Example
//!
//! ```
//! use v3d_layout::{
//!     format::Format,
//!     image::{transfer::{TransferBox, TransferUsage}, ImageCreateInfo, ImageType},
//!     memory::host::HostMemoryAllocator,
//!     resource::{ResourceManager, ResourceManagerCreateInfo},
//!     sync::NoJobs,
//! };
//!
//! let manager = ResourceManager::new(
//!     HostMemoryAllocator::new(),
//!     ResourceManagerCreateInfo::default(),
//! );
//!
//! let mut image = manager
//!     .create_image(ImageCreateInfo {
//!         image_type: ImageType::Dim2d,
//!         format: Format::R8G8B8A8_UNORM,
//!         extent: [130, 130, 1],
//!         ..Default::default()
//!     })
//!     .unwrap();
//!
//! let mut transfer = manager
//!     .map(&mut NoJobs, &mut image, 0, TransferUsage::WRITE, TransferBox::whole([130, 130, 1]))
//!     .unwrap();
//! transfer.as_mut_slice().fill(0xff);
//! manager.unmap(transfer);
//! ```

pub use smallvec;

#[macro_use]
mod macros;
pub mod format;
pub mod image;
pub mod memory;
pub mod resource;
pub mod sync;

/// Represents memory size and offset values inside a GPU buffer object.
///
/// The hardware addresses 32-bit offsets, but sizes are computed in 64 bits so that intermediate
/// products of stride and layer count cannot overflow.
pub type DeviceSize = u64;

/// Used in create-info structs to indicate that it may be extended in the future, so that users
/// must use `..Default::default()` when constructing it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NonExhaustive(pub(crate) ());
