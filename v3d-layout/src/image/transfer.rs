//! CPU access to the pixels of an image.
//!
//! [`map`] gives the CPU a linear, row-major view of a box of one mip level. How that view is
//! produced depends on the image:
//!
//! - Raster images are mapped directly. The view points into the image's allocation, rows are
//!   [`stride`](Transfer::stride) bytes apart and writes land in the image immediately.
//! - Tiled images are converted. The view is a staging buffer owned by the [`Transfer`], packed
//!   with rows of exactly `width` blocks. If the access reads, the box is converted into the
//!   buffer when mapping; if it writes, the buffer is converted back into the image when the
//!   transfer is dropped.
//!
//! All of the box arithmetic past this point is in blocks: for compressed formats, the box given
//! to [`map`] is divided by the block extent, rounding the size up.
//!
//! # Synchronization
//!
//! Before touching memory, [`map`] asks the [`JobTracker`] to finish GPU work that could race the
//! access: jobs reading the image before a write, jobs writing it before a read. Nothing is
//! flushed for [`TransferUsage::UNSYNCHRONIZED`] accesses.
//!
//! # Discarding
//!
//! A write that is going to replace the whole contents of the image doesn't need to wait for the
//! GPU at all: the image can be given a fresh allocation instead, while in-flight jobs keep using
//! the old one. This happens for [`TransferUsage::DISCARD_WHOLE_RESOURCE`], and a
//! [`TransferUsage::DISCARD_RANGE`] access is upgraded to it when all of these hold:
//!
//! - the box covers the whole of level 0, and the image has one level and one layer,
//! - the access is synchronized, and the image isn't persistently mapped
//!   ([`ImageCreateFlags::MAP_COHERENT`]),
//! - the allocation is private: no other process or driver can be looking at it.
//!
//! If the new allocation cannot be obtained, the engine falls back to flushing the readers.
//!
//! [`ImageCreateFlags::MAP_COHERENT`]: super::ImageCreateFlags::MAP_COHERENT

use super::{
    layout::minify,
    tiling::{TiledImageCodec, TiledSurface},
    Image, ImageCreateFlags, ImageUsage,
};
use crate::{
    macros::layout_bitflags,
    memory::{MemoryAllocator, MemoryAllocatorError},
    sync::{DirtyState, JobTracker},
    DeviceSize,
};
use std::{
    error::Error,
    fmt::{Debug, Display, Error as FmtError, Formatter},
    ptr::NonNull,
    slice,
};

layout_bitflags! {
    /// How the CPU is going to access a mapped box.
    TransferUsage = u32;

    /// The CPU reads the box.
    READ = 1 << 0,

    /// The CPU writes the box.
    WRITE = 1 << 1,

    /// The previous contents of the box don't need to be preserved.
    DISCARD_RANGE = 1 << 2,

    /// The previous contents of the whole image don't need to be preserved.
    DISCARD_WHOLE_RESOURCE = 1 << 3,

    /// Don't wait for the GPU. The caller guarantees that no submitted job touches the box.
    UNSYNCHRONIZED = 1 << 4,

    /// Fail rather than going through a staging buffer.
    MAP_DIRECTLY = 1 << 5,
}

/// A box of pixels within one mip level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TransferBox {
    pub x: u32,
    pub y: u32,
    /// The first array layer, cube face or depth slice.
    pub z: u32,
    pub width: u32,
    pub height: u32,
    /// The number of array layers, cube faces or depth slices.
    pub depth: u32,
}

impl TransferBox {
    /// Returns a box starting at the origin with the given extent.
    #[inline]
    pub const fn whole(extent: [u32; 3]) -> Self {
        TransferBox {
            x: 0,
            y: 0,
            z: 0,
            width: extent[0],
            height: extent[1],
            depth: extent[2],
        }
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.depth == 0
    }
}

/// A box of an image mapped for CPU access, returned by [`map`].
///
/// Dropping the transfer unmaps it, writing the staging buffer back into the image if the access
/// included [`TransferUsage::WRITE`]. [`unmap`] does the same thing explicitly.
#[must_use = "the mapped pixels can only be accessed through the transfer"]
pub struct Transfer<'a> {
    image: &'a mut Image,
    codec: &'a dyn TiledImageCodec,
    mapping: NonNull<[u8]>,
    level: u32,
    usage: TransferUsage,
    region: TransferBox,
    stride: u32,
    layer_stride: u32,
    data: TransferData,
}

enum TransferData {
    Direct { offset: usize, len: usize },
    Staging(Vec<u8>),
}

impl Transfer<'_> {
    /// Returns the image being accessed.
    #[inline]
    pub fn image(&self) -> &Image {
        self.image
    }

    /// Returns the mapped mip level.
    #[inline]
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Returns the access flags, after a discard-range access was possibly upgraded to discard the
    /// whole resource.
    #[inline]
    pub fn usage(&self) -> TransferUsage {
        self.usage
    }

    /// Returns the mapped box, in blocks.
    #[inline]
    pub fn region(&self) -> TransferBox {
        self.region
    }

    /// Returns the byte distance between two rows of the view.
    #[inline]
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Returns the byte distance between two layers of a staging buffer.
    ///
    /// For a direct mapping this is the same as [`stride`](Self::stride); consecutive layers of
    /// the view are then [`Image::layer_stride`] bytes apart.
    #[inline]
    pub fn layer_stride(&self) -> u32 {
        self.layer_stride
    }

    /// Returns whether the view points straight into the image's memory.
    #[inline]
    pub fn is_direct(&self) -> bool {
        matches!(self.data, TransferData::Direct { .. })
    }

    /// Returns the mapped bytes.
    ///
    /// For a direct mapping, the slice runs from the first pixel of the box to the last one, and
    /// includes the bytes between rows and layers that lie outside of the box.
    pub fn as_slice(&self) -> &[u8] {
        match &self.data {
            &TransferData::Direct { offset, len } => {
                // SAFETY: `map` checked that the box lies within the level and the image's
                // layers, and that the allocation is at least `Image::required_size` bytes,
                // which covers every level of every layer.
                let ptr = unsafe { self.mapping.cast::<u8>().as_ptr().add(offset) };

                // SAFETY: Same range as above. The image is borrowed for as long as `self` lives,
                // so the mapping stays valid.
                unsafe { slice::from_raw_parts(ptr, len) }
            }
            TransferData::Staging(buffer) => buffer,
        }
    }

    /// Returns the mapped bytes for writing. See [`as_slice`](Self::as_slice).
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match &mut self.data {
            &mut TransferData::Direct { offset, len } => {
                // SAFETY: Same as in `as_slice`: `map` checked the allocation against
                // `Image::required_size`.
                let ptr = unsafe { self.mapping.cast::<u8>().as_ptr().add(offset) };

                // SAFETY: Same as in `as_slice`. `&mut self` makes the slice unique.
                unsafe { slice::from_raw_parts_mut(ptr, len) }
            }
            TransferData::Staging(buffer) => buffer,
        }
    }

    fn write_back(&mut self) {
        let TransferData::Staging(buffer) = &self.data else {
            return;
        };

        if !self.usage.intersects(TransferUsage::WRITE) {
            return;
        }

        let Some(slice) = self.image.slice(self.level).copied() else {
            return;
        };
        let surface = TiledSurface::from_slice(&slice, self.image.bytes_per_pixel());
        let image_layer_stride = self.image.layer_stride() as usize;

        // SAFETY: The image, and therefore its allocation, is borrowed for as long as `self`
        // lives. Direct views are the only other way to reach the mapping and this isn't one.
        let memory = unsafe { self.mapping.as_mut() };

        for layer in 0..self.region.depth {
            let base = slice.offset as usize + (self.region.z + layer) as usize * image_layer_stride;
            let start = layer as usize * self.layer_stride as usize;
            self.codec.store(
                &mut memory[base..base + slice.size as usize],
                &surface,
                &buffer[start..start + self.layer_stride as usize],
                self.stride,
                &self.region,
            );
        }
    }
}

impl Drop for Transfer<'_> {
    fn drop(&mut self) {
        self.write_back();
    }
}

impl Debug for Transfer<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_struct("Transfer")
            .field("image", &self.image.id())
            .field("level", &self.level)
            .field("usage", &self.usage)
            .field("region", &self.region)
            .field("stride", &self.stride)
            .field("layer_stride", &self.layer_stride)
            .field("direct", &self.is_direct())
            .finish_non_exhaustive()
    }
}

/// Maps a box of one mip level of `image` for CPU access.
///
/// `region` is in pixels. `allocator` provides the replacement allocation when the whole image is
/// discarded, and `codec` converts tiled levels. See the [module documentation](self) for the
/// synchronization performed.
pub fn map<'a, A, T>(
    allocator: &A,
    codec: &'a dyn TiledImageCodec,
    tracker: &mut T,
    image: &'a mut Image,
    level: u32,
    mut usage: TransferUsage,
    region: TransferBox,
) -> Result<Transfer<'a>, MapImageError>
where
    A: MemoryAllocator + ?Sized,
    T: JobTracker + ?Sized,
{
    let mip_levels = image.mip_levels();
    let Some(slice) = image.slice(level).copied() else {
        return Err(MapImageError::LevelOutOfRange { level, mip_levels });
    };

    if image.samples() > 1 {
        return Err(MapImageError::Multisampled);
    }

    let [width, height, _] = image.extent();
    let level_extent = [minify(width, level), minify(height, level)];

    let fits = |start: u32, len: u32, limit: u32| {
        start.checked_add(len).is_some_and(|end| end <= limit)
    };

    if region.is_empty()
        || !fits(region.x, region.width, level_extent[0])
        || !fits(region.y, region.height, level_extent[1])
        || !fits(region.z, region.depth, image.layer_count())
    {
        return Err(MapImageError::RegionOutOfRange);
    }

    let size = image.memory().size();
    let required = image.required_size();

    if size < required {
        return Err(MapImageError::AllocationTooSmall { size, required });
    }

    if image.is_tiled() && usage.intersects(TransferUsage::MAP_DIRECTLY) {
        return Err(MapImageError::DirectMapOfTiledImage);
    }

    if usage.intersects(TransferUsage::DISCARD_RANGE)
        && !usage.intersects(TransferUsage::UNSYNCHRONIZED)
        && !image.flags().intersects(ImageCreateFlags::MAP_COHERENT)
        && mip_levels == 1
        && region == TransferBox::whole(image.extent())
        && image.array_layers() == 1
        && image.memory().is_private()
    {
        usage |= TransferUsage::DISCARD_WHOLE_RESOURCE;
    }

    if usage.intersects(TransferUsage::DISCARD_WHOLE_RESOURCE) {
        let old = image.memory();

        match allocator.allocate(old.size(), old.name()) {
            Ok(memory) => {
                image.replace_memory(memory);
                tracker.mark_dirty(dirty_state_for(image.usage()));
            }
            Err(err) => {
                tracing::warn!(
                    image = image.id().get(),
                    %err,
                    "failed to reallocate a discarded image, flushing its readers instead"
                );
                tracker.flush_jobs_reading_image(image);
            }
        }
    } else if !usage.intersects(TransferUsage::UNSYNCHRONIZED) {
        if usage.intersects(TransferUsage::WRITE) {
            tracing::trace!(image = image.id().get(), "flushing readers before a write");
            tracker.flush_jobs_reading_image(image);
        } else {
            tracing::trace!(image = image.id().get(), "flushing writers before a read");
            tracker.flush_jobs_writing_image(image);
        }
    }

    if usage.intersects(TransferUsage::WRITE) {
        image.note_write();
    }

    let synchronized = !usage.intersects(TransferUsage::UNSYNCHRONIZED);
    let mapping = image
        .memory()
        .map(synchronized)
        .map_err(MapImageError::MapMemory)?;

    let [block_width, block_height, _] = image.format().block_extent();
    let region = TransferBox {
        x: region.x / block_width,
        y: region.y / block_height,
        width: region.width.div_ceil(block_width),
        height: region.height.div_ceil(block_height),
        ..region
    };
    let cpp = image.bytes_per_pixel();
    let image_layer_stride = image.layer_stride() as usize;

    if !image.is_tiled() {
        let offset = slice.offset as usize
            + region.y as usize * slice.stride as usize
            + region.x as usize * cpp as usize
            + region.z as usize * image_layer_stride;
        let len = (region.depth as usize - 1) * image_layer_stride
            + (region.height as usize - 1) * slice.stride as usize
            + region.width as usize * cpp as usize;

        return Ok(Transfer {
            image,
            codec,
            mapping,
            level,
            usage,
            region,
            stride: slice.stride,
            layer_stride: slice.stride,
            data: TransferData::Direct { offset, len },
        });
    }

    let stride = region.width * cpp;
    let layer_stride = stride * region.height;
    let mut buffer = vec![0; layer_stride as usize * region.depth as usize];

    if usage.intersects(TransferUsage::READ) {
        let surface = TiledSurface::from_slice(&slice, cpp);

        // SAFETY: `image` is borrowed mutably, so no other transfer of it is alive.
        let memory = unsafe { mapping.as_ref() };

        for (layer, dst) in (0..region.depth).zip(buffer.chunks_exact_mut(layer_stride as usize)) {
            let base = slice.offset as usize + (region.z + layer) as usize * image_layer_stride;
            codec.load(
                dst,
                stride,
                &memory[base..base + slice.size as usize],
                &surface,
                &region,
            );
        }
    }

    Ok(Transfer {
        image,
        codec,
        mapping,
        level,
        usage,
        region,
        stride,
        layer_stride,
        data: TransferData::Staging(buffer),
    })
}

/// Ends a transfer, writing the staging buffer back into the image if the access included
/// [`TransferUsage::WRITE`]. Never fails.
///
/// This is the same as dropping the transfer.
#[inline]
pub fn unmap(transfer: Transfer<'_>) {
    drop(transfer);
}

fn dirty_state_for(usage: ImageUsage) -> DirtyState {
    let mut dirty = DirtyState::empty();

    if usage.intersects(ImageUsage::VERTEX_BUFFER) {
        dirty |= DirtyState::VERTEX_BUFFERS;
    }

    if usage.intersects(ImageUsage::CONSTANT_BUFFER) {
        dirty |= DirtyState::CONSTANT_BUFFERS;
    }

    dirty
}

/// Error that can happen when mapping an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MapImageError {
    /// The requested mip level doesn't exist.
    LevelOutOfRange { level: u32, mip_levels: u32 },

    /// The box is empty or extends past the mip level or the image's layers.
    RegionOutOfRange,

    /// The image is multisampled. Multisampled images must be resolved before mapping.
    Multisampled,

    /// [`TransferUsage::MAP_DIRECTLY`] was requested, but the image is tiled.
    DirectMapOfTiledImage,

    /// The image's allocation is smaller than its layout requires.
    AllocationTooSmall {
        size: DeviceSize,
        required: DeviceSize,
    },

    /// Mapping the allocation failed.
    MapMemory(MemoryAllocatorError),
}

impl Error for MapImageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::MapMemory(err) => Some(err),
            _ => None,
        }
    }
}

impl Display for MapImageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            Self::LevelOutOfRange { level, mip_levels } => write!(
                f,
                "mip level {level} was requested, but the image has only {mip_levels} levels",
            ),
            Self::RegionOutOfRange => {
                write!(f, "the box is empty or extends past the mip level or its layers")
            }
            Self::Multisampled => write!(f, "multisampled images cannot be mapped"),
            Self::DirectMapOfTiledImage => {
                write!(f, "a direct mapping was requested, but the image is tiled")
            }
            Self::AllocationTooSmall { size, required } => write!(
                f,
                "the image's allocation is {size} bytes, but its layout requires {required}",
            ),
            Self::MapMemory(_) => write!(f, "mapping the image's memory failed"),
        }
    }
}
