//! Images and where their pixels live.
//!
//! An image is a one, two or three-dimensional array of pixels, optionally with several array
//! layers and mip levels. Buffers are handled as one-dimensional images whose format is a single
//! byte per pixel.
//!
//! # Memory layout
//!
//! Every image owns exactly one [`Allocation`]. It holds all mip levels of every array layer: the
//! [layout planner](layout) decides, for each mip level, its [`TilingMode`], its offset within a
//! layer, its row stride and its size. Layers follow each other at
//! [`layer_stride`](Image::layer_stride) bytes. Cube faces and the depth slices of a 3D image are
//! stored the same way as array layers.
//!
//! The geometry of an image never changes after it is created. The allocation may be replaced by
//! one of the same size when the whole image is about to be overwritten; see
//! [`transfer`](transfer#discarding).
//!
//! # Separate stencil
//!
//! A depth image may be paired with a separately created stencil image using
//! [`Image::set_stencil`]. The depth image records the stencil image's layout so that
//! [`Image::surface_layout`] can describe both, but it doesn't keep the stencil image alive: the
//! caller is responsible for destroying the two together.

pub use self::usage::ImageUsage;
use self::layout::{
    minify, utile_height, ImageLayoutPlan, LayoutInfo, SubresourceSlice, TilingMode,
    MAX_ARRAY_LAYERS, MAX_IMAGE_DIMENSION,
};
use crate::{
    format::{Format, InternalBpp, InternalType},
    macros::{impl_id_counter, layout_bitflags},
    memory::Allocation,
    DeviceSize, NonExhaustive,
};
use std::{num::NonZero, sync::Arc};

pub mod layout;
pub mod tiling;
pub mod transfer;
mod usage;

/// DRM format modifiers understood when creating and importing images.
pub mod modifier {
    /// Pixels in raster order.
    pub const LINEAR: u64 = 0;

    /// No modifier was specified; the driver picks the layout.
    pub const INVALID: u64 = (1 << 56) - 1;

    /// The Broadcom vendor's tiled layout.
    pub const BROADCOM_VC4_T_TILED: u64 = (0x07 << 56) | 1;
}

/// The kind of an image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ImageType {
    /// Raw bytes. The format is expected to have a single byte per pixel.
    Buffer,

    /// A one-dimensional image.
    Dim1d,

    /// An array of one-dimensional images.
    Dim1dArray,

    /// A two-dimensional image.
    #[default]
    Dim2d,

    /// An array of two-dimensional images.
    Dim2dArray,

    /// A three-dimensional image.
    Dim3d,

    /// Six square two-dimensional faces.
    Cube,

    /// An array of cube maps, six layers per cube.
    CubeArray,
}

layout_bitflags! {
    /// Flags that can be set when creating a new image.
    ImageCreateFlags = u32;

    /// The image is mapped persistently and coherently, so its allocation must never be swapped
    /// out from under the mapping.
    MAP_COHERENT = 1 << 0,
}

/// Parameters to create a new [`Image`].
#[derive(Clone, Debug)]
pub struct ImageCreateInfo {
    /// Additional properties of the image.
    ///
    /// The default value is empty.
    pub flags: ImageCreateFlags,

    /// The kind of image.
    ///
    /// The default value is [`ImageType::Dim2d`].
    pub image_type: ImageType,

    /// The format of the pixels.
    ///
    /// The default value is [`Format::R8G8B8A8_UNORM`].
    pub format: Format,

    /// The width, height and depth of level 0, in pixels.
    ///
    /// The depth must be 1 unless `image_type` is [`ImageType::Dim3d`]. The default value is
    /// `[1, 1, 1]`.
    pub extent: [u32; 3],

    /// The number of array layers, or the number of faces for cube images.
    ///
    /// The default value is `1`.
    pub array_layers: u32,

    /// The number of mip levels.
    ///
    /// The default value is `1`.
    pub mip_levels: u32,

    /// The number of samples per pixel. `0` and `1` both mean a single sample.
    ///
    /// A multisampled image must have a format that can be rendered to, and a single mip level.
    /// The default value is `1`.
    pub samples: u32,

    /// How the image is going to be bound.
    ///
    /// The default value is empty.
    pub usage: ImageUsage,

    pub _ne: NonExhaustive,
}

impl Default for ImageCreateInfo {
    #[inline]
    fn default() -> Self {
        ImageCreateInfo {
            flags: ImageCreateFlags::empty(),
            image_type: ImageType::Dim2d,
            format: Format::R8G8B8A8_UNORM,
            extent: [1, 1, 1],
            array_layers: 1,
            mip_levels: 1,
            samples: 1,
            usage: ImageUsage::empty(),
            _ne: NonExhaustive(()),
        }
    }
}

impl ImageCreateInfo {
    /// Returns a description of the problem if the parameters cannot describe an image.
    pub(crate) fn validate(&self) -> Result<(), &'static str> {
        let &Self {
            flags: _,
            image_type,
            format,
            extent,
            array_layers,
            mip_levels,
            samples,
            usage: _,
            _ne: _,
        } = self;

        if extent.contains(&0) {
            return Err("`extent` has a zero component");
        }

        if extent.iter().any(|&dimension| dimension > MAX_IMAGE_DIMENSION) {
            return Err("`extent` has a component greater than `MAX_IMAGE_DIMENSION`");
        }

        if extent[2] != 1 && image_type != ImageType::Dim3d {
            return Err("`extent[2]` is not 1, but `image_type` is not `ImageType::Dim3d`");
        }

        if array_layers == 0 {
            return Err("`array_layers` is 0");
        }

        if array_layers > MAX_ARRAY_LAYERS {
            return Err("`array_layers` is greater than `MAX_ARRAY_LAYERS`");
        }

        if mip_levels == 0 {
            return Err("`mip_levels` is 0");
        }

        if samples > 1 {
            if mip_levels != 1 {
                return Err("`samples` is greater than 1, but `mip_levels` is not 1");
            }

            if format.render_target().is_none() {
                return Err("`samples` is greater than 1, but `format` cannot be rendered to");
            }
        }

        Ok(())
    }

    /// Returns the number of times the mip chain is repeated in the allocation.
    #[inline]
    pub fn layer_count(&self) -> u32 {
        if self.image_type == ImageType::Dim3d {
            self.extent[2]
        } else {
            self.array_layers
        }
    }

    pub(crate) fn layout_info(&self, tiled: bool) -> LayoutInfo {
        LayoutInfo {
            image_type: self.image_type,
            format: self.format,
            extent: self.extent,
            mip_levels: self.mip_levels,
            samples: self.samples,
            tiled,
            ..Default::default()
        }
    }
}

/// An image and the memory that backs it.
#[derive(Debug)]
pub struct Image {
    id: NonZero<u64>,
    flags: ImageCreateFlags,
    image_type: ImageType,
    format: Format,
    extent: [u32; 3],
    array_layers: u32,
    samples: u32,
    usage: ImageUsage,
    tiled: bool,

    layout: Arc<ImageLayoutPlan>,
    memory: Arc<Allocation>,
    stencil: Option<SeparateStencil>,

    writes: u32,
    initialized: bool,
}

#[derive(Debug)]
struct SeparateStencil {
    id: NonZero<u64>,
    layout: Arc<ImageLayoutPlan>,
}

impl Image {
    /// Assembles an image from its planned layout and an allocation large enough for it.
    pub(crate) fn from_parts(
        create_info: ImageCreateInfo,
        tiled: bool,
        layout: ImageLayoutPlan,
        memory: Arc<Allocation>,
    ) -> Self {
        let ImageCreateInfo {
            flags,
            image_type,
            format,
            extent,
            array_layers,
            mip_levels: _,
            samples,
            usage,
            _ne: _,
        } = create_info;

        Image {
            id: Self::next_id(),
            flags,
            image_type,
            format,
            extent,
            array_layers,
            samples,
            usage,
            tiled,
            layout: Arc::new(layout),
            memory,
            stencil: None,
            writes: 0,
            initialized: false,
        }
    }

    /// Returns the flags the image was created with.
    #[inline]
    pub fn flags(&self) -> ImageCreateFlags {
        self.flags
    }

    /// Returns the kind of image.
    #[inline]
    pub fn image_type(&self) -> ImageType {
        self.image_type
    }

    /// Returns the format of the image.
    #[inline]
    pub fn format(&self) -> Format {
        self.format
    }

    /// Returns the format the image was created with, which is the format its memory is laid out
    /// for.
    #[inline]
    pub fn internal_format(&self) -> Format {
        self.format
    }

    /// Returns the extent of level 0 in pixels.
    #[inline]
    pub fn extent(&self) -> [u32; 3] {
        self.extent
    }

    /// Returns the number of array layers.
    #[inline]
    pub fn array_layers(&self) -> u32 {
        self.array_layers
    }

    /// Returns the number of times the mip chain is repeated in the allocation: the depth of a 3D
    /// image, or the number of array layers otherwise.
    #[inline]
    pub fn layer_count(&self) -> u32 {
        if self.image_type == ImageType::Dim3d {
            self.extent[2]
        } else {
            self.array_layers
        }
    }

    /// Returns the number of mip levels.
    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.layout.mip_levels()
    }

    /// Returns the number of samples per pixel.
    #[inline]
    pub fn samples(&self) -> u32 {
        self.samples
    }

    /// Returns how the image is going to be bound.
    #[inline]
    pub fn usage(&self) -> ImageUsage {
        self.usage
    }

    /// Returns whether the image may use tiled layouts. If not, every level is raster.
    #[inline]
    pub fn is_tiled(&self) -> bool {
        self.tiled
    }

    /// Returns the number of bytes per block of the image's memory.
    #[inline]
    pub fn bytes_per_pixel(&self) -> u32 {
        self.layout.bytes_per_pixel()
    }

    /// Returns the geometry of the image's mip levels.
    #[inline]
    pub fn layout(&self) -> &ImageLayoutPlan {
        &self.layout
    }

    /// Returns the geometry of a mip level, or `None` if the level doesn't exist.
    #[inline]
    pub fn slice(&self, level: u32) -> Option<&SubresourceSlice> {
        self.layout.slice(level)
    }

    /// Returns the byte distance between consecutive layers in the allocation.
    #[inline]
    pub fn layer_stride(&self) -> u32 {
        self.layout.layer_stride()
    }

    /// Returns the allocation backing the image.
    #[inline]
    pub fn memory(&self) -> &Arc<Allocation> {
        &self.memory
    }

    /// Returns how many times the image has been mapped for writing.
    #[inline]
    pub fn writes(&self) -> u32 {
        self.writes
    }

    /// Returns whether every byte of the image has been written at least once by the CPU.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Pairs a separately created stencil image with this depth image.
    ///
    /// The stencil image is not kept alive by `self`.
    #[inline]
    pub fn set_stencil(&mut self, stencil: &Image) {
        self.stencil = Some(SeparateStencil {
            id: stencil.id,
            layout: stencil.layout.clone(),
        });
    }

    /// Returns the identifier of the paired stencil image, if any.
    #[inline]
    pub fn stencil(&self) -> Option<NonZero<u64>> {
        self.stencil.as_ref().map(|stencil| stencil.id)
    }

    /// Describes one layer of one mip level for use as a render target.
    ///
    /// Returns `None` if `level` or `layer` is out of range, or if the layer starts past the
    /// 32-bit offsets the hardware can address.
    pub fn surface_layout(&self, level: u32, layer: u32) -> Option<SurfaceLayout> {
        if layer >= self.layer_count() {
            return None;
        }

        let plane = SurfacePlane::new(&self.layout, level, layer)?;
        let stencil = self
            .stencil
            .as_ref()
            .and_then(|stencil| SurfacePlane::new(&stencil.layout, level, layer));

        let (internal_type, internal_bpp) = if self.format.is_depth_or_stencil() {
            let internal_type = match self.format {
                Format::D16_UNORM => InternalType::Depth16,
                Format::D32_SFLOAT | Format::D32_SFLOAT_S8_UINT => InternalType::Depth32f,
                _ => InternalType::Depth24,
            };

            (Some(internal_type), None)
        } else {
            match self.format.render_target() {
                Some((internal_type, internal_bpp)) => (Some(internal_type), Some(internal_bpp)),
                None => (None, None),
            }
        };

        Some(SurfaceLayout {
            offset: plane.offset,
            tiling: plane.tiling,
            padded_height_in_uif_blocks: plane.padded_height_in_uif_blocks,
            internal_type,
            internal_bpp,
            stencil,
        })
    }

    /// Emits one debug event per mip level describing where it lives.
    pub(crate) fn log_layout(&self, caller: &'static str) {
        if self.image_type == ImageType::Buffer {
            tracing::debug!(
                caller,
                image = self.id.get(),
                size = self.memory.size(),
                "buffer"
            );

            return;
        }

        let [width, height, depth] = self.extent;
        let cpp = self.bytes_per_pixel();

        for (level, slice) in (0u32..).zip(self.layout.slices()) {
            tracing::debug!(
                caller,
                image = self.id.get(),
                format = ?self.format,
                extent = ?[width, height, depth],
                level,
                tiling = slice.tiling.short_name(),
                level_extent = ?[minify(width, level), minify(height, level), minify(depth, level)],
                padded_extent = ?[slice.stride / cpp, slice.padded_height()],
                stride = slice.stride,
                offset = slice.offset,
                "image level"
            );
        }
    }

    /// Replaces the allocation with one of the same size.
    pub(crate) fn replace_memory(&mut self, memory: Arc<Allocation>) {
        debug_assert_eq!(memory.size(), self.memory.size());

        self.memory = memory;
    }

    /// Records that the CPU is about to write the image.
    pub(crate) fn note_write(&mut self) {
        self.writes += 1;
        self.initialized = true;
    }

    /// Returns the number of bytes the image's allocation must have.
    #[inline]
    pub(crate) fn required_size(&self) -> DeviceSize {
        self.layout.allocation_size(self.layer_count())
    }
}

impl_id_counter!(Image);

/// The placement of one layer of one mip level, as the render target setup needs it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceLayout {
    /// Byte offset of the layer's level from the start of the allocation.
    pub offset: u32,

    /// How the level is arranged.
    pub tiling: TilingMode,

    /// For the UIF tilings, the padded height of the level in UIF blocks.
    pub padded_height_in_uif_blocks: Option<u32>,

    /// The tile buffer type the level is rendered with, if it can be rendered to.
    pub internal_type: Option<InternalType>,

    /// The width of a pixel in the tile buffer, for color formats that can be rendered to.
    pub internal_bpp: Option<InternalBpp>,

    /// The same level and layer of the paired stencil image, if there is one.
    pub stencil: Option<SurfacePlane>,
}

/// The placement of one layer of one mip level of a single image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfacePlane {
    /// Byte offset from the start of the allocation.
    pub offset: u32,

    /// How the level is arranged.
    pub tiling: TilingMode,

    /// For the UIF tilings, the padded height of the level in UIF blocks.
    pub padded_height_in_uif_blocks: Option<u32>,
}

impl SurfacePlane {
    fn new(layout: &ImageLayoutPlan, level: u32, layer: u32) -> Option<Self> {
        let slice = layout.slice(level)?;
        let padded_height_in_uif_blocks = slice.tiling.is_uif().then(|| {
            slice.padded_height() / (2 * utile_height(layout.bytes_per_pixel()))
        });

        let offset = layer
            .checked_mul(layout.layer_stride())?
            .checked_add(slice.offset)?;

        Some(SurfacePlane {
            offset,
            tiling: slice.tiling,
            padded_height_in_uif_blocks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{image::layout::plan_layout, memory::host::HostMemoryAllocator, tests::image};

    #[test]
    fn validate_rejects_degenerate_images() {
        let cases = [
            ImageCreateInfo {
                extent: [0, 4, 1],
                ..Default::default()
            },
            ImageCreateInfo {
                extent: [4, 4, 2],
                ..Default::default()
            },
            ImageCreateInfo {
                array_layers: 0,
                ..Default::default()
            },
            ImageCreateInfo {
                mip_levels: 0,
                ..Default::default()
            },
            ImageCreateInfo {
                samples: 4,
                mip_levels: 2,
                extent: [4, 4, 1],
                ..Default::default()
            },
            ImageCreateInfo {
                samples: 4,
                format: Format::BC1_RGBA_UNORM_BLOCK,
                ..Default::default()
            },
            ImageCreateInfo {
                format: Format::R32G32B32A32_SFLOAT,
                extent: [70000, 70000, 1],
                ..Default::default()
            },
            ImageCreateInfo {
                image_type: ImageType::Dim3d,
                extent: [16, 16, MAX_IMAGE_DIMENSION + 1],
                ..Default::default()
            },
            ImageCreateInfo {
                image_type: ImageType::Dim2dArray,
                array_layers: MAX_ARRAY_LAYERS + 1,
                ..Default::default()
            },
        ];

        for create_info in cases {
            assert!(create_info.validate().is_err(), "{create_info:?}");
        }

        assert!(ImageCreateInfo::default().validate().is_ok());
    }

    #[test]
    fn layer_count_uses_depth_for_3d() {
        let volume = ImageCreateInfo {
            image_type: ImageType::Dim3d,
            extent: [8, 8, 5],
            array_layers: 1,
            ..Default::default()
        };
        let array = ImageCreateInfo {
            image_type: ImageType::Dim2dArray,
            extent: [8, 8, 1],
            array_layers: 3,
            ..Default::default()
        };

        assert_eq!(volume.layer_count(), 5);
        assert_eq!(array.layer_count(), 3);
    }

    #[test]
    fn ids_are_unique() {
        let allocator = HostMemoryAllocator::new();
        let a = image(&allocator, ImageCreateInfo::default(), true);
        let b = image(&allocator, ImageCreateInfo::default(), true);

        assert_ne!(a.id(), b.id());
        assert_ne!(a, b);
    }

    #[test]
    fn surface_layout_of_array_layer() {
        let allocator = HostMemoryAllocator::new();
        let texture = image(
            &allocator,
            ImageCreateInfo {
                image_type: ImageType::Dim2dArray,
                extent: [130, 130, 1],
                array_layers: 3,
                ..Default::default()
            },
            true,
        );
        let surface = texture.surface_layout(0, 2).unwrap();

        assert_eq!(surface.offset, 2 * 87040);
        assert_eq!(surface.tiling, TilingMode::UifNoXor);
        // 136 padded rows, UIF blocks of 8 rows.
        assert_eq!(surface.padded_height_in_uif_blocks, Some(17));
        assert_eq!(surface.internal_type, Some(InternalType::Type8));
        assert_eq!(surface.internal_bpp, Some(InternalBpp::Bpp32));
        assert!(surface.stencil.is_none());

        assert!(texture.surface_layout(0, 3).is_none());
        assert!(texture.surface_layout(1, 0).is_none());
    }

    #[test]
    fn layers_past_32_bit_offsets_have_no_surface() {
        // One 4096 × 4096 level of 16-byte pixels is exactly 256 MiB per layer.
        let plan = plan_layout(&LayoutInfo {
            format: Format::R32G32B32A32_SFLOAT,
            extent: [4096, 4096, 1],
            ..Default::default()
        });

        assert_eq!(plan.layer_stride(), 1 << 28);
        assert_eq!(
            SurfacePlane::new(&plan, 0, 15).map(|plane| plane.offset),
            Some(15 << 28),
        );
        assert!(SurfacePlane::new(&plan, 0, 16).is_none());
    }

    #[test]
    fn surface_layout_with_separate_stencil() {
        let allocator = HostMemoryAllocator::new();
        let mut depth = image(
            &allocator,
            ImageCreateInfo {
                format: Format::D32_SFLOAT,
                extent: [64, 64, 1],
                ..Default::default()
            },
            true,
        );
        let stencil = image(
            &allocator,
            ImageCreateInfo {
                format: Format::S8_UINT,
                extent: [64, 64, 1],
                ..Default::default()
            },
            true,
        );
        depth.set_stencil(&stencil);

        let surface = depth.surface_layout(0, 0).unwrap();
        let stencil_plane = surface.stencil.unwrap();
        let stencil_plan = plan_layout(&LayoutInfo {
            format: Format::S8_UINT,
            extent: [64, 64, 1],
            ..Default::default()
        });

        assert_eq!(depth.stencil(), Some(stencil.id()));
        assert_eq!(surface.internal_type, Some(InternalType::Depth32f));
        assert_eq!(surface.internal_bpp, None);
        assert_eq!(stencil_plane.offset, stencil_plan.slices()[0].offset);
        assert_eq!(stencil_plane.tiling, stencil_plan.slices()[0].tiling);
        // 1 byte per pixel: 8 × 8 utiles, 64 rows is 4 UIF blocks.
        assert_eq!(stencil_plane.padded_height_in_uif_blocks, Some(4));
    }

    #[test]
    fn depth_internal_types() {
        let allocator = HostMemoryAllocator::new();

        for (format, internal_type) in [
            (Format::D16_UNORM, InternalType::Depth16),
            (Format::X8_D24_UNORM_PACK32, InternalType::Depth24),
            (Format::D24_UNORM_S8_UINT, InternalType::Depth24),
            (Format::D32_SFLOAT_S8_UINT, InternalType::Depth32f),
        ] {
            let depth = image(
                &allocator,
                ImageCreateInfo {
                    format,
                    ..Default::default()
                },
                true,
            );

            assert_eq!(
                depth.surface_layout(0, 0).unwrap().internal_type,
                Some(internal_type),
            );
        }
    }

    #[test]
    fn allocation_covers_every_layer() {
        let allocator = HostMemoryAllocator::new();
        let cube = image(
            &allocator,
            ImageCreateInfo {
                image_type: ImageType::Cube,
                extent: [16, 16, 1],
                array_layers: 6,
                mip_levels: 5,
                ..Default::default()
            },
            true,
        );
        let last_face = cube.surface_layout(0, 5).unwrap();
        let level0 = cube.slice(0).unwrap();

        assert!(
            DeviceSize::from(last_face.offset + level0.size) <= cube.memory().size(),
        );
        assert_eq!(cube.memory().size(), cube.required_size());
    }
}
